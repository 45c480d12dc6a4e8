//! Seed data script - populates the database with a small working canteen
//!
//! Run with: cargo run --bin seed-data
//!
//! This creates:
//! - staff accounts (admin, chef, cashier) and two customers with wallet credit
//! - 3 categories with 8 menu items
//! - 6 dining tables
//!
//! Payment methods are seeded by the migrations themselves.

use chrono::Utc;
use clap::Parser;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, PaginatorTrait, Set};
use tracing::{info, warn};

use canteen_api::{
    auth::{AuthConfig, AuthService},
    config,
    db,
    entities::{category, dining_table, product, user::Role},
    services::provisioning::{provision_user, NewAccount, ProvisionedAccount},
};

#[derive(Debug, Parser)]
#[command(name = "seed-data", about = "Populate the canteen database with demo data")]
struct Args {
    /// Overrides the configured database URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Print a bearer token for every seeded account
    #[arg(long)]
    print_tokens: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let mut cfg = config::load_config()?;
    if let Some(url) = args.database_url {
        cfg.database_url = url;
    }

    info!("=== Canteen API Seed Data ===");
    let db = db::establish_connection_from_app_config(&cfg).await?;
    db::run_migrations(&db).await?;

    if product::Entity::find().count(&db).await? > 0 {
        warn!("Products already exist; skipping seed");
        return Ok(());
    }

    info!("Creating accounts...");
    let accounts = create_accounts(&db).await?;
    info!("  Created {} accounts", accounts.len());

    info!("Creating menu...");
    let items = create_menu(&db).await?;
    info!("  Created {} products", items);

    info!("Creating tables...");
    let tables = create_tables(&db).await?;
    info!("  Created {} tables", tables);

    if args.print_tokens {
        let auth = AuthService::new(AuthConfig::from(&cfg));
        for account in &accounts {
            let token = auth.generate_token(&account.user)?;
            info!(
                "{} ({}): {}",
                account.user.username, account.user.role, token.access_token
            );
        }
    }

    info!("=== Seed Data Complete ===");
    info!("Try: curl -H 'Authorization: Bearer <token>' http://localhost:8080/api/v1/products");

    Ok(())
}

async fn create_accounts(db: &DatabaseConnection) -> anyhow::Result<Vec<ProvisionedAccount>> {
    let people = [
        ("admin", "Canteen Admin", Role::Admin, Decimal::ZERO),
        ("chef", "Head Chef", Role::Chef, Decimal::ZERO),
        ("cashier", "Front Counter", Role::Cashier, Decimal::ZERO),
        ("asha", "Asha Rai", Role::Customer, dec!(500.00)),
        ("bikash", "Bikash Shrestha", Role::Customer, dec!(150.00)),
    ];

    let mut accounts = Vec::with_capacity(people.len());
    for (username, full_name, role, opening_balance) in people {
        let account = provision_user(
            db,
            NewAccount {
                username: username.to_string(),
                full_name: Some(full_name.to_string()),
                email: Some(format!("{username}@canteen.local")),
                role,
                opening_balance,
            },
        )
        .await?;
        accounts.push(account);
    }
    Ok(accounts)
}

async fn create_menu(db: &DatabaseConnection) -> anyhow::Result<usize> {
    let menu: [(&str, &[(&str, Decimal, bool)]); 3] = [
        (
            "Breakfast",
            &[
                ("Masala Tea", dec!(25.00), true),
                ("Egg Sandwich", dec!(90.00), true),
                ("Aloo Paratha", dec!(80.00), true),
            ],
        ),
        (
            "Meals",
            &[
                ("Dal Bhat Set", dec!(180.00), true),
                ("Chicken Momo", dec!(150.00), true),
                ("Veg Chowmein", dec!(120.00), false),
            ],
        ),
        (
            "Drinks",
            &[("Lassi", dec!(60.00), true), ("Cold Coffee", dec!(110.00), true)],
        ),
    ];

    let now = Utc::now();
    let mut created = 0;
    for (category_name, products) in menu {
        let category = category::ActiveModel {
            name: Set(category_name.to_string()),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;

        for (name, price, is_active) in products {
            product::ActiveModel {
                category_id: Set(Some(category.id)),
                name: Set(name.to_string()),
                description: Set(None),
                price: Set(*price),
                is_active: Set(*is_active),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?;
            created += 1;
        }
    }
    Ok(created)
}

async fn create_tables(db: &DatabaseConnection) -> anyhow::Result<usize> {
    let layout = [
        (1, 2, "Window"),
        (2, 2, "Window"),
        (3, 4, "Hall"),
        (4, 4, "Hall"),
        (5, 6, "Hall"),
        (6, 8, "Terrace"),
    ];

    let now = Utc::now();
    for (number, capacity, area) in layout {
        dining_table::ActiveModel {
            number: Set(number),
            capacity: Set(capacity),
            area: Set(Some(area.to_string())),
            is_occupied: Set(false),
            occupied_at: Set(None),
            estimated_finish: Set(None),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }
    Ok(layout.len())
}
