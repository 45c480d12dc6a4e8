use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20241001_000001_create_accounts_tables::Migration),
            Box::new(m20241001_000002_create_catalog_tables::Migration),
            Box::new(m20241001_000003_create_cart_tables::Migration),
            Box::new(m20241001_000004_create_dining_tables::Migration),
            Box::new(m20241001_000005_create_order_tables::Migration),
            Box::new(m20241001_000006_create_payment_tables::Migration),
        ]
    }
}

// Identifiers shared across migrations so foreign keys can name their targets.

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Username,
    FullName,
    Email,
    Role,
    IsActive,
    OrdersCount,
    TotalSpent,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Wallets {
    Table,
    Id,
    UserId,
    Balance,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum TransactionHistories {
    Table,
    Id,
    WalletId,
    TransactionType,
    Amount,
    Title,
    Description,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Categories {
    Table,
    Id,
    Name,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Products {
    Table,
    Id,
    CategoryId,
    Name,
    Description,
    Price,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Carts {
    Table,
    Id,
    UserId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum CartItems {
    Table,
    Id,
    CartId,
    ProductId,
    Quantity,
    Price,
    TotalPrice,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum DiningTables {
    Table,
    Id,
    Number,
    Capacity,
    Area,
    IsOccupied,
    OccupiedAt,
    EstimatedFinish,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum TableUpdateLogs {
    Table,
    Id,
    TableId,
    Message,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Orders {
    Table,
    Id,
    UserId,
    TableId,
    Status,
    TotalPrice,
    PrepareDuration,
    OrderedAt,
    ConfirmedAt,
    PreparingAt,
    DeliveredAt,
    ConfirmedBy,
    PreparedBy,
    DeliveredBy,
    CancelledBy,
    RefundedBy,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum OrderItems {
    Table,
    Id,
    OrderId,
    ProductId,
    Quantity,
    Price,
}

#[derive(DeriveIden)]
enum PaymentMethods {
    Table,
    Id,
    Name,
    Label,
    IsEnabled,
}

#[derive(DeriveIden)]
enum Payments {
    Table,
    Id,
    OrderId,
    UserId,
    Method,
    Amount,
    Status,
    Screenshot,
    Remarks,
    PaidAt,
    CreatedAt,
    UpdatedAt,
}

fn id_column<T: IntoIden>(name: T) -> ColumnDef {
    ColumnDef::new(name)
        .integer()
        .not_null()
        .auto_increment()
        .primary_key()
        .to_owned()
}

fn money_column<T: IntoIden>(name: T) -> ColumnDef {
    ColumnDef::new(name)
        .decimal_len(10, 2)
        .not_null()
        .default(0)
        .to_owned()
}

fn timestamp_column<T: IntoIden>(name: T) -> ColumnDef {
    ColumnDef::new(name)
        .timestamp_with_time_zone()
        .not_null()
        .to_owned()
}

mod m20241001_000001_create_accounts_tables {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20241001_000001_create_accounts_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(&mut id_column(Users::Id))
                        .col(
                            ColumnDef::new(Users::Username)
                                .string_len(150)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Users::FullName).string_len(150).null())
                        .col(ColumnDef::new(Users::Email).string_len(254).null())
                        .col(
                            ColumnDef::new(Users::Role)
                                .string_len(20)
                                .not_null()
                                .default("customer"),
                        )
                        .col(
                            ColumnDef::new(Users::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Users::OrdersCount)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(&mut money_column(Users::TotalSpent))
                        .col(&mut timestamp_column(Users::CreatedAt))
                        .col(&mut timestamp_column(Users::UpdatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Wallets::Table)
                        .if_not_exists()
                        .col(&mut id_column(Wallets::Id))
                        .col(
                            ColumnDef::new(Wallets::UserId)
                                .integer()
                                .not_null()
                                .unique_key(),
                        )
                        .col(&mut money_column(Wallets::Balance))
                        .col(&mut timestamp_column(Wallets::CreatedAt))
                        .col(&mut timestamp_column(Wallets::UpdatedAt))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_wallets_user_id")
                                .from(Wallets::Table, Wallets::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(TransactionHistories::Table)
                        .if_not_exists()
                        .col(&mut id_column(TransactionHistories::Id))
                        .col(
                            ColumnDef::new(TransactionHistories::WalletId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransactionHistories::TransactionType)
                                .string_len(10)
                                .not_null(),
                        )
                        .col(&mut money_column(TransactionHistories::Amount))
                        .col(
                            ColumnDef::new(TransactionHistories::Title)
                                .string_len(255)
                                .not_null(),
                        )
                        .col(ColumnDef::new(TransactionHistories::Description).text().null())
                        .col(&mut timestamp_column(TransactionHistories::CreatedAt))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_transaction_histories_wallet_id")
                                .from(TransactionHistories::Table, TransactionHistories::WalletId)
                                .to(Wallets::Table, Wallets::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_transaction_histories_wallet_id")
                        .table(TransactionHistories::Table)
                        .col(TransactionHistories::WalletId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(TransactionHistories::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Wallets::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }
}

mod m20241001_000002_create_catalog_tables {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20241001_000002_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Categories::Table)
                        .if_not_exists()
                        .col(&mut id_column(Categories::Id))
                        .col(
                            ColumnDef::new(Categories::Name)
                                .string_len(100)
                                .not_null()
                                .unique_key(),
                        )
                        .col(&mut timestamp_column(Categories::CreatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(&mut id_column(Products::Id))
                        .col(ColumnDef::new(Products::CategoryId).integer().null())
                        .col(ColumnDef::new(Products::Name).string_len(255).not_null())
                        .col(ColumnDef::new(Products::Description).text().null())
                        .col(&mut money_column(Products::Price))
                        .col(
                            ColumnDef::new(Products::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(&mut timestamp_column(Products::CreatedAt))
                        .col(&mut timestamp_column(Products::UpdatedAt))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_products_category_id")
                                .from(Products::Table, Products::CategoryId)
                                .to(Categories::Table, Categories::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Categories::Table).to_owned())
                .await
        }
    }
}

mod m20241001_000003_create_cart_tables {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20241001_000003_create_cart_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Carts::Table)
                        .if_not_exists()
                        .col(&mut id_column(Carts::Id))
                        .col(
                            ColumnDef::new(Carts::UserId)
                                .integer()
                                .not_null()
                                .unique_key(),
                        )
                        .col(&mut timestamp_column(Carts::CreatedAt))
                        .col(&mut timestamp_column(Carts::UpdatedAt))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_carts_user_id")
                                .from(Carts::Table, Carts::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(CartItems::Table)
                        .if_not_exists()
                        .col(&mut id_column(CartItems::Id))
                        .col(ColumnDef::new(CartItems::CartId).integer().not_null())
                        .col(ColumnDef::new(CartItems::ProductId).integer().not_null())
                        .col(
                            ColumnDef::new(CartItems::Quantity)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(&mut money_column(CartItems::Price))
                        .col(&mut money_column(CartItems::TotalPrice))
                        .col(&mut timestamp_column(CartItems::CreatedAt))
                        .col(&mut timestamp_column(CartItems::UpdatedAt))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_cart_items_cart_id")
                                .from(CartItems::Table, CartItems::CartId)
                                .to(Carts::Table, Carts::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_cart_items_product_id")
                                .from(CartItems::Table, CartItems::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            // Adding the same product twice updates the existing line.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .unique()
                        .name("uq_cart_items_cart_product")
                        .table(CartItems::Table)
                        .col(CartItems::CartId)
                        .col(CartItems::ProductId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CartItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Carts::Table).to_owned())
                .await
        }
    }
}

mod m20241001_000004_create_dining_tables {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20241001_000004_create_dining_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(DiningTables::Table)
                        .if_not_exists()
                        .col(&mut id_column(DiningTables::Id))
                        .col(
                            ColumnDef::new(DiningTables::Number)
                                .integer()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(DiningTables::Capacity)
                                .integer()
                                .not_null()
                                .default(4),
                        )
                        .col(ColumnDef::new(DiningTables::Area).string_len(50).null())
                        .col(
                            ColumnDef::new(DiningTables::IsOccupied)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(DiningTables::OccupiedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(DiningTables::EstimatedFinish)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(&mut timestamp_column(DiningTables::UpdatedAt))
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(TableUpdateLogs::Table)
                        .if_not_exists()
                        .col(&mut id_column(TableUpdateLogs::Id))
                        .col(ColumnDef::new(TableUpdateLogs::TableId).integer().not_null())
                        .col(
                            ColumnDef::new(TableUpdateLogs::Message)
                                .string_len(255)
                                .not_null(),
                        )
                        .col(&mut timestamp_column(TableUpdateLogs::CreatedAt))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_table_update_logs_table_id")
                                .from(TableUpdateLogs::Table, TableUpdateLogs::TableId)
                                .to(DiningTables::Table, DiningTables::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(TableUpdateLogs::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(DiningTables::Table).to_owned())
                .await
        }
    }
}

mod m20241001_000005_create_order_tables {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20241001_000005_create_order_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(&mut id_column(Orders::Id))
                        .col(ColumnDef::new(Orders::UserId).integer().not_null())
                        .col(ColumnDef::new(Orders::TableId).integer().null())
                        .col(
                            ColumnDef::new(Orders::Status)
                                .string_len(20)
                                .not_null()
                                .default("pending"),
                        )
                        .col(&mut money_column(Orders::TotalPrice))
                        .col(ColumnDef::new(Orders::PrepareDuration).integer().null())
                        .col(&mut timestamp_column(Orders::OrderedAt))
                        .col(
                            ColumnDef::new(Orders::ConfirmedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Orders::PreparingAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Orders::DeliveredAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Orders::ConfirmedBy).integer().null())
                        .col(ColumnDef::new(Orders::PreparedBy).integer().null())
                        .col(ColumnDef::new(Orders::DeliveredBy).integer().null())
                        .col(ColumnDef::new(Orders::CancelledBy).integer().null())
                        .col(ColumnDef::new(Orders::RefundedBy).integer().null())
                        .col(&mut timestamp_column(Orders::UpdatedAt))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_orders_user_id")
                                .from(Orders::Table, Orders::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_orders_table_id")
                                .from(Orders::Table, Orders::TableId)
                                .to(DiningTables::Table, DiningTables::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_user_id")
                        .table(Orders::Table)
                        .col(Orders::UserId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_table_status")
                        .table(Orders::Table)
                        .col(Orders::TableId)
                        .col(Orders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(&mut id_column(OrderItems::Id))
                        .col(ColumnDef::new(OrderItems::OrderId).integer().not_null())
                        .col(ColumnDef::new(OrderItems::ProductId).integer().null())
                        .col(
                            ColumnDef::new(OrderItems::Quantity)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(&mut money_column(OrderItems::Price))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_order_id")
                                .from(OrderItems::Table, OrderItems::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_product_id")
                                .from(OrderItems::Table, OrderItems::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }
}

mod m20241001_000006_create_payment_tables {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20241001_000006_create_payment_tables"
        }
    }

    const METHODS: [(&str, &str); 3] = [
        ("wallet", "Wallet"),
        ("qr", "QR with Remarks"),
        ("counter", "On Counter Pay"),
    ];

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PaymentMethods::Table)
                        .if_not_exists()
                        .col(&mut id_column(PaymentMethods::Id))
                        .col(
                            ColumnDef::new(PaymentMethods::Name)
                                .string_len(20)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(PaymentMethods::Label).string_len(50).not_null())
                        .col(
                            ColumnDef::new(PaymentMethods::IsEnabled)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .to_owned(),
                )
                .await?;

            let mut seed = Query::insert();
            seed.into_table(PaymentMethods::Table).columns([
                PaymentMethods::Name,
                PaymentMethods::Label,
                PaymentMethods::IsEnabled,
            ]);
            for (name, label) in METHODS {
                seed.values([name.into(), label.into(), true.into()])
                    .map_err(|e| DbErr::Custom(e.to_string()))?;
            }
            manager.exec_stmt(seed).await?;

            manager
                .create_table(
                    Table::create()
                        .table(Payments::Table)
                        .if_not_exists()
                        .col(&mut id_column(Payments::Id))
                        .col(
                            ColumnDef::new(Payments::OrderId)
                                .integer()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Payments::UserId).integer().not_null())
                        .col(ColumnDef::new(Payments::Method).string_len(20).not_null())
                        .col(&mut money_column(Payments::Amount))
                        .col(
                            ColumnDef::new(Payments::Status)
                                .string_len(20)
                                .not_null()
                                .default("pending"),
                        )
                        .col(ColumnDef::new(Payments::Screenshot).string_len(255).null())
                        .col(
                            ColumnDef::new(Payments::Remarks)
                                .string_len(255)
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(Payments::PaidAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(&mut timestamp_column(Payments::CreatedAt))
                        .col(&mut timestamp_column(Payments::UpdatedAt))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_payments_order_id")
                                .from(Payments::Table, Payments::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_payments_user_id")
                                .from(Payments::Table, Payments::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_payments_status")
                        .table(Payments::Table)
                        .col(Payments::Status)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Payments::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PaymentMethods::Table).to_owned())
                .await
        }
    }
}
