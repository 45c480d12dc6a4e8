//! Account provisioning.
//!
//! A user never exists without a wallet: both rows (and the opening credit,
//! when there is one) are written in a single transaction by
//! [`provision_user`].

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use validator::Validate;

use crate::entities::user::{self, Role};
use crate::entities::wallet;
use crate::errors::ServiceError;
use crate::services::wallet::{credit, LedgerEntry};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewAccount {
    #[validate(length(min = 3, max = 150, message = "Username must be 3-150 characters"))]
    pub username: String,
    #[validate(length(max = 255))]
    pub full_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[serde(default = "default_role")]
    pub role: Role,
    #[serde(default)]
    pub opening_balance: Decimal,
}

fn default_role() -> Role {
    Role::Customer
}

#[derive(Debug, Clone, Serialize)]
pub struct ProvisionedAccount {
    pub user: user::Model,
    pub wallet: wallet::Model,
}

/// Creates the user and its wallet atomically.
pub async fn provision_user<C: TransactionTrait>(
    db: &C,
    input: NewAccount,
) -> Result<ProvisionedAccount, ServiceError> {
    input.validate()?;
    let username = input.username.trim().to_string();
    if input.opening_balance < Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Opening balance cannot be negative".to_string(),
        ));
    }

    let txn = db.begin().await?;

    let taken = user::Entity::find()
        .filter(user::Column::Username.eq(username.clone()))
        .one(&txn)
        .await?
        .is_some();
    if taken {
        return Err(ServiceError::Conflict(format!(
            "Username '{username}' is already taken"
        )));
    }

    let now = Utc::now();
    let user = user::ActiveModel {
        username: Set(username),
        full_name: Set(input.full_name),
        email: Set(input.email),
        role: Set(input.role),
        is_active: Set(true),
        orders_count: Set(0),
        total_spent: Set(Decimal::ZERO),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let mut wallet = wallet::ActiveModel {
        user_id: Set(user.id),
        balance: Set(Decimal::ZERO),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    if input.opening_balance > Decimal::ZERO {
        wallet = credit(
            &txn,
            &wallet,
            input.opening_balance,
            LedgerEntry::new("Opening balance"),
        )
        .await?;
    }

    txn.commit().await?;
    Ok(ProvisionedAccount { user, wallet })
}

#[derive(Clone)]
pub struct ProvisioningService {
    db: Arc<DatabaseConnection>,
}

impl ProvisioningService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, input), fields(username = %input.username, role = %input.role))]
    pub async fn create_account(&self, input: NewAccount) -> Result<ProvisionedAccount, ServiceError> {
        let account = provision_user(&*self.db, input).await?;
        info!(user_id = account.user.id, "account provisioned");
        Ok(account)
    }

    pub async fn get_user(&self, user_id: i32) -> Result<user::Model, ServiceError> {
        user::Entity::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {user_id} not found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{establish_connection_with_config, run_migrations, DbConfig};
    use crate::entities::transaction_history;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;
    use sea_orm::PaginatorTrait;

    async fn db() -> DatabaseConnection {
        let db = establish_connection_with_config(&DbConfig::in_memory_sqlite())
            .await
            .unwrap();
        run_migrations(&db).await.unwrap();
        db
    }

    fn account(username: &str, opening_balance: Decimal) -> NewAccount {
        NewAccount {
            username: username.into(),
            full_name: Some("Asha Rai".into()),
            email: None,
            role: Role::Customer,
            opening_balance,
        }
    }

    #[tokio::test]
    async fn new_user_gets_wallet_and_opening_credit() {
        let db = db().await;
        let created = provision_user(&db, account("asha", dec!(500))).await.unwrap();

        assert_eq!(created.wallet.user_id, created.user.id);
        assert_eq!(created.wallet.balance, dec!(500));
        let ledger = transaction_history::Entity::find()
            .filter(transaction_history::Column::WalletId.eq(created.wallet.id))
            .count(&db)
            .await
            .unwrap();
        assert_eq!(ledger, 1);
    }

    #[tokio::test]
    async fn zero_opening_balance_writes_no_ledger_row() {
        let db = db().await;
        provision_user(&db, account("bimal", Decimal::ZERO)).await.unwrap();
        let ledger = transaction_history::Entity::find().count(&db).await.unwrap();
        assert_eq!(ledger, 0);
    }

    #[tokio::test]
    async fn duplicate_username_is_a_conflict() {
        let db = db().await;
        provision_user(&db, account("asha", Decimal::ZERO)).await.unwrap();
        assert_matches!(
            provision_user(&db, account("asha", Decimal::ZERO)).await,
            Err(ServiceError::Conflict(_))
        );
        assert_eq!(wallet::Entity::find().count(&db).await.unwrap(), 1);
    }
}
