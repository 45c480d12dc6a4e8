//! Wallet balances and their ledger.
//!
//! [`debit`] and [`credit`] are the only code paths that move a balance. Both
//! write the matching [`transaction_history`] row on the same connection so the
//! ledger and the balance commit or roll back together.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use validator::Validate;

use crate::entities::transaction_history::{self, TransactionType};
use crate::entities::wallet;
use crate::errors::ServiceError;
use crate::services::{Page, PageRequest};

/// Loads the user's wallet, taking a row lock where the backend supports it.
pub async fn lock_wallet<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
) -> Result<wallet::Model, ServiceError> {
    wallet::Entity::find()
        .filter(wallet::Column::UserId.eq(user_id))
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Wallet for user {user_id} not found")))
}

/// Entry to append to the ledger alongside a balance movement.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub title: String,
    pub description: Option<String>,
}

impl LedgerEntry {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Takes `amount` out of the wallet. Fails with
/// [`ServiceError::InsufficientBalance`] and writes nothing when the balance
/// does not cover it.
pub async fn debit<C: ConnectionTrait>(
    conn: &C,
    wallet: &wallet::Model,
    amount: Decimal,
    entry: LedgerEntry,
) -> Result<wallet::Model, ServiceError> {
    ensure_positive(amount)?;
    if wallet.balance < amount {
        return Err(ServiceError::InsufficientBalance);
    }

    // Guarded update so a concurrent debit that slipped past the read cannot
    // push the balance below zero.
    let result = wallet::Entity::update_many()
        .col_expr(
            wallet::Column::Balance,
            Expr::col(wallet::Column::Balance).sub(amount),
        )
        .col_expr(wallet::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(wallet::Column::Id.eq(wallet.id))
        .filter(wallet::Column::Balance.gte(amount))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Err(ServiceError::InsufficientBalance);
    }

    record(conn, wallet.id, TransactionType::Debit, amount, entry).await?;
    reload(conn, wallet.id).await
}

/// Adds `amount` to the wallet.
pub async fn credit<C: ConnectionTrait>(
    conn: &C,
    wallet: &wallet::Model,
    amount: Decimal,
    entry: LedgerEntry,
) -> Result<wallet::Model, ServiceError> {
    ensure_positive(amount)?;

    wallet::Entity::update_many()
        .col_expr(
            wallet::Column::Balance,
            Expr::col(wallet::Column::Balance).add(amount),
        )
        .col_expr(wallet::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(wallet::Column::Id.eq(wallet.id))
        .exec(conn)
        .await?;

    record(conn, wallet.id, TransactionType::Credit, amount, entry).await?;
    reload(conn, wallet.id).await
}

fn ensure_positive(amount: Decimal) -> Result<(), ServiceError> {
    if amount <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Amount must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

async fn record<C: ConnectionTrait>(
    conn: &C,
    wallet_id: i32,
    kind: TransactionType,
    amount: Decimal,
    entry: LedgerEntry,
) -> Result<transaction_history::Model, ServiceError> {
    let row = transaction_history::ActiveModel {
        wallet_id: Set(wallet_id),
        transaction_type: Set(kind),
        amount: Set(amount),
        title: Set(entry.title),
        description: Set(entry.description),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    Ok(row.insert(conn).await?)
}

async fn reload<C: ConnectionTrait>(conn: &C, wallet_id: i32) -> Result<wallet::Model, ServiceError> {
    wallet::Entity::find_by_id(wallet_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Wallet {wallet_id} not found")))
}

/// Wallet balance with one page of its ledger, newest first.
#[derive(Debug, Serialize)]
pub struct WalletStatement {
    pub wallet_id: i32,
    pub user_id: i32,
    pub balance: Decimal,
    pub transactions: Page<transaction_history::Model>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TopUpRequest {
    pub amount: Decimal,
    #[validate(length(max = 255))]
    pub note: Option<String>,
}

#[derive(Clone)]
pub struct WalletService {
    db: Arc<DatabaseConnection>,
}

impl WalletService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn statement(
        &self,
        user_id: i32,
        page: PageRequest,
    ) -> Result<WalletStatement, ServiceError> {
        let db = &*self.db;
        let wallet = wallet::Entity::find()
            .filter(wallet::Column::UserId.eq(user_id))
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Wallet not found".to_string()))?;

        let paginator = transaction_history::Entity::find()
            .filter(transaction_history::Column::WalletId.eq(wallet.id))
            .order_by_desc(transaction_history::Column::CreatedAt)
            .order_by_desc(transaction_history::Column::Id)
            .paginate(db, page.per_page);
        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(page.index()).await?;

        Ok(WalletStatement {
            wallet_id: wallet.id,
            user_id: wallet.user_id,
            balance: wallet.balance,
            transactions: Page::new(rows, page, total),
        })
    }

    /// Credits a customer's wallet on behalf of staff.
    #[instrument(skip(self, request), fields(amount = %request.amount))]
    pub async fn top_up(
        &self,
        actor_id: i32,
        user_id: i32,
        request: TopUpRequest,
    ) -> Result<wallet::Model, ServiceError> {
        request.validate()?;

        let txn = self.db.begin().await?;
        let locked = lock_wallet(&txn, user_id).await?;
        let mut entry = LedgerEntry::new("Wallet top-up");
        if let Some(note) = request.note.filter(|n| !n.trim().is_empty()) {
            entry = entry.with_description(note);
        }
        let updated = credit(&txn, &locked, request.amount, entry).await?;
        txn.commit().await?;

        info!(
            actor_id,
            user_id,
            balance = %updated.balance,
            "wallet topped up"
        );
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{establish_connection_with_config, run_migrations, DbConfig};
    use crate::entities::user::Role;
    use crate::services::provisioning::{provision_user, NewAccount};
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    async fn wallet_with(balance: Decimal) -> (Arc<DatabaseConnection>, wallet::Model) {
        let db = establish_connection_with_config(&DbConfig::in_memory_sqlite())
            .await
            .unwrap();
        run_migrations(&db).await.unwrap();
        let account = provision_user(
            &db,
            NewAccount {
                username: "ledger".into(),
                full_name: None,
                email: None,
                role: Role::Customer,
                opening_balance: balance,
            },
        )
        .await
        .unwrap();
        (Arc::new(db), account.wallet)
    }

    #[tokio::test]
    async fn debit_moves_balance_and_writes_ledger() {
        let (db, wallet) = wallet_with(dec!(500)).await;
        let updated = debit(&*db, &wallet, dec!(120.50), LedgerEntry::new("Order #1"))
            .await
            .unwrap();
        assert_eq!(updated.balance, dec!(379.50));

        let debits = transaction_history::Entity::find()
            .filter(transaction_history::Column::WalletId.eq(wallet.id))
            .filter(transaction_history::Column::TransactionType.eq(TransactionType::Debit))
            .all(&*db)
            .await
            .unwrap();
        assert_eq!(debits.len(), 1);
        assert_eq!(debits[0].amount, dec!(120.50));
    }

    #[tokio::test]
    async fn overdraw_is_rejected_without_side_effects() {
        let (db, wallet) = wallet_with(dec!(50)).await;
        let err = debit(&*db, &wallet, dec!(50.01), LedgerEntry::new("Order #2"))
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::InsufficientBalance);

        let reloaded = reload(&*db, wallet.id).await.unwrap();
        assert_eq!(reloaded.balance, dec!(50));
        let debits = transaction_history::Entity::find()
            .filter(transaction_history::Column::TransactionType.eq(TransactionType::Debit))
            .count(&*db)
            .await
            .unwrap();
        assert_eq!(debits, 0);
    }

    #[tokio::test]
    async fn non_positive_amounts_are_invalid() {
        let (db, wallet) = wallet_with(dec!(10)).await;
        assert_matches!(
            credit(&*db, &wallet, Decimal::ZERO, LedgerEntry::new("noop")).await,
            Err(ServiceError::ValidationError(_))
        );
    }

    #[tokio::test]
    async fn statement_lists_newest_first() {
        let (db, wallet) = wallet_with(dec!(100)).await;
        let service = WalletService::new(db.clone());
        service
            .top_up(
                1,
                wallet.user_id,
                TopUpRequest {
                    amount: dec!(25),
                    note: Some("cash at till".into()),
                },
            )
            .await
            .unwrap();

        let statement = service
            .statement(wallet.user_id, PageRequest::new(1, 10))
            .await
            .unwrap();
        assert_eq!(statement.balance, dec!(125));
        assert_eq!(statement.transactions.total, 2);
        assert_eq!(statement.transactions.items[0].title, "Wallet top-up");
    }
}
