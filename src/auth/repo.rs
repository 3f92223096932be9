use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, instrument};

use crate::auth::repo_types::{Account, NewAccount};
use crate::error::AppError;

#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Find a live (not soft-deleted) account by email.
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<Account>>;

    /// Insert an account. A taken email is reported as `AppError::DuplicateEmail`.
    async fn create(&self, account: NewAccount) -> Result<Account, AppError>;
}

#[derive(Clone)]
pub struct PgAccountRepository {
    db: PgPool,
}

impl PgAccountRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    #[instrument(skip(self))]
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, first_name, last_name, email, password_hash,
                   created_at, updated_at, deleted_at
            FROM accounts
            WHERE email = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("select account by email")?;
        debug!(found = account.is_some(), "account lookup");
        Ok(account)
    }

    #[instrument(skip(self, account), fields(email = %account.email))]
    async fn create(&self, account: NewAccount) -> Result<Account, AppError> {
        let res = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (first_name, last_name, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, first_name, last_name, email, password_hash,
                      created_at, updated_at, deleted_at
            "#,
        )
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(&account.email)
        .bind(&account.password_hash)
        .fetch_one(&self.db)
        .await;

        match res {
            Ok(created) => Ok(created),
            Err(e) if is_unique_violation(&e) => Err(AppError::DuplicateEmail(account.email)),
            Err(e) => Err(anyhow::Error::new(e).context("insert account").into()),
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

#[cfg(test)]
pub(crate) mod memory {
    use std::sync::Mutex;

    use time::OffsetDateTime;
    use uuid::Uuid;

    use super::*;

    /// Stand-in for Postgres in tests; enforces the unique email constraint.
    #[derive(Default)]
    pub struct InMemoryAccountRepository {
        accounts: Mutex<Vec<Account>>,
        fail: bool,
        stale_reads: bool,
    }

    impl InMemoryAccountRepository {
        pub fn new() -> Self {
            Self::default()
        }

        /// Every call errors, as if the database were unreachable.
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        /// Lookups never see stored rows, so only the unique constraint in
        /// `create` catches a taken email. Mimics a concurrent insert landing
        /// between the existence check and the insert.
        pub fn stale_reads() -> Self {
            Self {
                stale_reads: true,
                ..Self::default()
            }
        }

        pub fn count(&self) -> usize {
            self.accounts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl AccountRepository for InMemoryAccountRepository {
        async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<Account>> {
            anyhow::ensure!(!self.fail, "database unavailable");
            if self.stale_reads {
                return Ok(None);
            }
            let accounts = self.accounts.lock().unwrap();
            Ok(accounts
                .iter()
                .find(|a| a.email == email && a.deleted_at.is_none())
                .cloned())
        }

        async fn create(&self, account: NewAccount) -> Result<Account, AppError> {
            if self.fail {
                return Err(anyhow::anyhow!("database unavailable").into());
            }
            let mut accounts = self.accounts.lock().unwrap();
            if accounts.iter().any(|a| a.email == account.email) {
                return Err(AppError::DuplicateEmail(account.email));
            }
            let now = OffsetDateTime::now_utc();
            let created = Account {
                id: Uuid::new_v4(),
                first_name: account.first_name,
                last_name: account.last_name,
                email: account.email,
                password_hash: account.password_hash,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            };
            accounts.push(created.clone());
            Ok(created)
        }
    }
}
