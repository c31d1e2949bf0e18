//! Account storage repository.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use tracing::{debug, warn};

use super::model::{AccountId, Credentials, LinkedAccount, NewAccount, UserId};
use super::store::AccountStore;
use crate::message::parse_received;
use crate::{Error, Result};

const SELECT_COLUMNS: &str = r"
    SELECT account_id, user_id, email, account_type,
           access_token, refresh_token, token_expiry, created_at
    FROM mail_accounts
";

/// `SQLite`-backed repository for linked accounts.
pub struct AccountRepository {
    pool: SqlitePool,
}

impl AccountRepository {
    /// Create a new repository with the given database path.
    ///
    /// Creates the database and tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let repo = Self { pool };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Open the database file at `path`, creating its directory first.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the database
    /// cannot be opened.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        Self::new(&path.to_string_lossy()).await
    }

    /// Create an in-memory repository for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let repo = Self { pool };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Initialize database schema.
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS mail_accounts (
                account_id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                email TEXT NOT NULL,
                account_type TEXT NOT NULL,
                access_token TEXT NOT NULL,
                refresh_token TEXT,
                token_expiry TEXT,
                created_at TEXT NOT NULL,
                UNIQUE (user_id, email)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Accounts owned by `user`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_for_user(&self, user: UserId) -> Result<Vec<LinkedAccount>> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE user_id = ? ORDER BY created_at DESC, account_id DESC"
        ))
        .bind(user.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(row_to_account).collect())
    }

    /// Get account by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get(&self, id: AccountId) -> Result<Option<LinkedAccount>> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE account_id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().and_then(row_to_account))
    }

    /// Insert a newly linked account.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AccountExists`] if the user already linked this
    /// address, or the database error.
    pub async fn insert(&self, account: NewAccount) -> Result<LinkedAccount> {
        let created_at = Utc::now();
        let result = sqlx::query(
            r"
            INSERT INTO mail_accounts (
                user_id, email, account_type,
                access_token, refresh_token, token_expiry, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(account.user_id.0)
        .bind(&account.email)
        .bind(account.provider.as_str())
        .bind(&account.credentials.access_token)
        .bind(account.credentials.refresh_token.as_deref())
        .bind(account.credentials.token_expiry.map(format_timestamp))
        .bind(format_timestamp(created_at))
        .execute(&self.pool)
        .await;

        let result = match result {
            Ok(result) => result,
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(Error::AccountExists(account.email));
            }
            Err(e) => return Err(e.into()),
        };

        let id = AccountId::new(result.last_insert_rowid());
        debug!("Linked {} account {} for user {}", account.provider, id, account.user_id);

        Ok(LinkedAccount {
            id,
            user_id: account.user_id,
            email: account.email,
            provider: account.provider,
            access_token: account.credentials.access_token,
            refresh_token: account.credentials.refresh_token,
            token_expiry: account.credentials.token_expiry,
            created_at,
        })
    }

    /// Overwrite the credential fields of one account.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AccountNotFound`] if no row matched, or the database error.
    pub async fn update_credentials(&self, id: AccountId, credentials: &Credentials) -> Result<()> {
        let result = sqlx::query(
            r"
            UPDATE mail_accounts SET
                access_token = ?, refresh_token = ?, token_expiry = ?
            WHERE account_id = ?
            ",
        )
        .bind(&credentials.access_token)
        .bind(credentials.refresh_token.as_deref())
        .bind(credentials.token_expiry.map(format_timestamp))
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::AccountNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Delete an account owned by `user`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn delete(&self, user: UserId, id: AccountId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM mail_accounts WHERE account_id = ? AND user_id = ?")
            .bind(id.0)
            .bind(user.0)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

impl AccountStore for AccountRepository {
    async fn accounts_for_user(&self, user: UserId) -> Result<Vec<LinkedAccount>> {
        self.list_for_user(user).await
    }

    async fn account(&self, id: AccountId) -> Result<Option<LinkedAccount>> {
        self.get(id).await
    }

    async fn update_credentials(&self, id: AccountId, credentials: &Credentials) -> Result<()> {
        Self::update_credentials(self, id, credentials).await
    }

    async fn insert_account(&self, account: NewAccount) -> Result<LinkedAccount> {
        self.insert(account).await
    }

    async fn delete_account(&self, user: UserId, id: AccountId) -> Result<bool> {
        self.delete(user, id).await
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Stored expiry. A value that is present but unreadable maps to a past
/// instant so the token gets refreshed instead of trusted.
fn parse_expiry(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    let expiry = parse_received(raw);
    if expiry == DateTime::<Utc>::MIN_UTC {
        warn!("Unreadable token expiry {raw:?}, treating as expired");
    }
    Some(expiry)
}

/// Convert a database row to a `LinkedAccount`, skipping rows with an
/// unknown provider.
fn row_to_account(row: &SqliteRow) -> Option<LinkedAccount> {
    let id = AccountId::new(row.get("account_id"));
    let account_type: String = row.get("account_type");
    let provider = match account_type.parse() {
        Ok(provider) => provider,
        Err(e) => {
            warn!("Skipping account {id}: {e}");
            return None;
        }
    };

    let token_expiry: Option<String> = row.get("token_expiry");
    let created_at: String = row.get("created_at");

    Some(LinkedAccount {
        id,
        user_id: UserId::new(row.get("user_id")),
        email: row.get("email"),
        provider,
        access_token: row.get("access_token"),
        refresh_token: row.get("refresh_token"),
        token_expiry: parse_expiry(token_expiry.as_deref()),
        created_at: parse_timestamp(&created_at).unwrap_or(DateTime::<Utc>::MIN_UTC),
    })
}
