use crate::IdentityLinkStore;
use async_trait::async_trait;
use oidlink_core::{AccountId, AuthError};
use serde_json::Value;
use sqlx::Database;

/// Identity links kept in a SQL table keyed by the external subject.
///
/// The primary key on `external_subject_id` is what turns a lost sign-up race
/// into [`AuthError::IdentityLinkConflict`].
#[derive(Clone, Debug)]
pub struct SqlLinkStore<DB: Database> {
    pool: sqlx::Pool<DB>,
    table_name: String,
}

impl<DB: Database> SqlLinkStore<DB> {
    pub fn new(pool: sqlx::Pool<DB>) -> Self {
        Self {
            pool,
            table_name: "oidlink_identity_links".to_string(),
        }
    }

    pub fn with_table_name(pool: sqlx::Pool<DB>, table_name: String) -> Self {
        Self { pool, table_name }
    }

    fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
             external_subject_id VARCHAR(255) PRIMARY KEY NOT NULL,
             local_account_id BIGINT NOT NULL,
             cached_profile TEXT NOT NULL,
             updated_at TIMESTAMP NOT NULL)",
            self.table_name
        )
    }
}

fn encode_profile(profile: &Value) -> Result<String, AuthError> {
    serde_json::to_string(profile)
        .map_err(|e| AuthError::Storage(format!("Profile serialization error: {}", e)))
}

fn insert_error(subject_id: &str, backend: &str, e: sqlx::Error) -> AuthError {
    match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AuthError::IdentityLinkConflict(subject_id.to_string())
        }
        _ => AuthError::Storage(format!("{} insert error: {}", backend, e)),
    }
}

#[cfg(feature = "postgres")]
impl SqlLinkStore<sqlx::Postgres> {
    /// Create the link table if it does not exist yet.
    pub async fn migrate(&self) -> Result<(), AuthError> {
        sqlx::query(&self.create_table_sql())
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::Storage(format!("Postgres migrate error: {}", e)))?;
        Ok(())
    }
}

#[cfg(feature = "postgres")]
#[async_trait]
impl IdentityLinkStore for SqlLinkStore<sqlx::Postgres> {
    async fn find_by_external_id(&self, subject_id: &str) -> Result<Option<AccountId>, AuthError> {
        let query = format!(
            "SELECT local_account_id FROM {} WHERE external_subject_id = $1",
            self.table_name
        );
        let row: Option<(i64,)> = sqlx::query_as(&query)
            .bind(subject_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AuthError::Storage(format!("Postgres find error: {}", e)))?;
        Ok(row.map(|(id,)| AccountId(id)))
    }

    async fn insert(
        &self,
        subject_id: &str,
        account: AccountId,
        profile: &Value,
    ) -> Result<(), AuthError> {
        let query = format!(
            "INSERT INTO {} (external_subject_id, local_account_id, cached_profile, updated_at)
             VALUES ($1, $2, $3, $4)",
            self.table_name
        );
        sqlx::query(&query)
            .bind(subject_id)
            .bind(account.0)
            .bind(encode_profile(profile)?)
            .bind(chrono::Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| insert_error(subject_id, "Postgres", e))?;
        Ok(())
    }

    async fn update(&self, subject_id: &str, profile: &Value) -> Result<(), AuthError> {
        let query = format!(
            "UPDATE {} SET cached_profile = $1, updated_at = $2 WHERE external_subject_id = $3",
            self.table_name
        );
        let result = sqlx::query(&query)
            .bind(encode_profile(profile)?)
            .bind(chrono::Utc::now())
            .bind(subject_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::Storage(format!("Postgres update error: {}", e)))?;
        if result.rows_affected() == 0 {
            log::warn!("No identity link to refresh for {subject_id}");
        }
        Ok(())
    }
}

#[cfg(feature = "sqlite")]
impl SqlLinkStore<sqlx::Sqlite> {
    /// Create the link table if it does not exist yet.
    pub async fn migrate(&self) -> Result<(), AuthError> {
        sqlx::query(&self.create_table_sql())
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::Storage(format!("Sqlite migrate error: {}", e)))?;
        Ok(())
    }

    /// The cached profile of `subject_id`.
    pub async fn cached_profile(&self, subject_id: &str) -> Result<Option<Value>, AuthError> {
        let query = format!(
            "SELECT cached_profile FROM {} WHERE external_subject_id = ?1",
            self.table_name
        );
        let row: Option<(String,)> = sqlx::query_as(&query)
            .bind(subject_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AuthError::Storage(format!("Sqlite find error: {}", e)))?;
        row.map(|(json,)| {
            serde_json::from_str(&json)
                .map_err(|e| AuthError::Storage(format!("Profile deserialization error: {}", e)))
        })
        .transpose()
    }
}

#[cfg(feature = "sqlite")]
#[async_trait]
impl IdentityLinkStore for SqlLinkStore<sqlx::Sqlite> {
    async fn find_by_external_id(&self, subject_id: &str) -> Result<Option<AccountId>, AuthError> {
        let query = format!(
            "SELECT local_account_id FROM {} WHERE external_subject_id = ?1",
            self.table_name
        );
        let row: Option<(i64,)> = sqlx::query_as(&query)
            .bind(subject_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AuthError::Storage(format!("Sqlite find error: {}", e)))?;
        Ok(row.map(|(id,)| AccountId(id)))
    }

    async fn insert(
        &self,
        subject_id: &str,
        account: AccountId,
        profile: &Value,
    ) -> Result<(), AuthError> {
        let query = format!(
            "INSERT INTO {} (external_subject_id, local_account_id, cached_profile, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            self.table_name
        );
        sqlx::query(&query)
            .bind(subject_id)
            .bind(account.0)
            .bind(encode_profile(profile)?)
            .bind(chrono::Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| insert_error(subject_id, "Sqlite", e))?;
        Ok(())
    }

    async fn update(&self, subject_id: &str, profile: &Value) -> Result<(), AuthError> {
        let query = format!(
            "UPDATE {} SET cached_profile = ?1, updated_at = ?2 WHERE external_subject_id = ?3",
            self.table_name
        );
        let result = sqlx::query(&query)
            .bind(encode_profile(profile)?)
            .bind(chrono::Utc::now())
            .bind(subject_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::Storage(format!("Sqlite update error: {}", e)))?;
        if result.rows_affected() == 0 {
            log::warn!("No identity link to refresh for {subject_id}");
        }
        Ok(())
    }
}
