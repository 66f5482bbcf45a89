use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use std::time::Duration;

use crate::utils::errors::StoreError;

pub mod retry;
pub mod table;

/// Initialize the MySQL connection pool
pub async fn init_db(database_url: &str) -> Result<MySqlPool, sqlx::Error> {
    MySqlPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(30))
        .connect(database_url)
        .await
}

/// Accept only `[A-Za-z0-9_]` names so they can be interpolated into SQL
pub fn validate_identifier(name: &str) -> Result<&str, StoreError> {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(name)
    } else {
        Err(StoreError::InvalidIdentifier(name.to_string()))
    }
}
