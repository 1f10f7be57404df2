//! The datastore capability and its Postgres implementation.
//!
//! Driver errors are classified into `DatastoreErrorKind` here and nowhere
//! else.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use janitor_types::{DatastoreError, DatastoreErrorKind};
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::Postgres;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::StoreError;

/// SQLSTATE raised when `statement_timeout` cancels a query.
const QUERY_CANCELED: &str = "57014";
/// SQLSTATE raised for features the server does not support.
const FEATURE_NOT_SUPPORTED: &str = "0A000";

/// Advisory lock key held for the whole cascade window ("janitor").
const CONSTRAINT_LOCK_KEY: i64 = 0x6a61_6e69_746f_72;

/// Extra time the client waits beyond the server-side statement timeout
/// before giving up on its own.
const CLIENT_GRACE: Duration = Duration::from_secs(5);

/// Something that can execute one script and report rows affected.
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Execute `script` as a single unit, bounded by `timeout`.
    async fn execute(&self, script: &str, timeout: Duration) -> Result<u64, DatastoreError>;

    /// Name of the database the connection targets.
    fn database_name(&self) -> &str;

    /// Take the lock that serializes constraint brackets across every
    /// client of the datastore, waiting until it is free.
    ///
    /// The default only suits a datastore with a single client.
    async fn acquire_constraint_lock(&self) -> Result<(), DatastoreError> {
        Ok(())
    }

    /// Release the lock taken by [`Datastore::acquire_constraint_lock`].
    async fn release_constraint_lock(&self) -> Result<(), DatastoreError> {
        Ok(())
    }
}

/// Postgres datastore backed by a sqlx connection pool.
///
/// The constraint lock is a session-level advisory lock, so the connection
/// that took it is kept out of the pool until it is released.
pub struct PgDatastore {
    pool: PgPool,
    database: String,
    lock_holder: Mutex<Option<PoolConnection<Postgres>>>,
}

impl PgDatastore {
    /// Connect to the datastore at `url`.
    ///
    /// `statement_timeout` is installed as the server-side statement timeout
    /// on every pooled connection.
    pub async fn connect(url: &str, statement_timeout: Duration) -> Result<Self, StoreError> {
        let options = PgConnectOptions::from_str(url)
            .map_err(|e| StoreError::ConnectionString(e.to_string()))?
            .options([(
                "statement_timeout",
                format!("{}ms", statement_timeout.as_millis()),
            )]);

        // Postgres falls back to the user name when no database is given.
        let database = options
            .get_database()
            .map(str::to_string)
            .unwrap_or_else(|| options.get_username().to_string());

        let pool = PgPoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await?;

        info!(database = %database, "Connected to datastore");
        Ok(Self {
            pool,
            database,
            lock_holder: Mutex::new(None),
        })
    }
}

#[async_trait]
impl Datastore for PgDatastore {
    async fn execute(&self, script: &str, timeout: Duration) -> Result<u64, DatastoreError> {
        debug!(script_len = script.len(), "Executing script");
        let work = sqlx::raw_sql(script).execute(&self.pool);
        match tokio::time::timeout(timeout + CLIENT_GRACE, work).await {
            Ok(Ok(result)) => Ok(result.rows_affected()),
            Ok(Err(err)) => Err(classify_driver_error(err)),
            Err(_) => Err(DatastoreError::timeout(format!(
                "Timeout expired after {}s",
                timeout.as_secs()
            ))),
        }
    }

    fn database_name(&self) -> &str {
        &self.database
    }

    async fn acquire_constraint_lock(&self) -> Result<(), DatastoreError> {
        let mut holder = self.lock_holder.lock().await;
        if holder.is_some() {
            return Err(DatastoreError::generic(
                "constraint lock is already held by this client",
            ));
        }

        let mut conn = self.pool.acquire().await.map_err(classify_driver_error)?;
        sqlx::query("SELECT pg_advisory_lock($1)")
            .bind(CONSTRAINT_LOCK_KEY)
            .execute(conn.as_mut())
            .await
            .map_err(classify_driver_error)?;

        debug!(key = CONSTRAINT_LOCK_KEY, "Constraint lock acquired");
        *holder = Some(conn);
        Ok(())
    }

    async fn release_constraint_lock(&self) -> Result<(), DatastoreError> {
        let Some(mut conn) = self.lock_holder.lock().await.take() else {
            return Ok(());
        };

        let unlocked = sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(CONSTRAINT_LOCK_KEY)
            .execute(conn.as_mut())
            .await;
        match unlocked {
            Ok(_) => {
                debug!(key = CONSTRAINT_LOCK_KEY, "Constraint lock released");
                Ok(())
            }
            Err(err) => {
                // Ending the session frees every advisory lock it holds.
                if let Err(close_err) = conn.close().await {
                    warn!(error = %close_err, "Failed to close constraint lock session");
                }
                Err(classify_driver_error(err))
            }
        }
    }
}

/// Classify a sqlx error: SQLSTATE first, message content second.
pub(crate) fn classify_driver_error(err: sqlx::Error) -> DatastoreError {
    if let sqlx::Error::Database(db) = &err {
        match db.code().as_deref() {
            Some(QUERY_CANCELED) => return DatastoreError::timeout(db.message()),
            Some(FEATURE_NOT_SUPPORTED) => {
                return DatastoreError::new(
                    DatastoreErrorKind::RestrictedFeature(db.message().to_string()),
                    db.message(),
                );
            }
            _ => {}
        }
    }
    DatastoreError::classify(err.to_string())
}
