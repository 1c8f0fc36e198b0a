//! Tenant Database Service
//!
//! One libsql database file per tenant, holding that tenant's asset rows and
//! parent/child relationship edges. The service owns schema initialization
//! and exposes thin query helpers; everything above it works with SQL text
//! plus positionally bound parameters.
//!
//! # Architecture
//!
//! - **Local file per tenant**: opened via libsql `Builder::new_local`
//! - **WAL mode**: Write-Ahead Logging for better concurrency
//! - **Busy timeout**: 5 seconds on every connection, so concurrent readers
//!   wait instead of failing with `SQLITE_BUSY`
//! - **Idempotent schema**: `CREATE TABLE IF NOT EXISTS`, safe on every open
//! - **Optional deadline**: per-query timeout via `tokio::time::timeout`
//!
//! Query results are raw `libsql::Row`s; decoding into attribute maps is the
//! caller's concern because the projection is caller-controlled.

use libsql::{params_from_iter, Builder, Connection, Database};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::db::error::DatabaseError;
use crate::models::{AssetRecord, Relationship};

/// Handle to one tenant's database file.
///
/// # Examples
///
/// ```no_run
/// use partgraph_core::db::TenantDatabase;
/// use std::path::PathBuf;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db = TenantDatabase::new(PathBuf::from("/data/TENANT.db"), None).await?;
///     let rows = db.query("SELECT COUNT(*) FROM assets", Vec::new()).await?;
///     println!("{} asset rows", rows[0].get::<i64>(0)?);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct TenantDatabase {
    /// libsql database handle (wrapped in Arc for sharing)
    db: Arc<Database>,

    /// Path to the database file
    db_path: PathBuf,

    /// Optional deadline applied to every query
    query_timeout: Option<Duration>,
}

impl TenantDatabase {
    /// Open or create the tenant database at `db_path`.
    ///
    /// Creates the parent directory when missing and initializes the schema.
    /// A fresh database gets its WAL checkpointed once so the file is
    /// complete on disk immediately after creation.
    pub async fn new(
        db_path: PathBuf,
        query_timeout: Option<Duration>,
    ) -> Result<Self, DatabaseError> {
        let is_new_database = !db_path.exists();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                if e.kind() == std::io::ErrorKind::PermissionDenied {
                    DatabaseError::permission_denied(parent.to_path_buf())
                } else {
                    DatabaseError::DirectoryCreationFailed(e)
                }
            })?;
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e))?;

        let service = Self {
            db: Arc::new(db),
            db_path,
            query_timeout,
        };
        service.initialize_schema(is_new_database).await?;
        Ok(service)
    }

    /// Execute a PRAGMA statement.
    ///
    /// PRAGMA statements return rows, so this uses query instead of execute.
    async fn execute_pragma(&self, conn: &Connection, pragma: &str) -> Result<(), DatabaseError> {
        let mut stmt = conn.prepare(pragma).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to prepare pragma '{}': {}", pragma, e))
        })?;
        stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute pragma '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    async fn initialize_schema(&self, is_new_database: bool) -> Result<(), DatabaseError> {
        let conn = self.connect()?;

        self.execute_pragma(&conn, "PRAGMA journal_mode = WAL")
            .await?;
        self.execute_pragma(&conn, "PRAGMA busy_timeout = 5000")
            .await?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS assets (
                serial_number_customer TEXT PRIMARY KEY,
                serial_number_manufacturer TEXT NOT NULL,
                part_name_manufacturer TEXT NOT NULL,
                part_number_manufacturer TEXT NOT NULL,
                part_number_customer TEXT NOT NULL,
                manufacturer TEXT NOT NULL,
                production_country_code_manufacturer TEXT NOT NULL,
                production_date_gmt DATETIME NOT NULL,
                quality_status TEXT NOT NULL,
                status TEXT NOT NULL,
                mspid TEXT NOT NULL
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to create assets table: {}", e))
        })?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS relationships (
                parent_serial_number_customer TEXT NOT NULL,
                child_serial_number_customer TEXT NOT NULL,
                transfer_status TEXT NOT NULL DEFAULT 'PENDING',
                PRIMARY KEY (parent_serial_number_customer, child_serial_number_customer)
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to create relationships table: {}", e))
        })?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_assets_production_date
             ON assets(production_date_gmt)",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to create production date index: {}", e))
        })?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_assets_mspid ON assets(mspid)",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to create mspid index: {}", e))
        })?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_relationships_child
             ON relationships(child_serial_number_customer)",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to create child edge index: {}", e))
        })?;

        if is_new_database {
            // Flush the WAL so a brand-new database file is complete on disk
            self.execute_pragma(&conn, "PRAGMA wal_checkpoint(TRUNCATE)")
                .await?;
            tracing::info!("Created new tenant database at {:?}", self.db_path);
        }

        Ok(())
    }

    /// Get a connection to the database.
    pub fn connect(&self) -> Result<Connection, DatabaseError> {
        self.db.connect().map_err(DatabaseError::LibsqlError)
    }

    /// Get a connection with the busy timeout applied.
    ///
    /// Use this in async contexts so concurrent operations wait and retry
    /// instead of failing immediately with `SQLITE_BUSY`.
    pub async fn connect_with_timeout(&self) -> Result<Connection, DatabaseError> {
        let conn = self.connect()?;
        self.execute_pragma(&conn, "PRAGMA busy_timeout = 5000")
            .await?;
        Ok(conn)
    }

    /// Path of the underlying database file.
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Run a read query with positionally bound parameters.
    ///
    /// Applies the configured per-query deadline when one is set. Deadline
    /// hits surface as [`DatabaseError::Timeout`] and are not retried.
    pub async fn query(
        &self,
        sql: &str,
        params: Vec<libsql::Value>,
    ) -> Result<Vec<libsql::Row>, DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        tracing::debug!("Executing query with {} parameters: {}", params.len(), sql);

        let run = async {
            let mut stmt = conn.prepare(sql).await.map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare query: {}", e))
            })?;
            let mut rows = stmt.query(params_from_iter(params)).await.map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to execute query: {}", e))
            })?;

            let mut collected = Vec::new();
            while let Some(row) = rows.next().await.map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to read query row: {}", e))
            })? {
                collected.push(row);
            }
            Ok(collected)
        };

        match self.query_timeout {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .map_err(|_| DatabaseError::timeout(limit.as_millis() as u64, sql.to_string()))?,
            None => run.await,
        }
    }

    /// Insert or replace one asset row.
    pub async fn insert_asset(&self, asset: &AssetRecord) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        let params = vec![
            libsql::Value::Text(asset.serial_number_customer.clone()),
            libsql::Value::Text(asset.serial_number_manufacturer.clone()),
            libsql::Value::Text(asset.part_name_manufacturer.clone()),
            libsql::Value::Text(asset.part_number_manufacturer.clone()),
            libsql::Value::Text(asset.part_number_customer.clone()),
            libsql::Value::Text(asset.manufacturer.clone()),
            libsql::Value::Text(asset.production_country_code_manufacturer.clone()),
            libsql::Value::Text(asset.production_date_gmt.clone()),
            libsql::Value::Text(asset.quality_status.clone()),
            libsql::Value::Text(asset.status.clone()),
            libsql::Value::Text(asset.mspid.clone()),
        ];

        conn.execute(
            "INSERT OR REPLACE INTO assets (
                serial_number_customer, serial_number_manufacturer, part_name_manufacturer,
                part_number_manufacturer, part_number_customer, manufacturer,
                production_country_code_manufacturer, production_date_gmt, quality_status,
                status, mspid
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params_from_iter(params),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to insert asset: {}", e)))?;
        Ok(())
    }

    /// Insert or replace one relationship edge.
    pub async fn insert_relationship(&self, edge: &Relationship) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        conn.execute(
            "INSERT OR REPLACE INTO relationships (
                parent_serial_number_customer, child_serial_number_customer, transfer_status
            ) VALUES (?, ?, ?)",
            (
                edge.parent_serial_number_customer.clone(),
                edge.child_serial_number_customer.clone(),
                edge.transfer_status.clone(),
            ),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to insert relationship: {}", e))
        })?;
        Ok(())
    }
}

/// Convert a stored SQL value into its JSON attribute form.
pub(crate) fn value_to_json(value: libsql::Value) -> serde_json::Value {
    match value {
        libsql::Value::Null => serde_json::Value::Null,
        libsql::Value::Integer(i) => serde_json::Value::from(i),
        libsql::Value::Real(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        libsql::Value::Text(s) => serde_json::Value::String(s),
        libsql::Value::Blob(_) => serde_json::Value::Null,
    }
}
