//! Tenant Connection Registry
//!
//! Maps tenant identifiers to open [`TenantDatabase`] handles. Handles are
//! created lazily on first use and cached for the life of the registry, so
//! repeated queries for the same tenant share one database handle.
//!
//! Initialization runs under a per-tenant lock: when several tasks ask for
//! an uninitialized tenant at once, exactly one of them opens the database
//! and runs schema setup while the others wait and then receive the cached
//! handle. Different tenants initialize independently.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::CoreConfig;
use crate::db::database::TenantDatabase;
use crate::db::error::DatabaseError;

/// Registry of per-tenant database handles.
#[derive(Debug)]
pub struct TenantRegistry {
    config: CoreConfig,
    handles: Mutex<HashMap<String, Arc<TenantDatabase>>>,
    init_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TenantRegistry {
    /// Create an empty registry over the given configuration.
    pub fn new(config: CoreConfig) -> Self {
        Self {
            config,
            handles: Mutex::new(HashMap::new()),
            init_locks: Mutex::new(HashMap::new()),
        }
    }

    /// The configuration this registry was built with.
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Filesystem path of a tenant's database file.
    pub fn database_path(&self, tenant_id: &str) -> PathBuf {
        self.config.data_dir.join(format!("{}.db", tenant_id))
    }

    /// Tenant ids name database files, so they must be non-empty and free
    /// of path traversal.
    fn validate_tenant(tenant_id: &str) -> Result<(), DatabaseError> {
        if tenant_id.trim().is_empty() {
            return Err(DatabaseError::invalid_tenant("(empty)"));
        }
        if tenant_id.contains('/') || tenant_id.contains('\\') || tenant_id.contains("..") {
            return Err(DatabaseError::invalid_tenant(tenant_id));
        }
        Ok(())
    }

    /// The per-tenant initialization lock, created on first use.
    async fn init_lock(&self, tenant_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.init_locks.lock().await;
        Arc::clone(
            locks
                .entry(tenant_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// Get the database handle for a tenant, initializing it if needed.
    ///
    /// Concurrent calls for the same uninitialized tenant serialize on a
    /// per-tenant lock; all of them resolve to the same cached handle.
    pub async fn connect(&self, tenant_id: &str) -> Result<Arc<TenantDatabase>, DatabaseError> {
        Self::validate_tenant(tenant_id)?;

        {
            let handles = self.handles.lock().await;
            if let Some(handle) = handles.get(tenant_id) {
                return Ok(Arc::clone(handle));
            }
        }

        let lock = self.init_lock(tenant_id).await;
        let _guard = lock.lock().await;

        // Double-check: another task may have finished initialization while
        // this one waited on the key lock.
        {
            let handles = self.handles.lock().await;
            if let Some(handle) = handles.get(tenant_id) {
                return Ok(Arc::clone(handle));
            }
        }

        let db_path = self.database_path(tenant_id);
        tracing::info!(
            "[{}] Initializing tenant database at {:?}",
            tenant_id,
            db_path
        );
        let database = TenantDatabase::new(db_path, self.config.query_timeout()).await?;
        let handle = Arc::new(database);

        let mut handles = self.handles.lock().await;
        handles.insert(tenant_id.to_string(), Arc::clone(&handle));
        Ok(handle)
    }

    /// Ensure a tenant's database exists and its schema is initialized.
    ///
    /// Idempotent; re-initializing an existing tenant is a no-op beyond the
    /// schema's `IF NOT EXISTS` statements.
    pub async fn initialize_tenant(&self, tenant_id: &str) -> Result<(), DatabaseError> {
        self.connect(tenant_id).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry(dir: &TempDir) -> TenantRegistry {
        TenantRegistry::new(CoreConfig::with_data_dir(dir.path()))
    }

    #[tokio::test]
    async fn test_connect_caches_handle() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);

        let first = registry.connect("TENANT-A").await.unwrap();
        let second = registry.connect("TENANT-A").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_tenants_get_separate_databases() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);

        let a = registry.connect("TENANT-A").await.unwrap();
        let b = registry.connect("TENANT-B").await.unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_ne!(a.db_path(), b.db_path());
        assert!(dir.path().join("TENANT-A.db").exists());
        assert!(dir.path().join("TENANT-B.db").exists());
    }

    #[tokio::test]
    async fn test_invalid_tenant_ids_are_rejected() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);

        for bad in ["", "   ", "../escape", "a/b", "a\\b"] {
            let result = registry.connect(bad).await;
            assert!(
                matches!(result, Err(DatabaseError::InvalidTenant(_))),
                "tenant id {:?} must be rejected",
                bad
            );
        }
    }

    #[tokio::test]
    async fn test_initialize_tenant_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);

        registry.initialize_tenant("TENANT-A").await.unwrap();
        registry.initialize_tenant("TENANT-A").await.unwrap();
        assert!(dir.path().join("TENANT-A.db").exists());
    }
}
