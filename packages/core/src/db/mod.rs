//! Database Layer
//!
//! This module handles all storage interactions using libsql:
//!
//! - One local database file per tenant, schema initialized on first open
//! - A registry caching tenant handles with single-flight initialization
//! - Thin query helpers taking SQL text plus positionally bound parameters
//!
//! # Architecture
//!
//! Tenants are fully isolated at the file level. Nothing above this layer
//! holds a connection; services resolve a [`TenantDatabase`] through the
//! [`TenantRegistry`] per call and run bounded queries against it.

mod database;
mod error;
mod registry;

pub(crate) use database::value_to_json;

pub use database::TenantDatabase;
pub use error::DatabaseError;
pub use registry::TenantRegistry;
