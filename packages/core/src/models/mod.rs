//! Data Models
//!
//! This module contains the core data structures used throughout PartGraph:
//!
//! - `AssetNode` / `Page` / `AssetWithParents` - shapes returned by queries
//! - `AssetRecord` / `Relationship` - stored row shapes used by ingestion
//! - `schema` - the field whitelist every query is validated against
//!
//! Query responses carry projected attribute maps rather than fixed structs
//! so the wire shape tracks the caller's field selection exactly.

mod asset;
mod relationship;
pub mod schema;

pub use asset::{AssetNode, AssetRecord, AssetWithParents, Page};
pub use relationship::Relationship;
pub use schema::{AssetField, FieldKind};
