//! Query Layer
//!
//! Everything between a caller's filter object and executable SQL:
//!
//! - `filter` - declarative selection types and their parsed conditions
//! - `sanitize` - whitelist cleanup for field lists and filter objects
//! - `compiler` - predicate and binding emission
//!
//! The layer is pure: no connections, no execution. Services feed compiled
//! queries to the database layer.

mod compiler;
mod filter;
mod sanitize;

pub use compiler::{compile, Binding, CompiledQuery};
pub use filter::{
    filter_by_serial_numbers, AssetFilter, CompareOp, FieldSelection, FilterCondition,
    SelectionOperator, ValidationError,
};
pub use sanitize::{clean_fields, clean_filter};
