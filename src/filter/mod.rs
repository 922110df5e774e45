pub mod types;
pub mod access;
pub mod merge;
pub mod error;

pub use types::*;
pub use access::{AccessPolicy, ResourceAccess};
pub use merge::{merge_secure_filters, prepare_query_filters};
pub use error::FilterError;
