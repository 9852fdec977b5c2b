pub mod config;
pub mod engine;
pub mod errors;
pub mod model;
pub mod probe;
pub mod schedule;
pub mod storage;
pub mod validate;

pub use engine::checker::{Checker, CleanupPolicy};
pub use errors::{ConfigError, StoreError};
pub use storage::Store;
