//! Query execution behind the read-only guard.

mod executor;

pub use executor::{GuardedExecutor, DEFAULT_QUERY_TIMEOUT};
