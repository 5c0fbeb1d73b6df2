//! Result cache module.
//!
//! Keeps recent successful check results in memory so that an endpoint is not
//! probed again while its last good result is still fresh. Entries expire
//! lazily: they are only dropped when read or when a cleanup scan runs.

mod entry;
mod store;

pub use entry::*;
pub use store::*;
