//! Compile-time tunables for the query iteration core.
//!
//! Kept as plain constants rather than environment-driven values, since this
//! crate (unlike the full server) has no process-lifetime configuration
//! surface to read them from.

/// Maximum number of key-value pairs fetched in a single range-scan page by
/// [`crate::dbs::iterator`]'s table scan driver.
pub const NORMAL_FETCH_SIZE: u32 = 10_000;
