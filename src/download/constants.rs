//! Constants for the download module (timeouts, rate limiting).

use std::time::Duration;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (60 seconds; documents are small JSON pages).
pub const READ_TIMEOUT_SECS: u64 = 60;

/// Maximum Retry-After header value (1 hour) to prevent excessive delays.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// User-Agent sent with every request.
pub const USER_AGENT: &str = concat!("qurancom-dl/", env!("CARGO_PKG_VERSION"));
