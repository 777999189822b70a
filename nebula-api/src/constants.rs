//! Constants shared across the API layer.

/// Default CORS max age in seconds (24 hours).
pub const DEFAULT_CORS_MAX_AGE_SECS: u64 = 86400;

/// Default rate limit for unauthenticated requests (per minute).
pub const DEFAULT_RATE_LIMIT_UNAUTHENTICATED: u32 = 60;

/// Default rate limit for authenticated requests (per minute).
pub const DEFAULT_RATE_LIMIT_AUTHENTICATED: u32 = 600;

/// Default burst size for rate limiting.
pub const DEFAULT_RATE_LIMIT_BURST: u32 = 10;

/// Default page size for list/history operations.
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Maximum page size for list/history operations.
pub const MAX_PAGE_SIZE: i64 = 1000;

/// Maximum number of ids accepted by a bulk tag/scope mutation.
pub const MAX_BATCH_ITEMS: usize = 100;

/// The lookup-prefix length every generated API key carries (`nbl_` + 4).
pub const API_KEY_PREFIX_LEN: usize = 8;

/// Development server URL, used by the OpenAPI server list.
pub const DEV_SERVER_URL: &str = "http://localhost:8080";
