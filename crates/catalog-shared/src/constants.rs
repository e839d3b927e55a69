/// Application name
pub const APP_NAME: &str = "Course Catalog";

/// Length of the random prefix put in front of every slug
pub const SLUG_PREFIX_LEN: usize = 4;

/// Alphabet the slug prefix is drawn from
pub const SLUG_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Number of existence probes before a slug is accepted as-is
pub const MAX_SLUG_ATTEMPTS: usize = 10;

/// Access token lifetime (24 hours)
pub const ACCESS_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

/// Refresh token lifetime (7 days)
pub const REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Default page size for list endpoints
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Maximum upload size in bytes (100 MiB)
pub const MAX_UPLOAD_SIZE: usize = 100 * 1024 * 1024;

/// Default HTTP API port
pub const DEFAULT_HTTP_PORT: u16 = 8000;
