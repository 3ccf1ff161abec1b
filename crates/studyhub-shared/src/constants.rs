/// Minimum number of characters in a peer search query.
pub const MIN_SEARCH_QUERY_LEN: usize = 2;

/// Maximum number of identities returned by a peer search.
pub const MAX_SEARCH_RESULTS: usize = 10;

/// Inclusive lower bound of `Card.progress`.
pub const PROGRESS_MIN: i64 = 0;

/// Inclusive upper bound of `Card.progress` (a percentage).
pub const PROGRESS_MAX: i64 = 100;

/// Maximum length of topic and card names.
pub const MAX_NAME_LEN: usize = 255;

pub const MIN_USERNAME_LEN: usize = 3;
pub const MAX_USERNAME_LEN: usize = 150;

pub const MIN_PASSWORD_LEN: usize = 8;

/// Bearer tokens are 32 random bytes, hex-encoded.
pub const TOKEN_BYTES: usize = 32;

/// Default lifetime of a bearer token (24 hours).
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

/// Longest accepted token lifetime (10 years).
pub const MAX_TOKEN_TTL_SECS: i64 = 10 * 365 * 24 * 60 * 60;
