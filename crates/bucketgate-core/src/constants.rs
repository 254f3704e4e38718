//! Constants shared by the upload engine

/// Validity of presigned write URLs (single-part and per-part).
pub const DEFAULT_PRESIGN_EXPIRY_SECS: u64 = 360;

/// Lifetime of a cached signing client and its decrypted bucket config.
pub const DEFAULT_CLIENT_CACHE_TTL_SECS: u64 = 600;

/// Interval of the background sweep that drops expired cache entries.
pub const DEFAULT_CLIENT_CACHE_SWEEP_SECS: u64 = 60;

/// Prefix of every storage key minted by the presign and multipart flows.
pub const UPLOAD_KEY_PREFIX: &str = "uploads";

/// Content type recorded when the client does not supply one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Header carrying the access token.
pub const ACCESS_TOKEN_HEADER: &str = "x-access-token";
