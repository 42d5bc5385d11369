//! Recifit backend endpoints and dispatch defaults

/// Path prefix of the authenticated API client.
pub const API_PREFIX: &str = "/api";

/// Token-refresh endpoint, called through the general-purpose client.
/// The backend reads the refresh cookie and rotates the session cookies.
pub const REFRESH_PATH: &str = "/api/auth/token";

/// Read-only listing endpoints that may run concurrently with themselves.
pub const DEFAULT_EXEMPT_KEYS: &[&str] = &["get:/users", "get:/recipes"];

/// Name of the session cookie holding the refresh token.
pub const REFRESH_COOKIE_NAME: &str = "refreshToken";
