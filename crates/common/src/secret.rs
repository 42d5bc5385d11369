//! Secret wrapper for session credentials

use std::fmt;
use zeroize::Zeroize;

/// Sensitive value (refresh tokens, session cookies) - redacted in Debug/Display/logs
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Expose the inner value (use sparingly)
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> Drop for Secret<T> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl Secret<String> {
    /// `name=value; Path=/` cookie line for seeding a cookie jar. The line is
    /// itself a secret, so the formatted copy is wiped as well.
    pub fn cookie(&self, name: &str) -> Secret<String> {
        Secret(format!("{name}={}; Path=/", self.0))
    }
}
