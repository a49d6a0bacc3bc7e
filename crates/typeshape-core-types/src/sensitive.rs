//! Sensitive value marker for error-message redaction
//!
//! Fields declared `sensitive` never echo the offending value back in a
//! validation error. `Sensitive<T>` carries such a value through the
//! error path and renders as a fixed marker.

use std::fmt;

/// Marker rendered in place of a redacted value
pub const REDACTED: &str = "***REDACTED***";

/// Wrapper for sensitive data that redacts itself in Debug and Display
///
/// # Example
///
/// ```
/// use typeshape_core_types::Sensitive;
///
/// let ssn = Sensitive::new("123-45-6789");
/// assert_eq!(format!("{}", ssn), "***REDACTED***");
/// assert_eq!(ssn.expose(), &"123-45-6789");
/// ```
pub struct Sensitive<T>(T);

impl<T> Sensitive<T> {
    /// Wrap a sensitive value
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Expose the underlying value
    pub fn expose(&self) -> &T {
        &self.0
    }

    /// Consume the wrapper and return the inner value
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: fmt::Display> Sensitive<T> {
    /// Render the value, or the redaction marker when `redact` is set
    pub fn render(value: T, redact: bool) -> String {
        if redact {
            Self::new(value).to_string()
        } else {
            value.to_string()
        }
    }
}

impl<T> fmt::Debug for Sensitive<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", REDACTED)
    }
}

impl<T> fmt::Display for Sensitive<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", REDACTED)
    }
}

impl<T: Clone> Clone for Sensitive<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensitive_debug_redaction() {
        let secret = Sensitive::new("my-secret-password");
        let debug_str = format!("{:?}", secret);
        assert_eq!(debug_str, REDACTED);
        assert!(!debug_str.contains("my-secret-password"));
    }

    #[test]
    fn test_render_switch() {
        assert_eq!(Sensitive::render(42, false), "42");
        assert_eq!(Sensitive::render(42, true), REDACTED);
    }

    #[test]
    fn test_sensitive_into_inner() {
        let secret = Sensitive::new(String::from("test"));
        assert_eq!(secret.clone().into_inner(), "test");
        assert_eq!(secret.expose(), "test");
    }
}
