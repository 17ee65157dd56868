//! Secret type for API-key handling with automatic memory zeroization.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::{Zeroize, Zeroizing};

/// An opaque secret (sandbox API key) that zeroizes its contents on drop.
///
/// Debug and Display output is always redacted, so a `Secret` can never
/// leak through log interpolation.
#[derive(Clone)]
pub struct Secret(Zeroizing<String>);

impl Secret {
    pub fn new(s: String) -> Self {
        Self(Zeroizing::new(s))
    }

    /// Exposes the secret for use in an outgoing request header.
    ///
    /// Avoid copying the returned value; copies are not zeroized.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for Secret {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for Secret {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        // Constant-time comparison to prevent timing attacks
        use subtle::ConstantTimeEq;
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl Eq for Secret {}

impl Serialize for Secret {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Secret::new(s))
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expose_returns_inner_value() {
        let secret = Secret::new("api-key-123".to_string());
        assert_eq!(secret.expose(), "api-key-123");
        assert!(!secret.is_empty());
    }

    #[test]
    fn debug_and_display_are_redacted() {
        let secret = Secret::from("super-secret");
        assert!(!format!("{:?}", secret).contains("super-secret"));
        assert!(!format!("{}", secret).contains("super-secret"));
    }

    #[test]
    fn equality_compares_contents() {
        assert_eq!(Secret::from("same"), Secret::from("same"));
        assert_ne!(Secret::from("same"), Secret::from("other"));
    }

    #[test]
    fn serde_round_trip() {
        let original = Secret::from("serialized-key");
        let json = serde_json::to_string(&original).unwrap();
        let back: Secret = serde_json::from_str(&json).unwrap();
        assert_eq!(original, back);
    }
}
