//! # Transport Security Resolution
//!
//! Maps the optional `ssl` field of a secret onto a TLS requirement and a
//! fallback permission.

use serde_json::Value;

/// Resolved transport-security policy for one connection attempt sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SslPolicy {
    /// Attempt an encrypted (verify-full) connection first
    pub required: bool,
    /// Permit one unencrypted attempt if the encrypted one fails
    pub fallback: bool,
}

impl SslPolicy {
    /// Encryption required, one plaintext fallback permitted
    pub const REQUIRE_WITH_FALLBACK: SslPolicy = SslPolicy {
        required: true,
        fallback: true,
    };

    /// Resolve the policy from the raw `ssl` field
    ///
    /// - absent: require TLS, permit fallback
    /// - boolean: exactly that value, no fallback
    /// - `"true"`/`"false"` (any case): that value, no fallback
    /// - any other string or type: require TLS, permit fallback
    #[must_use]
    pub fn resolve(ssl: Option<&Value>) -> Self {
        match ssl {
            Some(Value::Bool(required)) => SslPolicy {
                required: *required,
                fallback: false,
            },
            Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => SslPolicy {
                required: true,
                fallback: false,
            },
            Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => SslPolicy {
                required: false,
                fallback: false,
            },
            _ => Self::REQUIRE_WITH_FALLBACK,
        }
    }

    /// TLS modes to try, in order
    #[must_use]
    pub fn attempts(&self) -> Vec<bool> {
        if self.required && self.fallback {
            vec![true, false]
        } else {
            vec![self.required]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolve(value: Option<Value>) -> (bool, bool) {
        let policy = SslPolicy::resolve(value.as_ref());
        (policy.required, policy.fallback)
    }

    #[test]
    fn test_missing_ssl_requires_tls_with_fallback() {
        assert_eq!(resolve(None), (true, true));
    }

    #[test]
    fn test_boolean_ssl_is_taken_literally() {
        assert_eq!(resolve(Some(json!(false))), (false, false));
        assert_eq!(resolve(Some(json!(true))), (true, false));
    }

    #[test]
    fn test_string_ssl_is_case_insensitive() {
        assert_eq!(resolve(Some(json!("TRUE"))), (true, false));
        assert_eq!(resolve(Some(json!("False"))), (false, false));
    }

    #[test]
    fn test_unrecognized_ssl_defaults_to_tls_with_fallback() {
        assert_eq!(resolve(Some(json!("maybe"))), (true, true));
        assert_eq!(resolve(Some(json!(1))), (true, true));
        assert_eq!(resolve(Some(json!(null))), (true, true));
        assert_eq!(resolve(Some(json!({"mode": "verify-full"}))), (true, true));
    }

    #[test]
    fn test_attempt_order() {
        assert_eq!(SslPolicy::REQUIRE_WITH_FALLBACK.attempts(), vec![true, false]);
        assert_eq!(
            SslPolicy {
                required: false,
                fallback: false
            }
            .attempts(),
            vec![false]
        );
        assert_eq!(
            SslPolicy {
                required: true,
                fallback: false
            }
            .attempts(),
            vec![true]
        );
    }
}
