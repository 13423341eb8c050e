use serde_json::Value;
use thiserror::Error;

/// Fallback applied when a 429 response carries no usable `Retry-After` header.
pub const DEFAULT_RETRY_AFTER_SECS: f64 = 60.0;

/// Every failure the SDK can surface.
///
/// 4xx classifications and `Decode` are terminal on first occurrence; 5xx and
/// `Connectivity` failures are retried by the request pipeline and only reach
/// the caller wrapped in `NetworkExhausted`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// HTTP 401.
    #[error("authentication failed: {message}")]
    Authentication { message: String },

    /// HTTP 402.
    #[error("quota exceeded: {message}")]
    QuotaExceeded { message: String },

    /// HTTP 400 or 422. `field` is set when the service names the offending
    /// request field.
    #[error("validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// HTTP 429. `retry_after_secs` comes from the `Retry-After` header.
    #[error("rate limit exceeded: {message} (retry after {retry_after_secs}s)")]
    RateLimit {
        message: String,
        retry_after_secs: f64,
    },

    /// Any other non-success HTTP status.
    #[error("service error (HTTP {status}): {message}")]
    Service { status: u16, message: String },

    /// Transport-level failure: connection refused, DNS failure, timeout.
    #[error("connection failed: {message}")]
    Connectivity { message: String },

    /// All retry attempts were consumed by 5xx or connectivity failures.
    #[error("request failed after {attempts} attempts")]
    NetworkExhausted {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    /// Malformed success body, or a field that cannot be coerced to its
    /// expected type.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl Error {
    /// Stable machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidConfiguration(_) => "INVALID_CONFIGURATION",
            Error::Authentication { .. } => "AUTHENTICATION_ERROR",
            Error::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            Error::Validation { .. } => "VALIDATION_ERROR",
            Error::RateLimit { .. } => "RATE_LIMIT_ERROR",
            Error::Service { .. } => "SERVICE_ERROR",
            Error::Connectivity { .. } => "NETWORK_ERROR",
            Error::NetworkExhausted { .. } => "NETWORK_ERROR",
            Error::Decode(_) => "DECODE_ERROR",
        }
    }

    /// HTTP status associated with the error, where one applies.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Authentication { .. } => Some(401),
            Error::QuotaExceeded { .. } => Some(402),
            Error::Validation { .. } => Some(400),
            Error::RateLimit { .. } => Some(429),
            Error::Service { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Map a completed, non-2xx HTTP attempt onto the error taxonomy.
///
/// Pure function of the response: the body is parsed leniently (error bodies
/// are not guaranteed to be JSON) and the message is taken from
/// `error.message`, `message`, or `detail`, in that order.
pub(crate) fn classify_http_error(status: u16, body: &str, retry_after: Option<&str>) -> Error {
    let parsed: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let message = error_message(&parsed)
        .unwrap_or_else(|| format!("moderation request failed (HTTP {status})"));

    match status {
        401 => Error::Authentication { message },
        402 => Error::QuotaExceeded { message },
        400 | 422 => Error::Validation {
            message,
            field: error_field(&parsed),
        },
        429 => Error::RateLimit {
            message,
            retry_after_secs: retry_after
                .and_then(|raw| raw.trim().parse::<f64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS),
        },
        _ => Error::Service { status, message },
    }
}

fn error_message(body: &Value) -> Option<String> {
    body.pointer("/error/message")
        .or_else(|| body.get("message"))
        .or_else(|| body.get("detail"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn error_field(body: &Value) -> Option<String> {
    body.pointer("/error/field")
        .or_else(|| body.get("field"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_authentication_errors() {
        let err = classify_http_error(401, r#"{"error":{"message":"bad key"}}"#, None);
        assert!(matches!(err, Error::Authentication { ref message } if message == "bad key"));
        assert_eq!(err.code(), "AUTHENTICATION_ERROR");
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn classifies_quota_errors() {
        let err = classify_http_error(402, r#"{"message":"plan exhausted"}"#, None);
        assert!(matches!(err, Error::QuotaExceeded { ref message } if message == "plan exhausted"));
    }

    #[test]
    fn classifies_validation_errors_with_field() {
        let err = classify_http_error(422, r#"{"detail":"input too long","field":"input"}"#, None);
        match err {
            Error::Validation { message, field } => {
                assert_eq!(message, "input too long");
                assert_eq!(field.as_deref(), Some("input"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn status_400_is_validation_too() {
        let err = classify_http_error(400, "{}", None);
        assert!(matches!(err, Error::Validation { field: None, .. }));
    }

    #[test]
    fn rate_limit_parses_retry_after_header() {
        let err = classify_http_error(429, "{}", Some("2.5"));
        assert!(
            matches!(err, Error::RateLimit { retry_after_secs, .. } if (retry_after_secs - 2.5).abs() < f64::EPSILON)
        );
    }

    #[test]
    fn rate_limit_defaults_when_header_missing_or_garbled() {
        for retry_after in [None, Some("soon"), Some("")] {
            let err = classify_http_error(429, "{}", retry_after);
            assert!(
                matches!(err, Error::RateLimit { retry_after_secs, .. } if retry_after_secs == DEFAULT_RETRY_AFTER_SECS)
            );
        }
    }

    #[test]
    fn unknown_4xx_becomes_service_error() {
        let err = classify_http_error(404, "not json at all", None);
        match err {
            Error::Service { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "moderation request failed (HTTP 404)");
            }
            other => panic!("expected service error, got {other:?}"),
        }
    }

    #[test]
    fn message_extraction_prefers_nested_error_message() {
        let body = r#"{"error":{"message":"nested"},"message":"flat","detail":"fallback"}"#;
        let err = classify_http_error(500, body, None);
        assert!(matches!(err, Error::Service { ref message, .. } if message == "nested"));
    }

    #[test]
    fn message_extraction_falls_back_to_detail() {
        let err = classify_http_error(500, r#"{"detail":"only detail"}"#, None);
        assert!(matches!(err, Error::Service { ref message, .. } if message == "only detail"));
    }

    #[test]
    fn network_exhausted_reports_attempt_count() {
        let err = Error::NetworkExhausted {
            attempts: 4,
            source: Box::new(Error::Connectivity {
                message: "connection refused".into(),
            }),
        };
        assert_eq!(err.to_string(), "request failed after 4 attempts");
        assert_eq!(err.code(), "NETWORK_ERROR");
        assert!(std::error::Error::source(&err).is_some());
    }
}
