use finboard_core::ValidationErrors;
use serde_json::Value;

pub type Result<T> = std::result::Result<T, ApiError>;

/// Everything a call into the finance API can fail with.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// 401 from the backend. `session_cleared` is false when the dev bypass
    /// suppressed the logout.
    #[error("not authenticated")]
    Unauthorized {
        session_cleared: bool,
        detail: Option<String>,
    },

    #[error("request failed with status {status}")]
    Http { status: u16, detail: Option<String> },

    #[error("network error: {0}")]
    Network(String),

    #[error("could not decode response from {path}: {message}")]
    Decode { path: String, message: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("cannot read {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("token store: {0}")]
    TokenStore(#[from] std::io::Error),
}

pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { .. } => Some(401),
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Text for a user-facing notification: the backend's `detail` when it
    /// sent one, otherwise a generic message.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Unauthorized {
                detail: Some(d), ..
            } => d.clone(),
            ApiError::Unauthorized { .. } => "Your session has expired. Please log in again.".into(),
            ApiError::Http {
                detail: Some(d), ..
            } => d.clone(),
            ApiError::Validation(v) => v.to_string(),
            ApiError::Network(_) => "Could not reach the server. Check your connection.".into(),
            _ => GENERIC_ERROR_MESSAGE.into(),
        }
    }
}

/// Pull a human message out of an error body.
///
/// Handles `{"detail": "..."}`, `{"detail": [{"msg": ...}, ...]}` (field
/// validation errors) and `{"message": "..."}`.
pub fn parse_error_detail(body: &[u8]) -> Option<String> {
    let v: Value = serde_json::from_slice(body).ok()?;
    let detail = v.get("detail").or_else(|| v.get("message"))?;
    match detail {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Array(items) => {
            let msgs: Vec<String> = items
                .iter()
                .filter_map(|it| {
                    let msg = it.get("msg")?.as_str()?;
                    let field = it
                        .get("loc")
                        .and_then(Value::as_array)
                        .and_then(|loc| loc.last())
                        .and_then(Value::as_str);
                    Some(match field {
                        Some(f) => format!("{f}: {msg}"),
                        None => msg.to_string(),
                    })
                })
                .collect();
            (!msgs.is_empty()).then(|| msgs.join("; "))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_string() {
        let d = parse_error_detail(br#"{"detail":"Card not found"}"#);
        assert_eq!(d.as_deref(), Some("Card not found"));
    }

    #[test]
    fn test_detail_validation_list() {
        let body = br#"{"detail":[{"loc":["body","amount"],"msg":"field required","type":"missing"},
                                  {"loc":["body","currency"],"msg":"invalid code"}]}"#;
        let d = parse_error_detail(body).unwrap();
        assert_eq!(d, "amount: field required; currency: invalid code");
    }

    #[test]
    fn test_user_message_fallback() {
        let e = ApiError::Http { status: 500, detail: None };
        assert_eq!(e.user_message(), GENERIC_ERROR_MESSAGE);
        assert!(parse_error_detail(b"<html>oops</html>").is_none());

        let e = ApiError::Http { status: 409, detail: Some("Budget already exists".into()) };
        assert_eq!(e.user_message(), "Budget already exists");
    }
}
