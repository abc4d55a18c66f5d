use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Server rejected request ({status}){}", detail_suffix(.detail))]
    Rejected {
        status: StatusCode,
        detail: Option<String>,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Session token cannot be sent as a header value")]
    InvalidToken,
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(d) => format!(": {}", d),
        None => String::new(),
    }
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        ApiError::Rejected {
            status,
            detail: extract_detail(body),
        }
    }

    /// Server-provided human readable message, if the response carried one
    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::Rejected { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Rejected { status, .. } => Some(*status),
            ApiError::Network(e) => e.status(),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    /// Message to show the user: the server's `detail` when present,
    /// otherwise the caller's generic message for the operation.
    pub fn user_message(&self, fallback: &str) -> String {
        self.detail()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or(fallback)
            .to_string()
    }
}

/// Pull the `detail` field out of an error body.
///
/// Plain string details are returned as-is. Validation failures arrive as a
/// list of objects with a `msg` field; those messages are joined.
fn extract_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::String(s) => Some(s.clone()),
        Value::Array(entries) => {
            let messages: Vec<&str> = entries
                .iter()
                .filter_map(|e| e.get("msg").and_then(Value::as_str))
                .collect();
            if messages.is_empty() {
                None
            } else {
                Some(messages.join("; "))
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_string_detail() {
        let err = ApiError::from_status(StatusCode::BAD_REQUEST, r#"{"detail":"Email already registered"}"#);
        assert_eq!(err.detail(), Some("Email already registered"));
        assert_eq!(err.user_message("Failed to register"), "Email already registered");
    }

    #[test]
    fn test_extract_validation_detail() {
        let body = r#"{"detail":[{"loc":["body","title"],"msg":"field required"},{"msg":"value is not a valid integer"}]}"#;
        let err = ApiError::from_status(StatusCode::UNPROCESSABLE_ENTITY, body);
        assert_eq!(err.detail(), Some("field required; value is not a valid integer"));
    }

    #[test]
    fn test_missing_detail_uses_fallback() {
        let err = ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "<html>oops</html>");
        assert_eq!(err.detail(), None);
        assert_eq!(err.user_message("Failed to fetch items"), "Failed to fetch items");

        let err = ApiError::from_status(StatusCode::BAD_REQUEST, r#"{"detail":"  "}"#);
        assert_eq!(err.user_message("Failed to create item"), "Failed to create item");

        let err = ApiError::InvalidResponse("bad json".to_string());
        assert_eq!(err.user_message("Failed to update item"), "Failed to update item");
    }

    #[test]
    fn test_unauthorized() {
        let err = ApiError::from_status(StatusCode::UNAUTHORIZED, r#"{"detail":"Not authenticated"}"#);
        assert!(err.is_unauthorized());
        assert!(!ApiError::from_status(StatusCode::NOT_FOUND, "").is_unauthorized());
    }

    #[test]
    fn test_display_includes_detail() {
        let err = ApiError::from_status(StatusCode::NOT_FOUND, r#"{"detail":"Item not found"}"#);
        assert_eq!(err.to_string(), "Server rejected request (404 Not Found): Item not found");
    }

    #[test]
    fn test_truncate_body() {
        let short = "short body";
        assert_eq!(ApiError::truncate_body(short), short);

        let long = "é".repeat(400);
        let truncated = ApiError::truncate_body(&long);
        assert!(truncated.contains("truncated, 800 total bytes"));
    }

    #[tokio::test]
    async fn test_transport_failure_is_network_error() {
        // Nothing listens on the discard port
        let source = reqwest::get("http://127.0.0.1:9/").await.unwrap_err();
        let err = ApiError::from(source);
        assert!(matches!(err, ApiError::Network(_)));
        assert_eq!(err.status(), None);
        assert_eq!(err.user_message("Failed to fetch items"), "Failed to fetch items");
    }
}
