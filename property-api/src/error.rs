use serde::Deserialize;

/// Result type for API calls
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors returned by the property endpoints
#[derive(Debug)]
pub enum ApiError {
    /// Request never produced a response (DNS, TLS, timeout, connection reset)
    Network(String),
    /// Server answered with a non-success status
    Status { status: u16, detail: Option<String> },
    /// Response body could not be decoded
    Json(String),
    /// Client could not be built or the request could not be formed
    Client(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Network(msg) => write!(f, "Network error: {}", msg),
            ApiError::Status {
                status,
                detail: Some(detail),
            } => write!(f, "Server returned status {}: {}", status, detail),
            ApiError::Status {
                status,
                detail: None,
            } => write!(f, "Server returned status {}", status),
            ApiError::Json(msg) => write!(f, "JSON error: {}", msg),
            ApiError::Client(msg) => write!(f, "Client error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Json(e.to_string())
        } else if e.is_builder() {
            ApiError::Client(e.to_string())
        } else {
            ApiError::Network(e.to_string())
        }
    }
}

/// FastAPI error body: `{"detail": "..."}` or `{"detail": [{"msg": "..."}]}`
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: ErrorDetail,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Message(String),
    Items(Vec<ErrorItem>),
}

#[derive(Debug, Deserialize)]
struct ErrorItem {
    msg: Option<String>,
}

impl ApiError {
    /// Builds a status error, pulling the `detail` message out of the body if present
    pub fn from_status(status: u16, body: &str) -> Self {
        let detail = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| match b.detail {
                ErrorDetail::Message(m) => Some(m),
                ErrorDetail::Items(items) => items
                    .into_iter()
                    .next()
                    .map(|i| i.msg.unwrap_or_else(|| "Validation error".to_string())),
            });
        ApiError::Status { status, detail }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Network failures, 5xx and 429 are worth retrying; other client errors are not
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network(_) => true,
            ApiError::Status { status, .. } => (500..600).contains(status) || *status == 429,
            ApiError::Json(_) | ApiError::Client(_) => false,
        }
    }

    /// User-friendly error message for UI
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Status {
                detail: Some(detail),
                ..
            } => detail.clone(),
            ApiError::Status { status, .. } => match status {
                400 => "Bad request. Please check your input.".to_string(),
                401 => "Session expired. Please log in again.".to_string(),
                403 => "You do not have permission to perform this action.".to_string(),
                404 => "Resource not found.".to_string(),
                422 => "Validation error. Please check your input.".to_string(),
                500 => "Internal server error. Please try again later.".to_string(),
                _ => "An unexpected error occurred.".to_string(),
            },
            ApiError::Network(_) => {
                "Network error. Please check your internet connection.".to_string()
            }
            ApiError::Json(_) | ApiError::Client(_) => "An unexpected error occurred.".to_string(),
        }
    }
}
