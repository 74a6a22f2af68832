// Credentials carry the base URL, the bearer token and the shared HTTP client.
use crate::ScmsCredentials;

// Static semaphore shared by every request issued through this module.
use lazy_static::lazy_static;
use std_semaphore::Semaphore;

use log::{debug, warn};
use reqwest::blocking::multipart::Form;
use reqwest::blocking::Response;
use serde_json::Value;
use std::error::Error;
use std::fmt;

/// The maximum number of simultaneous HTTP requests allowed.
///
/// Front ends may fan fetches out on worker threads (students and tasks are
/// loaded independently); the semaphore keeps the number of requests in
/// flight against the SCMS backend bounded.
const SIMULTANEOUS_REQUESTS_LIMIT: isize = 20;

/// Message used when the server answers with an error but no readable body.
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";

/// HTTP request methods understood by `send_http_request`.
///
/// JSON bodies travel with the `Put` and `Post` variants. Multipart uploads
/// go through `send_multipart_request` because a form can only be sent once.
#[derive(Clone, Debug)]
pub enum HttpMethod {
    Get,
    Put(Value),
    Post(Value),
    Delete,
}

impl HttpMethod {
    fn name(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Put(_) => "PUT",
            HttpMethod::Post(_) => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// Error returned for any non-successful HTTP exchange.
///
/// `status` is 0 when the request never reached the server. `message` is the
/// server's own `message` (or `error`) field when the body carried one, so it
/// can be shown to the user as is.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub status: u16,
    pub message: String,
}

impl ApiError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        ApiError {
            status,
            message: message.into(),
        }
    }

    /// Builds the error from a failed response body.
    pub fn from_body(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|json| server_message(&json))
            .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string());
        ApiError { status, message }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401 || self.status == 403
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.status == 0 {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{} (HTTP {})", self.message, self.status)
        }
    }
}

impl Error for ApiError {}

/// Extracts the human-readable message a SCMS error body carries, if any.
///
/// Laravel-style validation bodies put the details under `errors`; the first
/// entry is used when no top-level message exists.
pub fn server_message(json: &Value) -> Option<String> {
    for key in ["message", "error"] {
        if let Some(msg) = json[key].as_str() {
            if !msg.trim().is_empty() {
                return Some(msg.to_string());
            }
        }
    }
    json["errors"].as_object().and_then(|errors| {
        errors.values().find_map(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Array(items) => items.first().and_then(|s| s.as_str()).map(String::from),
            _ => None,
        })
    })
}

/// Unwraps the `{ "data": ... }` envelope most SCMS endpoints use.
///
/// Bare payloads are returned unchanged.
pub fn unwrap_data(json: Value) -> Value {
    match json {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

lazy_static! {
    static ref SEMAPHORE: Semaphore = Semaphore::new(SIMULTANEOUS_REQUESTS_LIMIT);
}

fn check_response(method: &str, url: &str, response: Response) -> Result<Response, Box<dyn Error>> {
    let status = response.status();
    if status.is_success() {
        debug!("{} {} -> {}", method, url, status);
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    let error = ApiError::from_body(status.as_u16(), &body);
    warn!("{} {} failed: {}", method, url, error);
    Err(Box::new(error))
}

/// Sends a JSON request to the SCMS API.
///
/// The request is attempted once: failures are reported to the caller, who
/// decides whether the user should redo the action.
pub fn send_http_request(
    method: HttpMethod,
    url: &str,
    credentials: &ScmsCredentials,
    params: Vec<(String, String)>,
) -> Result<Response, Box<dyn Error>> {
    let _guard = SEMAPHORE.access();

    let request_builder = match &method {
        HttpMethod::Get => credentials.client.get(url).query(&params),
        HttpMethod::Put(body) => credentials.client.put(url).json(body),
        HttpMethod::Post(body) => credentials.client.post(url).json(body),
        HttpMethod::Delete => credentials.client.delete(url).query(&params),
    };

    let response = request_builder
        .bearer_auth(&credentials.token_scms)
        .header("Accept", "application/json")
        .send()
        .map_err(|e| {
            warn!("{} {} could not be sent: {}", method.name(), url, e);
            ApiError::new(0, format!("Unable to reach the server: {}", e))
        })?;

    check_response(method.name(), url, response)
}

/// Sends a multipart/form-data POST, used for every upload with files or links.
pub fn send_multipart_request(
    url: &str,
    credentials: &ScmsCredentials,
    form: Form,
) -> Result<Response, Box<dyn Error>> {
    let _guard = SEMAPHORE.access();

    let response = credentials
        .client
        .post(url)
        .bearer_auth(&credentials.token_scms)
        .header("Accept", "application/json")
        .multipart(form)
        .send()
        .map_err(|e| {
            warn!("POST {} (multipart) could not be sent: {}", url, e);
            ApiError::new(0, format!("Unable to reach the server: {}", e))
        })?;

    check_response("POST", url, response)
}

/// Sends a request and decodes the JSON answer, stripping the `data` envelope.
pub fn request_json(
    method: HttpMethod,
    url: &str,
    credentials: &ScmsCredentials,
    params: Vec<(String, String)>,
) -> Result<Value, Box<dyn Error>> {
    let response = send_http_request(method, url, credentials, params)?;
    let text = response.text()?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    let json: Value = serde_json::from_str(&text)
        .map_err(|e| format!("Failed to parse response from {}: {}", url, e))?;
    Ok(unwrap_data(json))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_message_prefers_server_text() {
        let error = ApiError::from_body(422, r#"{"message":"The title field is required."}"#);
        assert_eq!(error.status, 422);
        assert_eq!(error.message, "The title field is required.");
        assert_eq!(error.to_string(), "The title field is required. (HTTP 422)");
    }

    #[test]
    fn test_error_message_falls_back_to_generic() {
        let error = ApiError::from_body(500, "<html>Server Error</html>");
        assert_eq!(error.message, GENERIC_FAILURE_MESSAGE);

        let empty = ApiError::from_body(502, r#"{"message":"   "}"#);
        assert_eq!(empty.message, GENERIC_FAILURE_MESSAGE);
    }

    #[test]
    fn test_validation_errors_are_read() {
        let body = json!({ "errors": { "points": ["Points must be positive."] } });
        assert_eq!(
            server_message(&body).as_deref(),
            Some("Points must be positive.")
        );
    }

    #[test]
    fn test_unwrap_data_envelope() {
        assert_eq!(unwrap_data(json!({"data": [1, 2]})), json!([1, 2]));
        assert_eq!(unwrap_data(json!({"id": 3})), json!({"id": 3}));
        assert_eq!(unwrap_data(json!([4])), json!([4]));
    }

    #[test]
    fn test_unauthorized_statuses() {
        assert!(ApiError::new(401, "x").is_unauthorized());
        assert!(ApiError::new(403, "x").is_unauthorized());
        assert!(!ApiError::new(404, "x").is_unauthorized());
    }
}
