//! Request semantics for `/clients` and `/filter`, independent of any HTTP
//! framework. A server maps routes onto these functions and copies the
//! returned status and body into its response.

use serde_json::Value;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::store::Store;

/// Status code and plain-text body for an admin request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdminResponse {
    pub status: u16,
    pub body: String,
}

impl AdminResponse {
    fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    fn from_error(e: &StoreError) -> Self {
        let status = match e {
            StoreError::MethodNotAllowed(_) => 405,
            StoreError::MalformedRequest(_) | StoreError::InvalidFilterField(_) => 400,
            _ => 500,
        };
        Self {
            status,
            body: e.to_string(),
        }
    }
}

/// `GET /clients`: number of connected viewers as a decimal string.
pub fn client_count(store: &Store) -> String {
    store.clients().len().to_string()
}

/// Extract the filter from a `{"filter": "..."}` body. A missing field means
/// the empty filter.
pub fn parse_filter_request(body: &[u8]) -> Result<String> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| StoreError::MalformedRequest(e.to_string()))?;

    let Value::Object(fields) = value else {
        return Err(StoreError::MalformedRequest(
            "expected a JSON object".to_string(),
        ));
    };

    match fields.get("filter") {
        None => Ok(String::new()),
        Some(Value::String(filter)) => Ok(filter.clone()),
        Some(other) => Err(StoreError::InvalidFilterField(format!(
            "expected a string, got {}",
            other
        ))),
    }
}

/// `POST /filter`: validate and apply a filter change.
///
/// Returns 405 for any method other than `POST` (methods are case-sensitive)
/// and 400 for a body that
/// cannot be parsed. In both cases the filter is left alone.
pub fn handle_filter_request(store: &Store, method: &str, body: &[u8]) -> AdminResponse {
    if method != "POST" {
        return AdminResponse::from_error(&StoreError::MethodNotAllowed(method.to_string()));
    }

    match parse_filter_request(body) {
        Ok(filter) => {
            let notified = store.set_filter(filter);
            debug!(notified, "filter updated via admin request");
            AdminResponse::ok("")
        }
        Err(e) => AdminResponse::from_error(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SubscriberId;

    #[test]
    fn test_client_count() {
        let store = Store::in_memory();
        assert_eq!(client_count(&store), "0");

        store.line_for(&SubscriberId::from("a"));
        store.line_for(&SubscriberId::from("b"));
        assert_eq!(client_count(&store), "2");
    }

    #[test]
    fn test_filter_request_applies_filter() {
        let store = Store::in_memory();
        let resp = handle_filter_request(&store, "POST", br#"{"filter":"error"}"#);

        assert_eq!(resp.status, 200);
        assert_eq!(store.filter(), "error");
    }

    #[test]
    fn test_missing_field_clears_filter() {
        let store = Store::in_memory();
        store.set_filter("old");

        let resp = handle_filter_request(&store, "POST", b"{}");
        assert_eq!(resp.status, 200);
        assert_eq!(store.filter(), "");
    }

    #[test]
    fn test_wrong_method() {
        let store = Store::in_memory();
        for method in ["GET", "PUT", "post"] {
            let resp = handle_filter_request(&store, method, br#"{"filter":"x"}"#);
            assert_eq!(resp.status, 405, "method {}", method);
        }
        assert_eq!(store.filter(), "");
    }

    #[test]
    fn test_bad_bodies() {
        let store = Store::in_memory();
        store.set_filter("keep");

        let bodies: [&[u8]; 3] = [b"not json", br#"{"filter":42}"#, br#"["filter"]"#];
        for body in bodies {
            let resp = handle_filter_request(&store, "POST", body);
            assert_eq!(resp.status, 400, "body {:?}", String::from_utf8_lossy(body));
        }
        assert_eq!(store.filter(), "keep");
    }

    #[test]
    fn test_parse_errors_are_distinguished() {
        assert!(matches!(
            parse_filter_request(b"{"),
            Err(StoreError::MalformedRequest(_))
        ));
        assert!(matches!(
            parse_filter_request(br#"{"filter":null}"#),
            Err(StoreError::InvalidFilterField(_))
        ));
    }
}
