//! Wire-shape normalization for identity-server responses.
//!
//! The server may wrap any success payload in a `{success: true,
//! data: ...}` envelope, and reports failures in three different
//! body shapes. Both quirks are flattened here, in one place, so the
//! operations in [`crate::session`] never probe response shapes
//! themselves.

use crate::error::AuthError;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

/// Fallback message when a failure body carries no usable message.
pub const GENERIC_ERROR_MESSAGE: &str = "Unexpected error. Please try again.";

/// Token triple issued on login and refresh.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in_sec: i64,
}

/// Unwrap the optional `{success: true, data: ...}` envelope.
///
/// An absent envelope means the value already is the payload.
pub fn unwrap_envelope(value: Value) -> Value {
    if let Value::Object(ref obj) = value {
        if obj.get("success").and_then(Value::as_bool) == Some(true) {
            if let Some(data) = obj.get("data") {
                return data.clone();
            }
        }
    }
    value
}

/// Extract a [`TokenGrant`] from an unwrapped success payload.
///
/// A missing or empty token field means the server reported success
/// without issuing a usable session; treating that as valid would
/// leave the client "authenticated" with nothing to authenticate with.
pub fn parse_token_grant(payload: Value) -> Result<TokenGrant, AuthError> {
    let grant: TokenGrant =
        serde_json::from_value(payload).map_err(|_| AuthError::InvalidResponse)?;
    if grant.access_token.is_empty() || grant.refresh_token.is_empty() {
        return Err(AuthError::InvalidResponse);
    }
    Ok(grant)
}

/// Normalize a non-2xx response body into an [`AuthError`].
///
/// Recognized failure shapes:
/// - `{error: {message, details: {fieldErrors: {field: message}}}}`
/// - `{error: {details: {errors: [{field, message}]}}}`
/// - `{error: {details: {field, message}}}`
///
/// A 401 whose message is exactly "Unauthorized" is the refreshable
/// session failure and classifies as [`AuthError::Unauthorized`].
pub fn classify_error(status: u16, body: &str) -> AuthError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let error = parsed.as_ref().and_then(|v| v.get("error"));

    let message = error
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .unwrap_or(GENERIC_ERROR_MESSAGE)
        .to_string();

    let field_errors = error
        .and_then(|e| e.get("details"))
        .map(collect_field_errors)
        .unwrap_or_default();

    if status == 401 && message == "Unauthorized" {
        return AuthError::Unauthorized;
    }

    if !field_errors.is_empty() {
        return AuthError::Validation {
            status,
            message,
            field_errors,
        };
    }

    AuthError::Server { status, message }
}

fn collect_field_errors(details: &Value) -> HashMap<String, String> {
    let mut map = HashMap::new();

    if let Some(fields) = details.get("fieldErrors").and_then(Value::as_object) {
        for (field, message) in fields {
            if let Some(message) = message.as_str() {
                map.insert(field.clone(), message.to_string());
            }
        }
    }

    if let Some(entries) = details.get("errors").and_then(Value::as_array) {
        for entry in entries {
            let field = entry.get("field").and_then(Value::as_str);
            let message = entry.get("message").and_then(Value::as_str);
            if let (Some(field), Some(message)) = (field, message) {
                map.insert(field.to_string(), message.to_string());
            }
        }
    }

    let field = details.get("field").and_then(Value::as_str);
    let message = details.get("message").and_then(Value::as_str);
    if let (Some(field), Some(message)) = (field, message) {
        map.insert(field.to_string(), message.to_string());
    }

    map
}

/// A stored refresh credential that is empty or the literal text
/// "undefined"/"null" is a malformed round-trip, not a credential.
pub fn sanitize_refresh_token(raw: Option<String>) -> Option<String> {
    match raw {
        Some(token) if !token.is_empty() && token != "undefined" && token != "null" => Some(token),
        _ => None,
    }
}

/// Returns a masked version of a token for log lines (short prefix only).
pub fn mask_token(token: &str) -> String {
    if token.len() <= 16 {
        return "***".to_string();
    }
    format!("{}...", &token[..12])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unwrap_envelope_wrapped() {
        let wrapped = json!({"success": true, "data": {"id": "u1"}});
        assert_eq!(unwrap_envelope(wrapped), json!({"id": "u1"}));
    }

    #[test]
    fn test_unwrap_envelope_absent() {
        let bare = json!({"id": "u1"});
        assert_eq!(unwrap_envelope(bare.clone()), bare);
    }

    #[test]
    fn test_unwrap_envelope_success_false_is_payload() {
        let value = json!({"success": false, "data": {"id": "u1"}});
        assert_eq!(unwrap_envelope(value.clone()), value);
    }

    #[test]
    fn test_unwrap_envelope_success_without_data_is_payload() {
        let value = json!({"success": true, "id": "u1"});
        assert_eq!(unwrap_envelope(value.clone()), value);
    }

    #[test]
    fn test_parse_token_grant() {
        let grant = parse_token_grant(json!({
            "accessToken": "T1",
            "refreshToken": "R1",
            "expiresInSec": 3600,
        }))
        .unwrap();
        assert_eq!(grant.access_token, "T1");
        assert_eq!(grant.refresh_token, "R1");
        assert_eq!(grant.expires_in_sec, 3600);
    }

    #[test]
    fn test_parse_token_grant_missing_field() {
        let err = parse_token_grant(json!({"accessToken": "T1"})).unwrap_err();
        assert!(matches!(err, AuthError::InvalidResponse));
    }

    #[test]
    fn test_parse_token_grant_empty_token() {
        let err = parse_token_grant(json!({
            "accessToken": "",
            "refreshToken": "R1",
            "expiresInSec": 3600,
        }))
        .unwrap_err();
        assert!(matches!(err, AuthError::InvalidResponse));
    }

    #[test]
    fn test_classify_unauthorized() {
        let body = json!({"error": {"message": "Unauthorized"}}).to_string();
        assert!(matches!(classify_error(401, &body), AuthError::Unauthorized));
    }

    #[test]
    fn test_classify_401_with_other_message_is_not_tagged() {
        let body = json!({"error": {"message": "token revoked"}}).to_string();
        match classify_error(401, &body) {
            AuthError::Server { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "token revoked");
            }
            other => panic!("expected Server error, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_field_errors_map_shape() {
        let body = json!({
            "error": {
                "message": "Validation failed",
                "details": {"fieldErrors": {"email": "Email is taken"}},
            }
        })
        .to_string();
        match classify_error(422, &body) {
            AuthError::Validation {
                status,
                message,
                field_errors,
            } => {
                assert_eq!(status, 422);
                assert_eq!(message, "Validation failed");
                assert_eq!(field_errors.get("email").unwrap(), "Email is taken");
            }
            other => panic!("expected Validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_field_errors_array_shape() {
        let body = json!({
            "error": {
                "details": {"errors": [
                    {"field": "phone", "message": "Phone is invalid"},
                    {"field": "password", "message": "Password is too short"},
                ]},
            }
        })
        .to_string();
        match classify_error(422, &body) {
            AuthError::Validation { field_errors, .. } => {
                assert_eq!(field_errors.len(), 2);
                assert_eq!(field_errors.get("phone").unwrap(), "Phone is invalid");
                assert_eq!(
                    field_errors.get("password").unwrap(),
                    "Password is too short"
                );
            }
            other => panic!("expected Validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_field_errors_single_field_shape() {
        let body = json!({
            "error": {"details": {"field": "email", "message": "Email is required"}}
        })
        .to_string();
        match classify_error(422, &body) {
            AuthError::Validation { field_errors, .. } => {
                assert_eq!(field_errors.get("email").unwrap(), "Email is required");
            }
            other => panic!("expected Validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_fallback_message() {
        match classify_error(500, "not even json") {
            AuthError::Server { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, GENERIC_ERROR_MESSAGE);
            }
            other => panic!("expected Server error, got {other:?}"),
        }
    }

    #[test]
    fn test_sanitize_refresh_token() {
        assert_eq!(sanitize_refresh_token(None), None);
        assert_eq!(sanitize_refresh_token(Some(String::new())), None);
        assert_eq!(sanitize_refresh_token(Some("undefined".to_string())), None);
        assert_eq!(sanitize_refresh_token(Some("null".to_string())), None);
        assert_eq!(
            sanitize_refresh_token(Some("R1".to_string())),
            Some("R1".to_string())
        );
    }

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("rt-very-long-token-value"), "rt-very-long...");
        assert_eq!(mask_token("short"), "***");
    }
}
