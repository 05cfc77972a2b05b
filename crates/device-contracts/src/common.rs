use serde::{Deserialize, Serialize};

use crate::API_VERSION;

/// API version marker embedded in versioned DTOs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Versionable {
    #[serde(default)]
    pub api_version: String,
}

impl Default for Versionable {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
        }
    }
}

/// Base content of every request DTO.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseRequest {
    #[serde(flatten)]
    pub versionable: Versionable,
    #[serde(default)]
    pub request_id: String,
}

impl BaseRequest {
    pub fn new() -> Self {
        Self {
            versionable: Versionable::default(),
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

impl Default for BaseRequest {
    fn default() -> Self {
        Self::new()
    }
}

/// Base content of every response DTO, also used as the error body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseResponse {
    #[serde(flatten)]
    pub versionable: Versionable,
    #[serde(default)]
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<serde_json::Value>,
    #[serde(default)]
    pub status_code: u16,
}

impl BaseResponse {
    pub fn new(request_id: impl Into<String>, message: impl Into<String>, status_code: u16) -> Self {
        Self {
            versionable: Versionable::default(),
            request_id: request_id.into(),
            message: Some(serde_json::Value::String(message.into())),
            status_code,
        }
    }

    /// Human readable message, whatever JSON shape the server chose for it.
    pub fn message_text(&self) -> String {
        match &self.message {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_request_has_version_and_id() {
        let req = BaseRequest::new();
        assert_eq!(req.versionable.api_version, "v2");
        assert!(uuid::Uuid::parse_str(&req.request_id).is_ok());

        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["apiVersion"], "v2");
        assert!(json.get("requestId").is_some());
    }

    #[test]
    fn test_base_response_message_text() {
        let body = r#"{"apiVersion":"v2","statusCode":400,"message":"bad event"}"#;
        let res: BaseResponse = serde_json::from_str(body).unwrap();
        assert_eq!(res.status_code, 400);
        assert_eq!(res.message_text(), "bad event");

        let body = r#"{"statusCode":500,"message":{"detail":"boom"}}"#;
        let res: BaseResponse = serde_json::from_str(body).unwrap();
        assert!(res.message_text().contains("boom"));
        assert_eq!(res.versionable.api_version, "");
    }
}
