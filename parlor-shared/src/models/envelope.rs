use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::UserId;

/// Default page index for list requests.
pub const DEFAULT_PAGE_INDEX: u32 = 0;

/// Default page size for list requests.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Uniform request envelope accepted by every endpoint.
///
/// Criteria-style lookups put a single object in `data`; commands put one or
/// more objects in `datas`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApiRequest<T> {
    /// Id of the user on whose behalf the call is made.
    pub user: Option<UserId>,
    /// Page index.
    pub index: u32,
    /// Page size.
    pub size: u32,
    /// Asks the backend to skip loading nested relations.
    pub is_simple_loading: bool,
    /// Criteria object.
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Command payloads.
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub datas: Option<Vec<T>>,
}

impl<T> ApiRequest<T> {
    /// Creates an empty envelope for `user` with the default page.
    pub fn new(user: Option<UserId>) -> Self {
        Self {
            user,
            index: DEFAULT_PAGE_INDEX,
            size: DEFAULT_PAGE_SIZE,
            is_simple_loading: false,
            data: None,
            datas: None,
        }
    }

    /// Sets the criteria object.
    #[must_use]
    pub fn with_data(mut self, data: T) -> Self {
        self.data = Some(data);
        self
    }

    /// Sets the command payloads.
    #[must_use]
    pub fn with_datas(mut self, datas: Vec<T>) -> Self {
        self.datas = Some(datas);
        self
    }

    /// Sets the page window.
    #[must_use]
    pub fn page(mut self, index: u32, size: u32) -> Self {
        self.index = index;
        self.size = size;
        self
    }

    /// Marks the request as simple loading.
    #[must_use]
    pub fn simple_loading(mut self) -> Self {
        self.is_simple_loading = true;
        self
    }
}

/// Status block attached to failed responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ApiStatus {
    /// Human readable reason.
    #[serde(default)]
    pub message: Option<String>,
    /// Backend error code, numeric or textual depending on the endpoint.
    #[serde(default)]
    pub code: Option<Value>,
}

impl ApiStatus {
    /// Error code rendered as text.
    #[must_use]
    pub fn code_text(&self) -> Option<String> {
        match &self.code {
            Some(Value::String(code)) => Some(code.clone()),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        }
    }
}

/// Uniform response envelope returned by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    /// Application-level failure flag.
    #[serde(default)]
    pub has_error: bool,
    /// Failure details when `has_error` is set.
    #[serde(default)]
    pub status: Option<ApiStatus>,
    /// Result items; the backend sends `null` for empty results.
    #[serde(default = "Option::default")]
    pub items: Option<Vec<T>>,
    /// Generated file name for export endpoints.
    #[serde(default)]
    pub file_name: Option<String>,
    /// Total count for paginated endpoints.
    #[serde(default)]
    pub count: Option<i64>,
}

impl<T> ApiResponse<T> {
    /// A successful response carrying `items`.
    pub fn ok(items: Vec<T>) -> Self {
        Self {
            has_error: false,
            status: None,
            items: Some(items),
            file_name: None,
            count: None,
        }
    }

    /// Failure message, falling back to `fallback` when the backend gave none.
    pub fn error_message(&self, fallback: &str) -> String {
        self.status
            .as_ref()
            .and_then(|status| status.message.clone())
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| fallback.to_string())
    }

    /// Consumes the response, returning its items (empty when absent).
    pub fn into_items(self) -> Vec<T> {
        self.items.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_envelope_omits_absent_payloads() {
        let request: ApiRequest<Value> = ApiRequest::new(Some(5));
        let encoded = serde_json::to_value(&request).unwrap();

        assert_eq!(
            encoded,
            json!({"user": 5, "index": 0, "size": 100, "isSimpleLoading": false})
        );
    }

    #[test]
    fn request_envelope_carries_data_and_page() {
        let request = ApiRequest::new(Some(5))
            .with_data(json!({"userId": 5}))
            .page(2, 25);
        let encoded = serde_json::to_value(&request).unwrap();

        assert_eq!(encoded["data"], json!({"userId": 5}));
        assert_eq!(encoded["index"], 2);
        assert_eq!(encoded["size"], 25);
        assert!(encoded.get("datas").is_none());
    }

    #[test]
    fn login_envelope_uses_datas_and_simple_loading() {
        let request = ApiRequest::new(Some(1))
            .with_datas(vec![json!({"login": "ewilson"})])
            .simple_loading();
        let encoded = serde_json::to_value(&request).unwrap();

        assert_eq!(encoded["datas"], json!([{"login": "ewilson"}]));
        assert_eq!(encoded["isSimpleLoading"], true);
    }

    #[test]
    fn response_tolerates_null_items() {
        let response: ApiResponse<Value> =
            serde_json::from_str(r#"{"hasError": false, "items": null}"#).unwrap();
        assert!(!response.has_error);
        assert!(response.into_items().is_empty());
    }

    #[test]
    fn error_message_prefers_backend_text() {
        let response: ApiResponse<Value> = serde_json::from_str(
            r#"{"hasError": true, "status": {"message": "Conversation introuvable", "code": 404}}"#,
        )
        .unwrap();

        assert!(response.has_error);
        assert_eq!(response.error_message("fallback"), "Conversation introuvable");
        assert_eq!(
            response.status.as_ref().and_then(ApiStatus::code_text),
            Some("404".to_string())
        );
    }

    #[test]
    fn error_message_falls_back_when_blank() {
        let response: ApiResponse<Value> =
            serde_json::from_str(r#"{"hasError": true, "status": {"message": "  "}}"#).unwrap();
        assert_eq!(response.error_message("Request failed"), "Request failed");

        let bare: ApiResponse<Value> = serde_json::from_str(r#"{"hasError": true}"#).unwrap();
        assert_eq!(bare.error_message("Request failed"), "Request failed");
    }

    #[test]
    fn export_response_exposes_file_name() {
        let response: ApiResponse<Value> =
            serde_json::from_str(r#"{"hasError": false, "fileName": "conv_12.txt", "count": 1}"#)
                .unwrap();
        assert_eq!(response.file_name.as_deref(), Some("conv_12.txt"));
        assert_eq!(response.count, Some(1));
    }
}
