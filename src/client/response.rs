//! Classified successful responses.

use crate::errors::{PlatformError, PlatformResult};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Successful API response.
#[derive(Debug)]
pub enum ApiResponse {
    /// Body parsed as JSON.
    Json(Value),
    /// Body that was not valid JSON.
    Text(String),
    /// Unread response, for images and `202 Accepted`.
    Raw(reqwest::Response),
}

impl ApiResponse {
    /// Borrows the JSON body, if any.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Borrows the text body, if any.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the HTTP status of a raw response.
    pub fn raw_status(&self) -> Option<u16> {
        match self {
            Self::Raw(response) => Some(response.status().as_u16()),
            _ => None,
        }
    }

    /// Takes the JSON body, failing for other variants.
    pub fn into_json(self) -> PlatformResult<Value> {
        match self {
            Self::Json(value) => Ok(value),
            Self::Text(_) => Err(PlatformError::deserialization(
                "Expected a JSON body but received text",
            )),
            Self::Raw(_) => Err(PlatformError::deserialization(
                "Expected a JSON body but received a raw response",
            )),
        }
    }

    /// Resolves any variant to a JSON value, reading raw bodies.
    ///
    /// An empty raw body becomes `{}`, text that is not JSON becomes a string.
    pub async fn into_value(self) -> PlatformResult<Value> {
        match self {
            Self::Json(value) => Ok(value),
            Self::Text(text) => Ok(Value::String(text)),
            Self::Raw(response) => {
                let bytes = response.bytes().await.map_err(PlatformError::transport)?;
                if bytes.is_empty() {
                    return Ok(Value::Object(Default::default()));
                }
                Ok(serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                    Value::String(String::from_utf8_lossy(&bytes).into_owned())
                }))
            }
        }
    }

    /// Deserializes the body into `T`.
    pub async fn into_typed<T: DeserializeOwned>(self) -> PlatformResult<T> {
        let value = self.into_value().await?;
        serde_json::from_value(value).map_err(|e| {
            PlatformError::deserialization(format!("Failed to deserialize response: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_into_value() {
        let value = ApiResponse::Json(json!({"id": "x"})).into_value().await.unwrap();
        assert_eq!(value["id"], "x");

        let text = ApiResponse::Text("not json".into()).into_value().await.unwrap();
        assert_eq!(text, Value::String("not json".into()));
    }

    #[test]
    fn test_into_json_rejects_text() {
        assert!(ApiResponse::Text("plain".into()).into_json().is_err());
        assert_eq!(ApiResponse::Text("plain".into()).as_text(), Some("plain"));
    }
}
