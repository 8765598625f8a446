//! Payment source operations.

use crate::client::{ApiRequest, ApiResponse, PlatformClient};
use crate::errors::{PlatformErrorKind, PlatformResult};
use crate::resource::{ApiBase, Entity, Extractor, Resource, Schema};
use crate::template::Params;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const PAYMENT_SOURCE_PATH: &str = "/platform/payment_source";

/// A stored payment method.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PaymentSource {
    /// Payment source ID.
    #[serde(default)]
    pub id: String,
    /// Type: `credit-card`, `stripe_sepa_debit`, ...
    #[serde(default, rename = "type")]
    pub source_type: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Masked number.
    #[serde(default)]
    pub number: Option<String>,
    /// Card details, for credit cards.
    #[serde(default)]
    pub card: Option<Value>,
    /// Mandate details, for SEPA debits.
    #[serde(default)]
    pub mandate: Option<Value>,
    /// Processor token, sent on creation.
    #[serde(default)]
    pub token: Option<String>,
    /// Billing email, sent on creation.
    #[serde(default)]
    pub email: Option<String>,
}

impl Entity for PaymentSource {
    const SCHEMA: Schema =
        Schema::new(ApiBase::Api, PAYMENT_SOURCE_PATH).creatable(&["type", "token", "email"]);

    fn normalize(mut value: Value) -> Value {
        if let Value::Object(map) = &mut value {
            let target = match map.get("type").and_then(Value::as_str) {
                Some("credit-card") => Some("card"),
                Some("stripe_sepa_debit") => Some("mandate"),
                _ => None,
            };
            if let (Some(target), Some(data)) = (target, map.get("data").cloned()) {
                map.insert(target.to_string(), data);
            }
        }
        value
    }
}

/// Service for payment source operations.
pub struct PaymentSourcesService<'a> {
    client: &'a PlatformClient,
}

impl<'a> PaymentSourcesService<'a> {
    /// Creates a new payment sources service.
    pub fn new(client: &'a PlatformClient) -> Self {
        Self { client }
    }

    fn url(&self, suffix: &str) -> String {
        self.client
            .api_endpoint(&format!("{}{}", PAYMENT_SOURCE_PATH, suffix))
    }

    /// Gets the current payment source, or `None` when none is configured.
    pub async fn get(&self, query: Params) -> PlatformResult<Option<Resource<PaymentSource>>> {
        let response = self
            .client
            .authenticated_request(ApiRequest::get(self.url("")).query(query))
            .await;

        let value = match response {
            Ok(response) => response.into_value().await?,
            Err(e) if *e.kind() == PlatformErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        let source = match value {
            Value::Object(mut map) => map.remove("payment_source").unwrap_or(Value::Object(map)),
            other => other,
        };
        if source.is_null() {
            return Ok(None);
        }
        Resource::from_value(source, Params::new(), None).map(Some)
    }

    /// Lists payment sources.
    pub async fn list(&self, query: Params) -> PlatformResult<Vec<Resource<PaymentSource>>> {
        self.client
            .resources::<PaymentSource>()
            .query(Params::new(), query, None, Extractor::Root)
            .await
    }

    /// Adds a payment source from its creatable fields.
    pub async fn create(&self, source: PaymentSource) -> PlatformResult<Resource<PaymentSource>> {
        let mut resource = Resource::new(source);
        resource.save(self.client).await?;
        Ok(resource)
    }

    /// Deletes the current payment source.
    pub async fn delete(&self) -> PlatformResult<ApiResponse> {
        self.client.delete(&self.url("")).await
    }

    /// Payment source types allowed for the current consumer.
    pub async fn allowed(&self) -> PlatformResult<Value> {
        self.client.get(&self.url("/allowed"), Params::new()).await
    }

    /// Creates a setup intent with the payment processor.
    pub async fn intent(&self) -> PlatformResult<Value> {
        self.client
            .authenticated_request(ApiRequest::post(self.url("/intent")))
            .await?
            .into_value()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_credit_card() {
        let value = PaymentSource::normalize(json!({
            "type": "credit-card",
            "data": {"last4": "4242"}
        }));
        assert_eq!(value["card"]["last4"], "4242");
        assert!(value.get("mandate").is_none());
    }

    #[test]
    fn test_normalize_sepa() {
        let value = PaymentSource::normalize(json!({
            "type": "stripe_sepa_debit",
            "data": {"reference": "M1"}
        }));
        assert_eq!(value["mandate"]["reference"], "M1");
    }

    #[test]
    fn test_normalize_other_type() {
        let value = PaymentSource::normalize(json!({"type": "invoice", "data": {}}));
        assert!(value.get("card").is_none());
        assert!(value.get("mandate").is_none());
    }
}
