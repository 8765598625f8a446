//! Profile address operations.

use crate::client::{ApiRequest, PlatformClient};
use crate::errors::PlatformResult;
use crate::resource::{ApiBase, Entity, Extractor, Resource, Schema};
use crate::template::{params, resolve, Params};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Postal address of a user profile.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Address {
    /// Profile ID.
    #[serde(default)]
    pub id: String,
    /// ISO country code.
    #[serde(default)]
    pub country: Option<String>,
    /// Full name.
    #[serde(default)]
    pub name_line: Option<String>,
    /// Building.
    #[serde(default)]
    pub premise: Option<String>,
    /// Apartment or suite.
    #[serde(default)]
    pub sub_premise: Option<String>,
    /// Street.
    #[serde(default)]
    pub thoroughfare: Option<String>,
    /// State or province.
    #[serde(default)]
    pub administrative_area: Option<String>,
    /// County.
    #[serde(default)]
    pub sub_administrative_area: Option<String>,
    /// City.
    #[serde(default)]
    pub locality: Option<String>,
    /// Neighborhood.
    #[serde(default)]
    pub dependent_locality: Option<String>,
    /// Postal code.
    #[serde(default)]
    pub postal_code: Option<String>,
}

impl Entity for Address {
    const SCHEMA: Schema = Schema::new(ApiBase::Account, "/v1/profiles/:id/address").modifiable(&[
        "country",
        "name_line",
        "premise",
        "sub_premise",
        "thoroughfare",
        "administrative_area",
        "sub_administrative_area",
        "locality",
        "dependent_locality",
        "postal_code",
    ]);
}

// The address endpoint answers with a single object; collections are tolerated too.
fn one_or_many(value: Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(_) => Some(vec![value]),
        _ => None,
    }
}

/// Service for profile address operations.
pub struct AddressesService<'a> {
    client: &'a PlatformClient,
}

impl<'a> AddressesService<'a> {
    /// Creates a new addresses service.
    pub fn new(client: &'a PlatformClient) -> Self {
        Self { client }
    }

    /// Gets the address of a profile.
    pub async fn get(&self, profile_id: &str) -> PlatformResult<Resource<Address>> {
        self.client
            .resources::<Address>()
            .get(params(json!({"id": profile_id})), Params::new(), None)
            .await
    }

    /// Queries addresses of a profile.
    pub async fn query(&self, profile_id: &str, query: Params) -> PlatformResult<Vec<Resource<Address>>> {
        let path_params = params(json!({"id": profile_id}));
        let url = resolve(
            &Address::SCHEMA.template(self.client.config()),
            &path_params,
            &Params::new(),
        );

        let value = self
            .client
            .authenticated_request(ApiRequest::get(url).query(query))
            .await?
            .into_value()
            .await?;

        Extractor::Custom(one_or_many)
            .extract(value)?
            .into_iter()
            .map(|item| Resource::from_value(item, path_params.clone(), None))
            .collect()
    }

    /// Updates the address of a profile.
    pub async fn update(&self, address: &mut Resource<Address>, changes: Value) -> PlatformResult<()> {
        address.update(self.client, changes, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::pick;

    #[test]
    fn test_modifiable_whitelist() {
        let body = pick(
            &json!({"country": "FR", "id": "p1", "locality": "Paris", "email": "x@example.com"}),
            Address::SCHEMA.modifiable,
        );
        assert_eq!(body, json!({"country": "FR", "locality": "Paris"}));
    }

    #[test]
    fn test_one_or_many() {
        assert_eq!(one_or_many(json!({"id": "p1"})).unwrap().len(), 1);
        assert_eq!(one_or_many(json!([{}, {}])).unwrap().len(), 2);
        assert!(one_or_many(json!("x")).is_none());
    }
}
