//! Region operations.

use crate::client::PlatformClient;
use crate::errors::PlatformResult;
use crate::pagination::{Cursor, CursorOptions};
use crate::resource::{ApiBase, Entity, Extractor, Resource, Schema};
use crate::template::{params, Params};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::ops::Deref;

/// A hosting region.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Region {
    /// Region ID.
    #[serde(default)]
    pub id: String,
    /// Whether new projects can be created here.
    #[serde(default)]
    pub available: bool,
    /// API endpoint of the region.
    #[serde(default)]
    pub endpoint: String,
    /// Display label.
    #[serde(default)]
    pub label: String,
    /// Whether the region is private.
    #[serde(default)]
    pub private: bool,
    /// Infrastructure provider.
    #[serde(default)]
    pub provider: String,
    /// Geographic zone.
    #[serde(default)]
    pub zone: String,
    /// Label shown on projects.
    #[serde(default)]
    pub project_label: String,
}

impl Entity for Region {
    const SCHEMA: Schema = Schema::new(ApiBase::Account, "/platform/regions/:id");
}

/// A region as seen by an organization.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct OrganizationRegion(pub Region);

impl Deref for OrganizationRegion {
    type Target = Region;

    fn deref(&self) -> &Region {
        &self.0
    }
}

impl Entity for OrganizationRegion {
    const SCHEMA: Schema =
        Schema::new(ApiBase::Api, "/organizations/:organizationId/regions/:id");
}

/// Service for region operations.
pub struct RegionsService<'a> {
    client: &'a PlatformClient,
}

impl<'a> RegionsService<'a> {
    /// Creates a new regions service.
    pub fn new(client: &'a PlatformClient) -> Self {
        Self { client }
    }

    /// Lists regions. The response wraps them as `{"regions": [...]}`.
    pub async fn list(&self, query: Params) -> PlatformResult<Vec<Resource<Region>>> {
        self.client
            .resources::<Region>()
            .query(Params::new(), query, None, Extractor::Field("regions"))
            .await
    }
}

/// Service for organization region operations.
pub struct OrganizationRegionsService<'a> {
    client: &'a PlatformClient,
}

impl<'a> OrganizationRegionsService<'a> {
    /// Creates a new organization regions service.
    pub fn new(client: &'a PlatformClient) -> Self {
        Self { client }
    }

    /// Lists the regions available to an organization, page by page.
    ///
    /// Array filters are sent as `key[]=value`.
    pub async fn list(
        &self,
        organization_id: &str,
        query: Params,
    ) -> PlatformResult<Cursor<'a, OrganizationRegion>> {
        self.client
            .resources::<OrganizationRegion>()
            .query_cursored(
                params(json!({"organizationId": organization_id})),
                query,
                None,
                CursorOptions::brackets(),
            )
            .await
    }
}
