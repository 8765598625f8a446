//! TOTP two-factor authentication.

use crate::client::{ApiRequest, ApiResponse, PlatformClient};
use crate::errors::PlatformResult;
use crate::resource::{ApiBase, Entity, Resource, Schema};
use crate::template::{params, resolve, Params};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// TOTP enrollment details of a user.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TwoFactorAuthentication {
    /// Issuer shown by authenticator apps.
    #[serde(default)]
    pub issuer: String,
    /// Account name shown by authenticator apps.
    #[serde(default)]
    pub account_name: String,
    /// Shared secret.
    #[serde(default)]
    pub secret: String,
    /// QR code image as a data URI.
    #[serde(default)]
    pub qr_code: String,
}

impl Entity for TwoFactorAuthentication {
    const SCHEMA: Schema = Schema::new(ApiBase::Api, "/users/:userId/totp");
}

/// Service for two-factor authentication operations.
pub struct TwoFactorService<'a> {
    client: &'a PlatformClient,
}

impl<'a> TwoFactorService<'a> {
    /// Creates a new two-factor service.
    pub fn new(client: &'a PlatformClient) -> Self {
        Self { client }
    }

    fn user_url(&self, path: &str, user_id: &str) -> String {
        resolve(
            &self.client.api_endpoint(path),
            &params(json!({"userId": user_id})),
            &Params::new(),
        )
    }

    /// Gets a fresh enrollment secret for a user.
    pub async fn get(&self, user_id: &str) -> PlatformResult<Resource<TwoFactorAuthentication>> {
        self.client
            .resources::<TwoFactorAuthentication>()
            .get(params(json!({"userId": user_id})), Params::new(), None)
            .await
    }

    /// Confirms enrollment with the secret and a current passcode.
    pub async fn enroll(&self, user_id: &str, secret: &str, passcode: &str) -> PlatformResult<ApiResponse> {
        let request = ApiRequest::post(self.user_url("/users/:userId/totp", user_id))
            .json(json!({"secret": secret, "passcode": passcode}));
        self.client.authenticated_request(request).await
    }

    /// Regenerates recovery codes.
    pub async fn reset(&self, user_id: &str) -> PlatformResult<ApiResponse> {
        let request = ApiRequest::post(self.user_url("/users/:userId/codes", user_id));
        self.client.authenticated_request(request).await
    }

    /// Disables two-factor authentication.
    pub async fn delete(&self, user_id: &str) -> PlatformResult<ApiResponse> {
        self.client
            .delete(&self.user_url("/users/:userId/totp", user_id))
            .await
    }
}
