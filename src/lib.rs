//! # Platform Integration Library
//!
//! An async client for the Platform REST API with:
//! - Token lifecycle management (lazy authentication, expiry detection,
//!   bounded re-authentication on 401, coalesced refresh)
//! - Content negotiation and error classification
//! - Generic HAL resources with field whitelists and action links
//! - Cursored pagination following `next` links
//! - Comprehensive observability
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use integrations_platform::PlatformClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = PlatformClient::builder()
//!         .api_token("my-api-token")
//!         .build()?;
//!
//!     let environment = client.environments().get("project-id", "main").await?;
//!     println!("{} is {:?}", environment.title, environment.status);
//!
//!     if !environment.is_active() {
//!         let activity = environment.activate(&client).await?;
//!         println!("started {}", activity.id);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod config;
pub mod errors;

// URL templates and query strings
pub mod template;

// Authentication
pub mod auth;

// HTTP client and transport
pub mod client;

// Resources and pagination
pub mod pagination;
pub mod resource;

// API Services
pub mod services;

// Observability
pub mod observability;

// Mocks for testing
pub mod mocks;

// Re-exports for convenience
pub use auth::{
    ApiTokenAuthenticator, Authenticator, StaticTokenAuthenticator, Token, TokenProvider,
    NEVER_EXPIRES,
};
pub use client::{ApiRequest, ApiResponse, Payload, PlatformClient, PlatformClientBuilder};
pub use config::{PlatformConfig, PlatformConfigBuilder};
pub use errors::{ErrorBody, PlatformError, PlatformErrorKind, PlatformResult};
pub use pagination::{Cursor, CursorOptions, CursorPage};
pub use resource::{ApiBase, Entity, Extractor, Links, Resource, ResourceService, Schema};
pub use services::*;
pub use template::{params, ArrayEncoding, Params};
