//! Generic HAL resources bound to a URL template and field whitelists.

mod links;

pub use links::Links;

use crate::client::{ApiRequest, ApiResponse, PlatformClient};
use crate::config::PlatformConfig;
use crate::errors::{PlatformError, PlatformErrorKind, PlatformResult};
use crate::pagination::{Cursor, CursorOptions};
use crate::services::Activity;
use crate::template::{self, Params};
use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

/// Which base URL an entity lives under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiBase {
    /// `PlatformConfig::api_url`.
    Api,
    /// `PlatformConfig::account_url`.
    Account,
}

/// Static description of an entity endpoint.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    /// Base URL.
    pub base: ApiBase,
    /// Path template with `:name` placeholders.
    pub path: &'static str,
    /// Fallback path parameter values.
    pub param_defaults: &'static [(&'static str, &'static str)],
    /// Fields sent by `save`.
    pub creatable: &'static [&'static str],
    /// Fields sent by `update`.
    pub modifiable: &'static [&'static str],
}

impl Schema {
    /// Creates a schema with empty defaults and whitelists.
    pub const fn new(base: ApiBase, path: &'static str) -> Self {
        Self {
            base,
            path,
            param_defaults: &[],
            creatable: &[],
            modifiable: &[],
        }
    }

    /// Sets fallback path parameters.
    pub const fn defaults(self, param_defaults: &'static [(&'static str, &'static str)]) -> Self {
        Self {
            param_defaults,
            ..self
        }
    }

    /// Sets the creatable whitelist.
    pub const fn creatable(self, creatable: &'static [&'static str]) -> Self {
        Self { creatable, ..self }
    }

    /// Sets the modifiable whitelist.
    pub const fn modifiable(self, modifiable: &'static [&'static str]) -> Self {
        Self { modifiable, ..self }
    }

    /// Full URL template for this schema.
    pub fn template(&self, config: &PlatformConfig) -> String {
        let base = match self.base {
            ApiBase::Api => &config.api_url,
            ApiBase::Account => &config.account_url,
        };
        format!("{}{}", base.trim_end_matches('/'), self.path)
    }

    /// Fallback path parameters as a map.
    pub fn defaults_map(&self) -> Params {
        self.param_defaults
            .iter()
            .map(|(key, value)| (key.to_string(), Value::String(value.to_string())))
            .collect()
    }
}

/// An API entity type.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Endpoint description.
    const SCHEMA: Schema;

    /// Local precondition for `delete`.
    fn check_delete(&self) -> PlatformResult<()> {
        Ok(())
    }

    /// Reshapes a raw representation before it is deserialized.
    fn normalize(value: Value) -> Value {
        value
    }
}

/// Keeps only whitelisted, non-null fields.
pub fn pick(value: &Value, fields: &[&str]) -> Value {
    let mut picked = Map::new();
    if let Some(map) = value.as_object() {
        for field in fields {
            match map.get(*field) {
                Some(Value::Null) | None => {}
                Some(v) => {
                    picked.insert(field.to_string(), v.clone());
                }
            }
        }
    }
    Value::Object(picked)
}

/// Unwraps `_embedded.entity` when the server wraps the updated representation.
fn unwrap_entity(value: Value) -> Value {
    match value.pointer("/_embedded/entity") {
        Some(entity) if entity.is_object() => entity.clone(),
        _ => value,
    }
}

fn to_object<T: Serialize>(data: &T) -> PlatformResult<Map<String, Value>> {
    match serde_json::to_value(data) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(PlatformError::new(
            PlatformErrorKind::UnexpectedFormat,
            "Entity does not serialize to an object",
        )),
        Err(e) => Err(PlatformError::new(
            PlatformErrorKind::InvalidParameter,
            format!("Failed to serialize entity: {}", e),
        )),
    }
}

fn from_object<T: DeserializeOwned>(map: Map<String, Value>) -> PlatformResult<T> {
    serde_json::from_value(Value::Object(map)).map_err(|e| {
        PlatformError::deserialization(format!("Failed to deserialize entity: {}", e))
    })
}

/// An entity instance with its identity parameters and latest link map.
#[derive(Debug, Clone)]
pub struct Resource<T: Entity> {
    data: T,
    links: Links,
    params: Params,
    collection_url: Option<String>,
}

impl<T: Entity> Resource<T> {
    /// Wraps caller data, typically before `save`.
    pub fn new(data: T) -> Self {
        Self {
            data,
            links: Links::new(),
            params: Params::new(),
            collection_url: None,
        }
    }

    /// Sets identity path parameters.
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Overrides the collection URL derived from the schema.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.collection_url = Some(url.into());
        self
    }

    /// Builds an instance from a server representation merged over `params`.
    pub fn from_value(
        value: Value,
        params: Params,
        collection_url: Option<String>,
    ) -> PlatformResult<Self> {
        let Value::Object(mut object) = T::normalize(value) else {
            return Err(PlatformError::new(
                PlatformErrorKind::UnexpectedFormat,
                "Expected an object representation",
            ));
        };

        let links = object
            .remove("_links")
            .map(|links| Links::from_value(&links))
            .unwrap_or_default();

        let mut merged = params.clone();
        merged.extend(object);

        Ok(Self {
            data: from_object(merged)?,
            links,
            params,
            collection_url,
        })
    }

    /// Typed entity data.
    pub fn data(&self) -> &T {
        &self.data
    }

    /// Consumes the resource, returning its data.
    pub fn into_inner(self) -> T {
        self.data
    }

    /// Latest link map.
    pub fn links(&self) -> &Links {
        &self.links
    }

    /// Identity path parameters.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Href of a relation. Fails locally when the relation is absent.
    pub fn link(&self, rel: &str) -> PlatformResult<&str> {
        self.links
            .get(rel)
            .ok_or_else(|| PlatformError::link_not_found(rel))
    }

    /// Returns true if the relation is present.
    pub fn has_link(&self, rel: &str) -> bool {
        self.links.contains(rel)
    }

    /// All hrefs of a relation.
    pub fn link_hrefs(&self, rel: &str) -> &[String] {
        self.links.all(rel)
    }

    fn template(&self, config: &PlatformConfig) -> String {
        match &self.collection_url {
            Some(url) => format!("{}/:id", url.trim_end_matches('/')),
            None => T::SCHEMA.template(config),
        }
    }

    fn identity_params(&self) -> PlatformResult<Params> {
        let mut params = self.params.clone();
        if !params.contains_key("id") {
            if let Some(id) = to_object(&self.data)?.remove("id") {
                params.insert("id".to_string(), id);
            }
        }
        Ok(params)
    }

    /// Instance URL: the `self` link when known, else the resolved template.
    pub fn uri(&self, config: &PlatformConfig) -> PlatformResult<String> {
        if let Some(href) = self.links.get("self") {
            return Ok(href.to_string());
        }
        Ok(template::resolve(
            &self.template(config),
            &self.identity_params()?,
            &T::SCHEMA.defaults_map(),
        ))
    }

    fn collection(&self, config: &PlatformConfig) -> String {
        let mut params = self.params.clone();
        params.remove("id");
        template::resolve(&self.template(config), &params, &T::SCHEMA.defaults_map())
    }

    fn absorb(&mut self, response: Value) -> PlatformResult<()> {
        let Value::Object(mut incoming) = T::normalize(unwrap_entity(response)) else {
            return Ok(());
        };

        if let Some(links) = incoming.remove("_links") {
            self.links = Links::from_value(&links);
        }

        let mut current = to_object(&self.data)?;
        current.extend(incoming);
        self.data = from_object(current)?;
        Ok(())
    }

    /// Creates the entity with its creatable fields and merges the response.
    pub async fn save(&mut self, client: &PlatformClient) -> PlatformResult<()> {
        let body = pick(&Value::Object(to_object(&self.data)?), T::SCHEMA.creatable);
        let url = self.collection(client.config());

        let response = client
            .authenticated_request(ApiRequest::post(url).json(body))
            .await?
            .into_value()
            .await?;
        self.absorb(response)
    }

    /// Patches the modifiable fields of `partial` and merges the response.
    pub async fn update(
        &mut self,
        client: &PlatformClient,
        partial: Value,
        custom_url: Option<&str>,
    ) -> PlatformResult<()> {
        if !partial.is_object() {
            return Err(PlatformError::invalid_argument(
                "Update data must be an object",
            ));
        }
        let body = pick(&partial, T::SCHEMA.modifiable);

        let url = match custom_url {
            Some(url) => url.to_string(),
            None => match self.links.get("#edit") {
                Some(href) => href.to_string(),
                None => self.uri(client.config())?,
            },
        };

        let response = client
            .authenticated_request(ApiRequest::patch(url).json(body))
            .await?
            .into_value()
            .await?;
        self.absorb(response)
    }

    /// Deletes the entity after its local precondition passes.
    pub async fn delete(&self, client: &PlatformClient) -> PlatformResult<ApiResponse> {
        self.data.check_delete()?;

        let url = match self.links.get("#delete") {
            Some(href) => href.to_string(),
            None => self.uri(client.config())?,
        };
        client.authenticated_request(ApiRequest::delete(url)).await
    }

    /// Invokes an action link and returns the started activity.
    pub async fn run_long_operation(
        &self,
        client: &PlatformClient,
        action: &str,
        method: Method,
        body: Option<Value>,
    ) -> PlatformResult<Resource<Activity>> {
        let rel = format!("#{}", action);
        let url = self
            .links
            .get(&rel)
            .or_else(|| self.links.get(action))
            .ok_or_else(|| PlatformError::link_not_found(&rel))?
            .to_string();

        let mut request = ApiRequest::new(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let value = client.authenticated_request(request).await?.into_value().await?;
        let activity = match value.pointer("/_embedded/activities/0") {
            Some(first) => first.clone(),
            None => value,
        };
        Resource::from_value(activity, Params::new(), None)
    }
}

impl<T: Entity> Deref for Resource<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}

impl<T: Entity> DerefMut for Resource<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.data
    }
}

/// Pulls the item array out of a collection response.
#[derive(Debug, Clone, Copy, Default)]
pub enum Extractor {
    /// The body itself is the array.
    #[default]
    Root,
    /// The array sits under a top-level key, e.g. `{"regions": [...]}`.
    Field(&'static str),
    /// Custom extraction.
    Custom(fn(Value) -> Option<Vec<Value>>),
}

impl Extractor {
    /// Extracts the items.
    pub fn extract(self, value: Value) -> PlatformResult<Vec<Value>> {
        let items = match self {
            Self::Root => match value {
                Value::Array(items) => Some(items),
                _ => None,
            },
            Self::Field(name) => match value {
                Value::Object(mut map) => match map.remove(name) {
                    Some(Value::Array(items)) => Some(items),
                    _ => None,
                },
                _ => None,
            },
            Self::Custom(extract) => extract(value),
        };

        items.ok_or_else(|| {
            PlatformError::new(
                PlatformErrorKind::UnexpectedFormat,
                "Collection response does not contain an item array",
            )
        })
    }
}

/// Generic get/query operations for an entity type.
pub struct ResourceService<'a, T: Entity> {
    client: &'a PlatformClient,
    _entity: PhantomData<T>,
}

impl<'a, T: Entity> ResourceService<'a, T> {
    /// Creates a new resource service.
    pub fn new(client: &'a PlatformClient) -> Self {
        Self {
            client,
            _entity: PhantomData,
        }
    }

    fn collection_url(&self, path_params: &Params, custom_url: Option<&str>) -> String {
        let template = match custom_url {
            Some(url) => url.to_string(),
            None => T::SCHEMA.template(self.client.config()),
        };
        let mut params = path_params.clone();
        params.remove("id");
        template::resolve(&template, &params, &T::SCHEMA.defaults_map())
    }

    /// Fetches a single entity. A custom URL is treated as the collection URL.
    pub async fn get(
        &self,
        path_params: Params,
        query: Params,
        custom_url: Option<&str>,
    ) -> PlatformResult<Resource<T>> {
        let template = match custom_url {
            Some(url) => format!("{}/:id", url.trim_end_matches('/')),
            None => T::SCHEMA.template(self.client.config()),
        };
        let url = template::resolve(&template, &path_params, &T::SCHEMA.defaults_map());

        let value = self
            .client
            .authenticated_request(ApiRequest::get(url).query(query))
            .await?
            .into_value()
            .await?;
        Resource::from_value(value, path_params, custom_url.map(String::from))
    }

    /// Fetches a collection.
    pub async fn query(
        &self,
        path_params: Params,
        query: Params,
        custom_url: Option<&str>,
        extractor: Extractor,
    ) -> PlatformResult<Vec<Resource<T>>> {
        let url = self.collection_url(&path_params, custom_url);

        let value = self
            .client
            .authenticated_request(ApiRequest::get(url).query(query))
            .await?
            .into_value()
            .await?;

        extractor
            .extract(value)?
            .into_iter()
            .map(|item| {
                Resource::from_value(item, path_params.clone(), custom_url.map(String::from))
            })
            .collect()
    }

    /// Starts a cursored query; the first page is fetched before returning.
    pub async fn query_cursored(
        &self,
        path_params: Params,
        query: Params,
        custom_url: Option<&str>,
        options: CursorOptions,
    ) -> PlatformResult<Cursor<'a, T>> {
        let url = self.collection_url(&path_params, custom_url);
        Cursor::start(self.client, url, query, path_params, options).await
    }
}
