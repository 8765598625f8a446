//! Environment operations.

use super::activities::Activity;
use crate::client::{ApiResponse, PlatformClient};
use crate::errors::{PlatformError, PlatformResult};
use crate::resource::{ApiBase, Entity, Extractor, Resource, ResourceService, Schema};
use crate::template::{params, Params};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

const SSH_LINK_PREFIX: &str = "pf:ssh:";
const MAX_ID_LENGTH: usize = 32;

/// Punctuation that survives in environment ids, besides `[A-Za-z0-9_]`.
const ID_SYMBOLS: &str = "$*+~.()'\"!:@";

static SSH_URL: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^ssh://([a-zA-Z0-9_\-]+)@(.+)$").ok());

/// Environment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentStatus {
    /// Deployed and serving.
    Active,
    /// Being modified.
    Dirty,
    /// Not deployed.
    #[default]
    Inactive,
    /// Being deleted.
    Deleting,
    /// Paused.
    Paused,
    /// Unrecognized status.
    #[serde(other)]
    Unknown,
}

/// Cron state of the last deployment.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CronState {
    /// Whether crons are enabled.
    #[serde(default)]
    pub enabled: bool,
    /// `running` or `paused`.
    #[serde(default)]
    pub status: String,
}

/// Deployment state.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DeploymentState {
    /// Cron state.
    #[serde(default)]
    pub crons: CronState,
    /// Last deployment time.
    #[serde(default)]
    pub last_deployment_at: Option<DateTime<Utc>>,
    /// Whether the last deployment succeeded.
    #[serde(default)]
    pub last_deployment_successful: bool,
}

/// One HTTP access rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessAddress {
    /// `allow` or `deny`.
    pub permission: String,
    /// IP address or CIDR.
    pub address: String,
}

/// HTTP access control settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HttpAccess {
    /// Whether access control is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_enabled: Option<bool>,
    /// Address rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<AccessAddress>>,
    /// Basic auth credentials by user name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic_auth: Option<BTreeMap<String, Option<String>>>,
}

/// A project environment.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Environment {
    /// Environment ID (the Git branch name).
    #[serde(default)]
    pub id: String,
    /// Status.
    #[serde(default)]
    pub status: EnvironmentStatus,
    /// Head commit SHA.
    #[serde(default)]
    pub head_commit: Option<String>,
    /// Name.
    #[serde(default)]
    pub name: String,
    /// Parent environment ID.
    #[serde(default)]
    pub parent: Option<String>,
    /// Machine-friendly name.
    #[serde(default)]
    pub machine_name: String,
    /// Whether robots are blocked.
    #[serde(default)]
    pub restrict_robots: bool,
    /// Title.
    #[serde(default)]
    pub title: String,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Last activity time.
    #[serde(default)]
    pub last_active_at: Option<DateTime<Utc>>,
    /// Last backup time.
    #[serde(default)]
    pub last_backup_at: Option<DateTime<Utc>>,
    /// Project ID.
    #[serde(default)]
    pub project: String,
    /// Whether the environment has uncommitted changes.
    #[serde(default)]
    pub is_dirty: bool,
    /// Whether outgoing email is enabled.
    #[serde(default)]
    pub enable_smtp: bool,
    /// Whether the environment has code.
    #[serde(default)]
    pub has_code: bool,
    /// Deployment target.
    #[serde(default)]
    pub deployment_target: String,
    /// Deployment state.
    #[serde(default)]
    pub deployment_state: Option<DeploymentState>,
    /// HTTP access control.
    #[serde(default)]
    pub http_access: HttpAccess,
    /// Whether this is the production environment.
    #[serde(default)]
    pub is_main: bool,
    /// Environment type: `production`, `staging` or `development`.
    #[serde(default, rename = "type")]
    pub environment_type: String,
}

impl Environment {
    /// Returns true if the environment is active.
    pub fn is_active(&self) -> bool {
        self.status == EnvironmentStatus::Active
    }
}

impl Entity for Environment {
    const SCHEMA: Schema = Schema::new(ApiBase::Api, "/projects/:projectId/environments/:id")
        .modifiable(&[
            "parent",
            "enable_smtp",
            "restrict_robots",
            "http_access",
            "title",
            "type",
        ]);

    fn check_delete(&self) -> PlatformResult<()> {
        if self.is_active() {
            return Err(PlatformError::invalid_state(
                "Active environments cannot be deleted",
            ));
        }
        Ok(())
    }
}

/// Turns a proposed title into an environment ID usable as a Git branch name.
///
/// Hyphens and whitespace runs become a single `-`; characters outside
/// `[A-Za-z0-9_]` and `ID_SYMBOLS` are dropped.
pub fn sanitize_id(proposed: &str) -> String {
    let kept: String = proposed
        .chars()
        .map(|c| if c == '-' { ' ' } else { c })
        .filter(|c| {
            c.is_ascii_alphanumeric() || *c == '_' || c.is_whitespace() || ID_SYMBOLS.contains(*c)
        })
        .collect();
    kept.split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .chars()
        .take(MAX_ID_LENGTH)
        .collect()
}

/// Parses `ssh://user@host` into `user<suffix>@host`.
fn convert_ssh_url(url: &str, user_suffix: &str) -> Option<String> {
    let captures = SSH_URL.as_ref()?.captures(url)?;
    Some(format!("{}{}@{}", &captures[1], user_suffix, &captures[2]))
}

impl Resource<Environment> {
    /// Activates the environment.
    pub async fn activate(&self, client: &PlatformClient) -> PlatformResult<Resource<Activity>> {
        if self.is_active() {
            return Err(PlatformError::invalid_state(
                "Active environments cannot be activated",
            ));
        }
        self.run_long_operation(client, "activate", Method::POST, None)
            .await
    }

    /// Deactivates the environment.
    pub async fn deactivate(&self, client: &PlatformClient) -> PlatformResult<Resource<Activity>> {
        if !self.is_active() {
            return Err(PlatformError::invalid_state(
                "Inactive environments cannot be deactivated",
            ));
        }
        self.run_long_operation(client, "deactivate", Method::POST, None)
            .await
    }

    /// Merges the environment into its parent.
    pub async fn merge(&self, client: &PlatformClient) -> PlatformResult<Resource<Activity>> {
        if self.parent.as_deref().map_or(true, str::is_empty) {
            return Err(PlatformError::invalid_state(
                "The environment does not have a parent, so it cannot be merged",
            ));
        }
        self.run_long_operation(client, "merge", Method::POST, None)
            .await
    }

    /// Synchronizes data and/or code from the parent.
    pub async fn synchronize(
        &self,
        client: &PlatformClient,
        data: bool,
        code: bool,
    ) -> PlatformResult<Resource<Activity>> {
        if !data && !code {
            return Err(PlatformError::invalid_argument(
                "Nothing to synchronize: you must specify data or code",
            ));
        }
        let body = json!({"synchronize_data": data, "synchronize_code": code});
        self.run_long_operation(client, "synchronize", Method::POST, Some(body))
            .await
    }

    /// Creates a child environment. Without an `id`, one is derived from the title.
    pub async fn branch(
        &self,
        client: &PlatformClient,
        title: &str,
        environment_type: &str,
        id: Option<&str>,
    ) -> PlatformResult<Resource<Activity>> {
        let name = match id {
            Some(id) => id.to_string(),
            None => sanitize_id(title),
        };
        if name.is_empty() {
            return Err(PlatformError::invalid_argument(
                "Cannot derive an environment ID from the title",
            ));
        }
        let body = json!({"name": name, "title": title, "type": environment_type});
        self.run_long_operation(client, "branch", Method::POST, Some(body))
            .await
    }

    /// Creates a backup.
    pub async fn backup(&self, client: &PlatformClient, safe: bool) -> PlatformResult<Resource<Activity>> {
        self.run_long_operation(client, "backup", Method::POST, Some(json!({"safe": safe})))
            .await
    }

    /// Redeploys the environment.
    pub async fn redeploy(&self, client: &PlatformClient) -> PlatformResult<Resource<Activity>> {
        self.run_long_operation(client, "redeploy", Method::POST, None)
            .await
    }

    /// Pauses the environment.
    pub async fn pause(&self, client: &PlatformClient) -> PlatformResult<Resource<Activity>> {
        self.run_long_operation(client, "pause", Method::POST, None)
            .await
    }

    /// Resumes a paused environment.
    pub async fn resume(&self, client: &PlatformClient) -> PlatformResult<Resource<Activity>> {
        self.run_long_operation(client, "resume", Method::POST, None)
            .await
    }

    /// Initializes an empty environment from an external repository
    /// (`url@branch`).
    pub async fn initialize(
        &self,
        client: &PlatformClient,
        profile: &str,
        repository: &str,
    ) -> PlatformResult<Resource<Activity>> {
        let body = json!({"profile": profile, "repository": repository});
        self.run_long_operation(client, "initialize", Method::POST, Some(body))
            .await
    }

    fn activities_url(&self, client: &PlatformClient) -> PlatformResult<String> {
        Ok(format!("{}/activities", self.uri(client.config())?))
    }

    /// Gets one activity of this environment.
    pub async fn activity(&self, client: &PlatformClient, id: &str) -> PlatformResult<Resource<Activity>> {
        let url = self.activities_url(client)?;
        client
            .resources::<Activity>()
            .get(params(json!({"id": id})), Params::new(), Some(&url))
            .await
    }

    /// Lists activities, optionally filtered by type and maximum creation time.
    pub async fn activities(
        &self,
        client: &PlatformClient,
        activity_type: Option<&str>,
        starts_at: Option<i64>,
    ) -> PlatformResult<Vec<Resource<Activity>>> {
        let url = self.activities_url(client)?;
        let query = params(json!({"type": activity_type, "starts_at": starts_at}));
        client
            .resources::<Activity>()
            .query(Params::new(), query, Some(&url), Extractor::Root)
            .await
    }

    /// SSH URLs by application name, from `pf:ssh:<app>` links.
    ///
    /// Falls back to the legacy `ssh` link under the key `ssh`.
    pub fn ssh_urls(&self) -> BTreeMap<String, String> {
        let mut urls: BTreeMap<String, String> = self
            .links()
            .with_prefix(SSH_LINK_PREFIX)
            .map(|(app, href)| (app.to_string(), href.to_string()))
            .collect();

        if urls.is_empty() && self.has_link("ssh") {
            if let Ok(legacy) = self.legacy_ssh_url("") {
                urls.insert("ssh".to_string(), format!("ssh://{}", legacy));
            }
        }
        urls
    }

    /// SSH address (`user@host`) for an application; empty for the default.
    pub fn ssh_url(&self, app: &str) -> PlatformResult<String> {
        if app.is_empty() && self.has_link("ssh") {
            return parse_ssh_link(self.link("ssh")?, "");
        }
        if let Some(url) = self.ssh_urls().get(app) {
            return parse_ssh_link(url, "");
        }
        self.legacy_ssh_url(app)
    }

    fn legacy_ssh_url(&self, app: &str) -> PlatformResult<String> {
        let suffix = if app.is_empty() {
            String::new()
        } else {
            format!("--{}", app)
        };
        parse_ssh_link(self.link("ssh")?, &suffix)
    }

    /// Resolved route URLs from the `pf:routes` relation.
    pub fn route_urls(&self) -> Vec<String> {
        self.link_hrefs("pf:routes").to_vec()
    }
}

fn parse_ssh_link(url: &str, suffix: &str) -> PlatformResult<String> {
    convert_ssh_url(url, suffix).ok_or_else(|| {
        PlatformError::invalid_state(format!("Unexpected SSH URL format: {}", url))
    })
}

/// Service for environment operations.
pub struct EnvironmentsService<'a> {
    client: &'a PlatformClient,
}

impl<'a> EnvironmentsService<'a> {
    /// Creates a new environments service.
    pub fn new(client: &'a PlatformClient) -> Self {
        Self { client }
    }

    fn resources(&self) -> ResourceService<'a, Environment> {
        self.client.resources()
    }

    /// Gets an environment.
    pub async fn get(&self, project_id: &str, id: &str) -> PlatformResult<Resource<Environment>> {
        self.get_with_query(project_id, id, Params::new()).await
    }

    /// Gets an environment with extra query parameters.
    pub async fn get_with_query(
        &self,
        project_id: &str,
        id: &str,
        query: Params,
    ) -> PlatformResult<Resource<Environment>> {
        self.resources()
            .get(params(json!({"projectId": project_id, "id": id})), query, None)
            .await
    }

    /// Lists the environments of a project.
    pub async fn list(&self, project_id: &str) -> PlatformResult<Vec<Resource<Environment>>> {
        self.resources()
            .query(
                params(json!({"projectId": project_id})),
                Params::new(),
                None,
                Extractor::Root,
            )
            .await
    }

    /// Updates modifiable fields of an environment.
    pub async fn update(
        &self,
        environment: &mut Resource<Environment>,
        changes: Value,
    ) -> PlatformResult<()> {
        environment.update(self.client, changes, None).await
    }

    /// Deletes an inactive environment.
    pub async fn delete(&self, environment: &Resource<Environment>) -> PlatformResult<ApiResponse> {
        environment.delete(self.client).await
    }
}
