//! Support ticket comments.

use crate::client::PlatformClient;
use crate::errors::PlatformResult;
use crate::resource::{ApiBase, Entity, Extractor, Resource, Schema};
use crate::template::{params, Params};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A comment on a support ticket.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Comment {
    /// Comment ID.
    #[serde(default)]
    pub comment_id: Option<String>,
    /// Ticket the comment belongs to.
    #[serde(default)]
    pub ticket_id: String,
    /// Comment text.
    #[serde(default)]
    pub body: String,
    /// Author user ID.
    #[serde(default)]
    pub author_id: Option<String>,
    /// Whether the comment is public.
    #[serde(default)]
    pub public: Option<bool>,
    /// Attachments.
    #[serde(default)]
    pub attachments: Vec<Value>,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Comment {
    /// Creates a new comment for a ticket.
    pub fn new(ticket_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            body: body.into(),
            ..Self::default()
        }
    }
}

impl Entity for Comment {
    const SCHEMA: Schema = Schema::new(ApiBase::Api, "/v1/comments")
        .creatable(&["body", "ticket_id", "attachments", "author_id"]);
}

/// Service for comment operations.
pub struct CommentsService<'a> {
    client: &'a PlatformClient,
}

impl<'a> CommentsService<'a> {
    /// Creates a new comments service.
    pub fn new(client: &'a PlatformClient) -> Self {
        Self { client }
    }

    /// Lists the comments of a ticket. The response wraps them as `{"comments": [...]}`.
    pub async fn list(&self, ticket_id: &str, query: Params) -> PlatformResult<Vec<Resource<Comment>>> {
        let url = self.client.api_endpoint("/v1/comments/:ticketId");
        self.client
            .resources::<Comment>()
            .query(
                params(json!({"ticketId": ticket_id})),
                query,
                Some(&url),
                Extractor::Field("comments"),
            )
            .await
    }

    /// Posts a comment.
    pub async fn send(&self, comment: Comment) -> PlatformResult<Resource<Comment>> {
        let mut resource = Resource::new(comment);
        resource.save(self.client).await?;
        Ok(resource)
    }
}
