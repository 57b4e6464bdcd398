use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::domain::issue::{
    Comment, FieldChange, HistoryEntry, Issue, IssueDraft, IssueQuery, IssueRef, IssueSummary,
    IssueUpdate, NewComment, normalize_workflow_value,
};
use crate::error::{AppError, AppResult};
use crate::infra::client::RestClient;
use crate::services::IssueTracker;

const SUMMARY_FIELDS: &str =
    "id,alias,summary,status,resolution,assigned_to,product,component,last_change_time";

pub struct BugzillaTracker {
    client: RestClient,
}

impl BugzillaTracker {
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }

    fn bug_path(issue: &IssueRef) -> String {
        format!("bug/{}", issue.as_str())
    }
}

#[async_trait]
impl IssueTracker for BugzillaTracker {
    async fn search_issues(&self, query: &IssueQuery) -> AppResult<Vec<IssueSummary>> {
        let mut params = Vec::new();
        let mut push = |name: &str, value: Option<String>| {
            if let Some(value) = value {
                params.push((name.to_string(), value));
            }
        };
        push("status", query.status.as_deref().map(normalize_workflow_value));
        push("assigned_to", query.assignee.clone());
        push("summary", query.text.clone());
        push("product", query.product.clone());
        push("component", query.component.clone());
        push("include_fields", Some(SUMMARY_FIELDS.to_string()));

        let records = self
            .client
            .get_paginated("bug", &params, "bugs", query.limit)
            .await?;

        records
            .into_iter()
            .map(|record| decode::<BugRecord>(record, "bug").map(BugRecord::into_summary))
            .collect()
    }

    async fn get_issue(&self, issue: &IssueRef) -> AppResult<Issue> {
        let body = self.client.get(&Self::bug_path(issue), &[]).await?;
        let list: BugList = decode(body, "bug")?;
        let record = list.bugs.into_iter().next().ok_or_else(|| not_found(issue))?;
        let comments = self.comments(issue).await?;
        Ok(record.into_issue(comments))
    }

    async fn comments(&self, issue: &IssueRef) -> AppResult<Vec<Comment>> {
        let path = format!("{}/comment", Self::bug_path(issue));
        let body = self.client.get(&path, &[]).await?;
        let envelope: CommentsEnvelope = decode(body, "comment")?;

        // Keyed by numeric id even when the request used an alias.
        let list = envelope
            .bugs
            .into_values()
            .next()
            .ok_or_else(|| not_found(issue))?;
        Ok(list.comments.into_iter().map(Comment::from).collect())
    }

    async fn history(
        &self,
        issue: &IssueRef,
        new_since: Option<NaiveDate>,
    ) -> AppResult<Vec<HistoryEntry>> {
        let path = format!("{}/history", Self::bug_path(issue));
        let params = new_since
            .map(|date| vec![("new_since".to_string(), date.format("%Y-%m-%d").to_string())])
            .unwrap_or_default();
        let body = self.client.get(&path, &params).await?;
        let envelope: HistoryEnvelope = decode(body, "history")?;

        let bug = envelope
            .bugs
            .into_iter()
            .next()
            .ok_or_else(|| not_found(issue))?;
        Ok(bug.history.into_iter().map(HistoryEntry::from).collect())
    }

    async fn create_issue(&self, draft: &IssueDraft) -> AppResult<u64> {
        let body = serde_json::to_value(CreateBugRequest::from(draft))
            .map_err(|err| AppError::validation(format!("failed to encode issue: {err}")))?;
        let response = self.client.post("bug", &body).await?;
        let created: IdResponse = decode(response, "create")?;
        debug!(id = created.id, "issue created");
        Ok(created.id)
    }

    async fn add_comment(&self, issue: &IssueRef, comment: &NewComment) -> AppResult<u64> {
        let path = format!("{}/comment", Self::bug_path(issue));
        let body = serde_json::json!({
            "comment": comment.text,
            "is_private": comment.is_private,
        });
        let response = self.client.post(&path, &body).await?;
        let created: IdResponse = decode(response, "comment")?;
        Ok(created.id)
    }

    async fn update_issue(
        &self,
        issue: &IssueRef,
        update: &IssueUpdate,
    ) -> AppResult<Vec<FieldChange>> {
        let body = serde_json::to_value(UpdateBugRequest::from(update))
            .map_err(|err| AppError::validation(format!("failed to encode update: {err}")))?;
        let response = self.client.put(&Self::bug_path(issue), &body).await?;
        let envelope: UpdateEnvelope = decode(response, "update")?;

        let updated = envelope
            .bugs
            .into_iter()
            .next()
            .ok_or_else(|| not_found(issue))?;
        Ok(updated
            .changes
            .into_iter()
            .map(|(field, change)| FieldChange {
                field,
                removed: change.removed,
                added: change.added,
                attachment_id: None,
            })
            .collect())
    }
}

fn decode<T: DeserializeOwned>(value: Value, what: &str) -> AppResult<T> {
    serde_json::from_value(value).map_err(|err| {
        debug!(error = %err, what, "unexpected payload shape");
        AppError::Remote {
            status: 200,
            message: format!("unexpected {what} payload from the issue tracker"),
        }
    })
}

fn not_found(issue: &IssueRef) -> AppError {
    AppError::NotFound {
        message: format!("issue {issue} does not exist"),
        status: None,
    }
}

fn empty_to_none(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Older installs send `alias` as a string or null, newer ones as a list.
fn aliases<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Many(Vec<String>),
        One(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Many(values)) => values,
        Some(Raw::One(value)) if !value.is_empty() => vec![value],
        _ => Vec::new(),
    })
}

#[derive(Deserialize)]
struct BugList {
    #[serde(default)]
    bugs: Vec<BugRecord>,
}

#[derive(Deserialize)]
struct BugRecord {
    id: u64,
    #[serde(default, deserialize_with = "aliases")]
    alias: Vec<String>,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    resolution: Option<String>,
    #[serde(default)]
    assigned_to: Option<String>,
    #[serde(default)]
    creator: Option<String>,
    #[serde(default)]
    product: String,
    #[serde(default)]
    component: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    creation_time: Option<DateTime<Utc>>,
    #[serde(default)]
    last_change_time: Option<DateTime<Utc>>,
}

impl BugRecord {
    fn into_summary(self) -> IssueSummary {
        IssueSummary {
            id: self.id,
            alias: self.alias,
            summary: self.summary,
            status: self.status,
            resolution: self.resolution.and_then(empty_to_none),
            assignee: self.assigned_to.and_then(empty_to_none),
            product: self.product,
            component: self.component,
            updated_at: self.last_change_time,
        }
    }

    fn into_issue(self, comments: Vec<Comment>) -> Issue {
        Issue {
            id: self.id,
            alias: self.alias,
            summary: self.summary,
            status: self.status,
            resolution: self.resolution.and_then(empty_to_none),
            assignee: self.assigned_to.and_then(empty_to_none),
            creator: self.creator.and_then(empty_to_none),
            product: self.product,
            component: self.component,
            version: self.version.and_then(empty_to_none),
            priority: self.priority.and_then(empty_to_none),
            severity: self.severity.and_then(empty_to_none),
            created_at: self.creation_time,
            updated_at: self.last_change_time,
            comments,
        }
    }
}

#[derive(Deserialize)]
struct CommentsEnvelope {
    #[serde(default)]
    bugs: HashMap<String, CommentList>,
}

#[derive(Deserialize)]
struct CommentList {
    #[serde(default)]
    comments: Vec<CommentRecord>,
}

#[derive(Deserialize)]
struct CommentRecord {
    id: u64,
    #[serde(default)]
    count: u64,
    #[serde(default)]
    creator: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    creation_time: Option<DateTime<Utc>>,
    #[serde(default)]
    is_private: bool,
}

impl From<CommentRecord> for Comment {
    fn from(record: CommentRecord) -> Self {
        Self {
            id: record.id,
            count: record.count,
            author: record.creator,
            text: record.text,
            created_at: record.creation_time,
            is_private: record.is_private,
        }
    }
}

#[derive(Deserialize)]
struct HistoryEnvelope {
    #[serde(default)]
    bugs: Vec<BugHistory>,
}

#[derive(Deserialize)]
struct BugHistory {
    #[serde(default)]
    history: Vec<HistoryRecord>,
}

#[derive(Deserialize)]
struct HistoryRecord {
    when: DateTime<Utc>,
    #[serde(default)]
    who: String,
    #[serde(default)]
    changes: Vec<ChangeRecord>,
}

#[derive(Deserialize)]
struct ChangeRecord {
    #[serde(default)]
    field_name: String,
    #[serde(default)]
    removed: String,
    #[serde(default)]
    added: String,
    #[serde(default)]
    attachment_id: Option<u64>,
}

impl From<HistoryRecord> for HistoryEntry {
    fn from(record: HistoryRecord) -> Self {
        Self {
            when: record.when,
            who: record.who,
            changes: record
                .changes
                .into_iter()
                .map(|change| FieldChange {
                    field: change.field_name,
                    removed: change.removed,
                    added: change.added,
                    attachment_id: change.attachment_id,
                })
                .collect(),
        }
    }
}

#[derive(Deserialize)]
struct IdResponse {
    id: u64,
}

#[derive(Deserialize)]
struct UpdateEnvelope {
    #[serde(default)]
    bugs: Vec<UpdatedBug>,
}

#[derive(Deserialize)]
struct UpdatedBug {
    #[serde(default)]
    changes: BTreeMap<String, ChangeValues>,
}

#[derive(Deserialize)]
struct ChangeValues {
    #[serde(default)]
    removed: String,
    #[serde(default)]
    added: String,
}

#[derive(Serialize)]
struct CreateBugRequest<'a> {
    product: &'a str,
    component: &'a str,
    summary: &'a str,
    version: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    severity: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    priority: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    assigned_to: Option<&'a str>,
}

impl<'a> From<&'a IssueDraft> for CreateBugRequest<'a> {
    fn from(draft: &'a IssueDraft) -> Self {
        Self {
            product: &draft.product,
            component: &draft.component,
            summary: &draft.summary,
            version: &draft.version,
            description: draft.description.as_deref(),
            severity: draft.severity.as_deref(),
            priority: draft.priority.as_deref(),
            assigned_to: draft.assignee.as_deref(),
        }
    }
}

#[derive(Serialize)]
struct UpdateBugRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<UpdateComment<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    assigned_to: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    priority: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    severity: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    component: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    whiteboard: Option<&'a str>,
}

#[derive(Serialize)]
struct UpdateComment<'a> {
    body: &'a str,
    is_private: bool,
}

impl<'a> From<&'a IssueUpdate> for UpdateBugRequest<'a> {
    fn from(update: &'a IssueUpdate) -> Self {
        Self {
            status: update.status.as_deref().map(normalize_workflow_value),
            resolution: update.resolution.as_deref().map(normalize_workflow_value),
            comment: update.comment.as_deref().map(|body| UpdateComment {
                body,
                is_private: false,
            }),
            summary: update.summary.as_deref(),
            assigned_to: update.assignee.as_deref(),
            priority: update.priority.as_deref(),
            severity: update.severity.as_deref(),
            component: update.component.as_deref(),
            version: update.version.as_deref(),
            whiteboard: update.whiteboard.as_deref(),
        }
    }
}
