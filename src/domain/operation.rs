use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::domain::issue::{
    Comment, FieldChange, HistoryEntry, Issue, IssueDraft, IssueQuery, IssueRef, IssueSummary,
    IssueUpdate, NewComment,
};
use crate::error::{AppError, AppResult};

pub const DEFAULT_VERSION: &str = "unspecified";

/// An operation name plus its raw arguments, as received from the protocol layer.
#[derive(Debug, Clone, Deserialize)]
pub struct OperationRequest {
    pub operation: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl OperationRequest {
    pub fn new(operation: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            operation: operation.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    SearchIssues,
    GetIssue,
    CreateIssue,
    AddComment,
    UpdateStatus,
    GetComments,
    GetHistory,
    UpdateIssue,
}

impl OperationKind {
    pub const ALL: [OperationKind; 8] = [
        OperationKind::SearchIssues,
        OperationKind::GetIssue,
        OperationKind::CreateIssue,
        OperationKind::AddComment,
        OperationKind::UpdateStatus,
        OperationKind::GetComments,
        OperationKind::GetHistory,
        OperationKind::UpdateIssue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::SearchIssues => "search_issues",
            OperationKind::GetIssue => "get_issue",
            OperationKind::CreateIssue => "create_issue",
            OperationKind::AddComment => "add_comment",
            OperationKind::UpdateStatus => "update_status",
            OperationKind::GetComments => "get_comments",
            OperationKind::GetHistory => "get_history",
            OperationKind::UpdateIssue => "update_issue",
        }
    }

    pub fn from_name(name: &str) -> AppResult<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name)
            .ok_or_else(|| AppError::UnsupportedOperation(name.to_string()))
    }

    pub fn descriptor(&self) -> OperationDescriptor {
        let (description, input_schema) = match self {
            OperationKind::SearchIssues => (
                "Search issues by status, assignee, summary text, product or component. Results keep the tracker's order.",
                object_schema(
                    json!({
                        "status": string_schema("Workflow status, e.g. NEW or in-progress"),
                        "assignee": string_schema("Login of the assigned user"),
                        "text": string_schema("Substring to match in the summary"),
                        "product": string_schema("Product name"),
                        "component": string_schema("Component name"),
                        "limit": { "type": "integer", "minimum": 1, "description": "Maximum number of issues to return" }
                    }),
                    &[],
                ),
            ),
            OperationKind::GetIssue => (
                "Fetch one issue with its comments.",
                object_schema(json!({ "id": id_schema() }), &["id"]),
            ),
            OperationKind::CreateIssue => (
                "File a new issue and return its id.",
                object_schema(
                    json!({
                        "summary": string_schema("One-line description"),
                        "product": string_schema("Product the issue is filed against"),
                        "component": string_schema("Component within the product"),
                        "description": string_schema("Initial description"),
                        "version": string_schema("Affected version; defaults to 'unspecified'"),
                        "severity": string_schema("Severity"),
                        "priority": string_schema("Priority"),
                        "assignee": string_schema("Login of the user to assign")
                    }),
                    &["summary", "product", "component"],
                ),
            ),
            OperationKind::AddComment => (
                "Add a comment to an issue.",
                object_schema(
                    json!({
                        "id": id_schema(),
                        "text": string_schema("Comment body"),
                        "is_private": { "type": "boolean", "description": "Restrict the comment to the insider group" }
                    }),
                    &["id", "text"],
                ),
            ),
            OperationKind::UpdateStatus => (
                "Request a status transition. The tracker's workflow decides whether it is allowed.",
                object_schema(
                    json!({
                        "id": id_schema(),
                        "status": string_schema("Target status, e.g. in-progress or resolved"),
                        "resolution": string_schema("Resolution when closing, e.g. fixed"),
                        "comment": string_schema("Comment recorded with the transition")
                    }),
                    &["id", "status"],
                ),
            ),
            OperationKind::GetComments => (
                "List an issue's comments in order; the first is the original description.",
                object_schema(json!({ "id": id_schema() }), &["id"]),
            ),
            OperationKind::GetHistory => (
                "List an issue's change history.",
                object_schema(
                    json!({
                        "id": id_schema(),
                        "new_since": { "type": "string", "format": "date", "description": "Only changes on or after this date (YYYY-MM-DD)" }
                    }),
                    &["id"],
                ),
            ),
            OperationKind::UpdateIssue => (
                "Edit issue fields other than status.",
                object_schema(
                    json!({
                        "id": id_schema(),
                        "summary": string_schema("New summary"),
                        "assignee": string_schema("Login of the new assignee"),
                        "priority": string_schema("Priority"),
                        "severity": string_schema("Severity"),
                        "component": string_schema("Component"),
                        "version": string_schema("Version"),
                        "whiteboard": string_schema("Status whiteboard")
                    }),
                    &["id"],
                ),
            ),
        };

        OperationDescriptor {
            name: self.as_str(),
            description,
            input_schema,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OperationDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

pub fn catalog() -> Vec<OperationDescriptor> {
    OperationKind::ALL
        .iter()
        .map(OperationKind::descriptor)
        .collect()
}

fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "properties": properties,
        "required": required,
    })
}

fn string_schema(description: &str) -> Value {
    json!({ "type": "string", "minLength": 1, "description": description })
}

fn id_schema() -> Value {
    json!({
        "type": ["integer", "string"],
        "description": "Numeric issue id or alias"
    })
}

/// A validated operation, ready to dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    SearchIssues(IssueQuery),
    GetIssue(IssueRef),
    CreateIssue(IssueDraft),
    AddComment {
        issue: IssueRef,
        comment: NewComment,
    },
    UpdateStatus {
        issue: IssueRef,
        update: IssueUpdate,
    },
    GetComments(IssueRef),
    GetHistory {
        issue: IssueRef,
        new_since: Option<NaiveDate>,
    },
    UpdateIssue {
        issue: IssueRef,
        update: IssueUpdate,
    },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::SearchIssues(_) => OperationKind::SearchIssues,
            Operation::GetIssue(_) => OperationKind::GetIssue,
            Operation::CreateIssue(_) => OperationKind::CreateIssue,
            Operation::AddComment { .. } => OperationKind::AddComment,
            Operation::UpdateStatus { .. } => OperationKind::UpdateStatus,
            Operation::GetComments(_) => OperationKind::GetComments,
            Operation::GetHistory { .. } => OperationKind::GetHistory,
            Operation::UpdateIssue { .. } => OperationKind::UpdateIssue,
        }
    }

    /// Resolves the name and validates arguments. Nothing here touches the network.
    pub fn from_request(request: OperationRequest) -> AppResult<Self> {
        let kind = OperationKind::from_name(request.operation.trim())?;
        Self::parse(kind, request.arguments)
    }

    pub fn parse(kind: OperationKind, arguments: Map<String, Value>) -> AppResult<Self> {
        match kind {
            OperationKind::SearchIssues => {
                let args: SearchArgs = decode_args(kind, arguments)?;
                if args.limit == Some(0) {
                    return Err(AppError::validation("limit must be at least 1"));
                }
                Ok(Operation::SearchIssues(IssueQuery {
                    status: optional_text("status", args.status)?,
                    assignee: optional_text("assignee", args.assignee)?,
                    text: optional_text("text", args.text)?,
                    product: optional_text("product", args.product)?,
                    component: optional_text("component", args.component)?,
                    limit: args.limit,
                }))
            }
            OperationKind::GetIssue => {
                let args: IdArgs = decode_args(kind, arguments)?;
                Ok(Operation::GetIssue(args.id))
            }
            OperationKind::CreateIssue => {
                let args: CreateArgs = decode_args(kind, arguments)?;
                Ok(Operation::CreateIssue(IssueDraft {
                    summary: required_text("summary", args.summary)?,
                    product: required_text("product", args.product)?,
                    component: required_text("component", args.component)?,
                    version: optional_text("version", args.version)?
                        .unwrap_or_else(|| DEFAULT_VERSION.to_string()),
                    description: optional_text("description", args.description)?,
                    severity: optional_text("severity", args.severity)?,
                    priority: optional_text("priority", args.priority)?,
                    assignee: optional_text("assignee", args.assignee)?,
                }))
            }
            OperationKind::AddComment => {
                let args: CommentArgs = decode_args(kind, arguments)?;
                Ok(Operation::AddComment {
                    issue: args.id,
                    comment: NewComment {
                        text: required_text("text", args.text)?,
                        is_private: args.is_private.unwrap_or(false),
                    },
                })
            }
            OperationKind::UpdateStatus => {
                let args: StatusArgs = decode_args(kind, arguments)?;
                Ok(Operation::UpdateStatus {
                    issue: args.id,
                    update: IssueUpdate {
                        status: Some(required_text("status", args.status)?),
                        resolution: optional_text("resolution", args.resolution)?,
                        comment: optional_text("comment", args.comment)?,
                        ..IssueUpdate::default()
                    },
                })
            }
            OperationKind::GetComments => {
                let args: IdArgs = decode_args(kind, arguments)?;
                Ok(Operation::GetComments(args.id))
            }
            OperationKind::GetHistory => {
                let args: HistoryArgs = decode_args(kind, arguments)?;
                let new_since = optional_text("new_since", args.new_since)?
                    .map(|raw| {
                        NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| {
                            AppError::validation(format!(
                                "new_since must be a date in YYYY-MM-DD form, got '{raw}'"
                            ))
                        })
                    })
                    .transpose()?;
                Ok(Operation::GetHistory {
                    issue: args.id,
                    new_since,
                })
            }
            OperationKind::UpdateIssue => {
                let args: EditArgs = decode_args(kind, arguments)?;
                let update = IssueUpdate {
                    summary: optional_text("summary", args.summary)?,
                    assignee: optional_text("assignee", args.assignee)?,
                    priority: optional_text("priority", args.priority)?,
                    severity: optional_text("severity", args.severity)?,
                    component: optional_text("component", args.component)?,
                    version: optional_text("version", args.version)?,
                    whiteboard: optional_text("whiteboard", args.whiteboard)?,
                    ..IssueUpdate::default()
                };
                if update.is_empty() {
                    return Err(AppError::validation(
                        "update_issue needs at least one field to change",
                    ));
                }
                Ok(Operation::UpdateIssue {
                    issue: args.id,
                    update,
                })
            }
        }
    }
}

/// Success payload handed back to the protocol layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationOutput {
    Issues { issues: Vec<IssueSummary> },
    Issue { issue: Issue },
    Created { id: u64 },
    Comments { issue: IssueRef, comments: Vec<Comment> },
    History { issue: IssueRef, history: Vec<HistoryEntry> },
    Acknowledged(Acknowledgement),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Acknowledgement {
    pub issue: IssueRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_id: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<FieldChange>,
}

fn decode_args<T: DeserializeOwned>(
    kind: OperationKind,
    arguments: Map<String, Value>,
) -> AppResult<T> {
    serde_json::from_value(Value::Object(arguments)).map_err(|err| {
        AppError::validation(format!("invalid arguments for {}: {err}", kind.as_str()))
    })
}

fn required_text(name: &str, value: String) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(format!("{name} must not be empty")));
    }
    Ok(trimmed.to_string())
}

fn optional_text(name: &str, value: Option<String>) -> AppResult<Option<String>> {
    value.map(|value| required_text(name, value)).transpose()
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchArgs {
    status: Option<String>,
    assignee: Option<String>,
    text: Option<String>,
    product: Option<String>,
    component: Option<String>,
    limit: Option<usize>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct IdArgs {
    id: IssueRef,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CreateArgs {
    summary: String,
    product: String,
    component: String,
    description: Option<String>,
    version: Option<String>,
    severity: Option<String>,
    priority: Option<String>,
    assignee: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CommentArgs {
    id: IssueRef,
    text: String,
    is_private: Option<bool>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct StatusArgs {
    id: IssueRef,
    status: String,
    resolution: Option<String>,
    comment: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct HistoryArgs {
    id: IssueRef,
    new_since: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct EditArgs {
    id: IssueRef,
    summary: Option<String>,
    assignee: Option<String>,
    priority: Option<String>,
    severity: Option<String>,
    component: Option<String>,
    version: Option<String>,
    whiteboard: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected an object, got {other}"),
        }
    }

    fn validation_message(result: AppResult<Operation>) -> String {
        match result {
            Err(AppError::Validation { message, status }) => {
                assert_eq!(status, None);
                message
            }
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn every_kind_round_trips_through_its_name() {
        for kind in OperationKind::ALL {
            assert_eq!(OperationKind::from_name(kind.as_str()).unwrap(), kind);
        }
    }

    #[test]
    fn unknown_names_are_unsupported() {
        let err = OperationKind::from_name("delete_issue").unwrap_err();
        assert!(matches!(err, AppError::UnsupportedOperation(name) if name == "delete_issue"));
        assert!(OperationKind::from_name("SEARCH_ISSUES").is_err());
    }

    #[test]
    fn catalog_lists_required_fields() {
        let catalog = catalog();
        assert_eq!(catalog.len(), OperationKind::ALL.len());
        let create = catalog.iter().find(|d| d.name == "create_issue").unwrap();
        assert_eq!(
            create.input_schema["required"],
            json!(["summary", "product", "component"])
        );
    }

    #[test]
    fn create_issue_defaults_version_and_trims() {
        let op = Operation::parse(
            OperationKind::CreateIssue,
            args(json!({
                "summary": "  Crash on startup ",
                "product": "CoreApp",
                "component": "Launcher"
            })),
        )
        .unwrap();

        match op {
            Operation::CreateIssue(draft) => {
                assert_eq!(draft.summary, "Crash on startup");
                assert_eq!(draft.version, DEFAULT_VERSION);
                assert_eq!(draft.description, None);
            }
            other => panic!("unexpected operation: {other:?}"),
        }
    }

    #[test]
    fn create_issue_requires_product_and_component() {
        let message = validation_message(Operation::parse(
            OperationKind::CreateIssue,
            args(json!({ "summary": "Crash", "component": "Launcher" })),
        ));
        assert!(message.contains("product"));

        let message = validation_message(Operation::parse(
            OperationKind::CreateIssue,
            args(json!({ "summary": " ", "product": "CoreApp", "component": "Launcher" })),
        ));
        assert!(message.contains("summary"));
    }

    #[test]
    fn rejects_unknown_arguments() {
        let message = validation_message(Operation::parse(
            OperationKind::GetIssue,
            args(json!({ "id": 1, "include": "everything" })),
        ));
        assert!(message.contains("include"));
    }

    #[test]
    fn rejects_wrong_argument_types() {
        validation_message(Operation::parse(
            OperationKind::SearchIssues,
            args(json!({ "limit": "ten" })),
        ));
        validation_message(Operation::parse(
            OperationKind::AddComment,
            args(json!({ "id": 3, "text": "hi", "is_private": "yes" })),
        ));
    }

    #[test]
    fn search_rejects_zero_limit() {
        let message = validation_message(Operation::parse(
            OperationKind::SearchIssues,
            args(json!({ "limit": 0 })),
        ));
        assert!(message.contains("limit"));
    }

    #[test]
    fn update_status_accepts_numeric_or_alias_id() {
        let op = Operation::from_request(OperationRequest::new(
            "update_status",
            args(json!({ "id": 12345, "status": "resolved", "resolution": "fixed" })),
        ))
        .unwrap();
        assert_eq!(op.kind(), OperationKind::UpdateStatus);
        match op {
            Operation::UpdateStatus { issue, update } => {
                assert_eq!(issue.as_str(), "12345");
                assert_eq!(update.status.as_deref(), Some("resolved"));
                assert_eq!(update.resolution.as_deref(), Some("fixed"));
                assert_eq!(update.summary, None);
            }
            other => panic!("unexpected operation: {other:?}"),
        }
    }

    #[test]
    fn history_validates_date() {
        let message = validation_message(Operation::parse(
            OperationKind::GetHistory,
            args(json!({ "id": 1, "new_since": "01/02/2024" })),
        ));
        assert!(message.contains("YYYY-MM-DD"));

        let op = Operation::parse(
            OperationKind::GetHistory,
            args(json!({ "id": 1, "new_since": "2024-02-01" })),
        )
        .unwrap();
        assert_eq!(
            op,
            Operation::GetHistory {
                issue: IssueRef::from(1),
                new_since: NaiveDate::from_ymd_opt(2024, 2, 1),
            }
        );
    }

    #[test]
    fn update_issue_needs_a_field() {
        let message = validation_message(Operation::parse(
            OperationKind::UpdateIssue,
            args(json!({ "id": 1 })),
        ));
        assert!(message.contains("at least one field"));
    }

    #[test]
    fn serializes_outputs_with_type_tag() {
        let created = serde_json::to_value(OperationOutput::Created { id: 12345 }).unwrap();
        assert_eq!(created, json!({ "type": "created", "id": 12345 }));

        let ack = serde_json::to_value(OperationOutput::Acknowledged(Acknowledgement {
            issue: IssueRef::from(7),
            comment_id: Some(3),
            changes: Vec::new(),
        }))
        .unwrap();
        assert_eq!(
            ack,
            json!({ "type": "acknowledged", "issue": "7", "comment_id": 3 })
        );
    }
}
