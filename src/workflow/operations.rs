use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::operation::{Acknowledgement, Operation, OperationOutput, OperationRequest};
use crate::error::{AppError, AppResult, OperationError};
use crate::services::IssueTracker;

/// Serialized reply for one invocation: `{"ok": true, "result": ...}` or
/// `{"ok": false, "error": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<OperationOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
}

impl From<Result<OperationOutput, OperationError>> for OperationResponse {
    fn from(result: Result<OperationOutput, OperationError>) -> Self {
        match result {
            Ok(output) => Self {
                ok: true,
                result: Some(output),
                error: None,
            },
            Err(error) => Self {
                ok: false,
                result: None,
                error: Some(error),
            },
        }
    }
}

/// Maps the operation catalog onto an [`IssueTracker`]. Holds no mutable
/// state, so one adapter can serve concurrent invocations.
#[derive(Clone)]
pub struct OperationAdapter {
    tracker: Arc<dyn IssueTracker>,
}

impl OperationAdapter {
    pub fn new(tracker: Arc<dyn IssueTracker>) -> Self {
        Self { tracker }
    }

    pub async fn invoke(
        &self,
        request: OperationRequest,
    ) -> Result<OperationOutput, OperationError> {
        let name = request.operation.clone();
        let outcome = match Operation::from_request(request) {
            Ok(operation) => self.execute(operation).await,
            Err(err) => Err(err),
        };

        outcome.map_err(|err| {
            warn!(operation = %name, kind = ?err.kind(), error = %err, "operation failed");
            OperationError::from(err)
        })
    }

    pub async fn execute(&self, operation: Operation) -> AppResult<OperationOutput> {
        info!(operation = operation.kind().as_str(), "dispatching operation");

        match operation {
            Operation::SearchIssues(query) => {
                let issues = self.tracker.search_issues(&query).await?;
                Ok(OperationOutput::Issues { issues })
            }
            Operation::GetIssue(issue) => {
                let issue = self.tracker.get_issue(&issue).await?;
                Ok(OperationOutput::Issue { issue })
            }
            Operation::CreateIssue(draft) => {
                let id = self.tracker.create_issue(&draft).await?;
                Ok(OperationOutput::Created { id })
            }
            Operation::AddComment { issue, comment } => {
                let comment_id = self.tracker.add_comment(&issue, &comment).await?;
                Ok(OperationOutput::Acknowledged(Acknowledgement {
                    issue,
                    comment_id: Some(comment_id),
                    changes: Vec::new(),
                }))
            }
            Operation::UpdateStatus { issue, update } => {
                let changes = self
                    .tracker
                    .update_issue(&issue, &update)
                    .await
                    .map_err(as_transition_error)?;
                Ok(OperationOutput::Acknowledged(Acknowledgement {
                    issue,
                    comment_id: None,
                    changes,
                }))
            }
            Operation::GetComments(issue) => {
                let comments = self.tracker.comments(&issue).await?;
                Ok(OperationOutput::Comments { issue, comments })
            }
            Operation::GetHistory { issue, new_since } => {
                let history = self.tracker.history(&issue, new_since).await?;
                Ok(OperationOutput::History { issue, history })
            }
            Operation::UpdateIssue { issue, update } => {
                let changes = self.tracker.update_issue(&issue, &update).await?;
                Ok(OperationOutput::Acknowledged(Acknowledgement {
                    issue,
                    comment_id: None,
                    changes,
                }))
            }
        }
    }
}

/// The tracker rejects a disallowed transition as a validation failure.
fn as_transition_error(err: AppError) -> AppError {
    match err {
        AppError::Validation { message, status } => {
            AppError::InvalidTransition { message, status }
        }
        other => other,
    }
}
