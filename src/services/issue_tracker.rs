use async_trait::async_trait;

use crate::domain::issue::{
    Comment, FieldChange, HistoryEntry, Issue, IssueDraft, IssueQuery, IssueRef, IssueSummary,
    IssueUpdate, NewComment,
};
use crate::error::AppResult;

#[async_trait]
pub trait IssueTracker: Send + Sync {
    async fn search_issues(&self, query: &IssueQuery) -> AppResult<Vec<IssueSummary>>;
    async fn get_issue(&self, issue: &IssueRef) -> AppResult<Issue>;
    async fn comments(&self, issue: &IssueRef) -> AppResult<Vec<Comment>>;
    async fn history(
        &self,
        issue: &IssueRef,
        new_since: Option<chrono::NaiveDate>,
    ) -> AppResult<Vec<HistoryEntry>>;
    async fn create_issue(&self, draft: &IssueDraft) -> AppResult<u64>;
    /// Returns the id of the new comment.
    async fn add_comment(&self, issue: &IssueRef, comment: &NewComment) -> AppResult<u64>;
    async fn update_issue(
        &self,
        issue: &IssueRef,
        update: &IssueUpdate,
    ) -> AppResult<Vec<FieldChange>>;
}
