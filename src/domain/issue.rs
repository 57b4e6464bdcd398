use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Identifier a caller uses to address an issue: a bug number or an alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct IssueRef(String);

impl IssueRef {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err("issue id must not be empty".to_string());
        }
        if trimmed
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '/' | '\\' | ',' | '?' | '#' | '&' | '%'))
        {
            return Err(format!("'{trimmed}' is not a valid issue id or alias"));
        }
        // A dot segment would resolve to another endpoint once joined into the path.
        if trimmed.chars().all(|c| c == '.') {
            return Err(format!("'{trimmed}' is not a valid issue id or alias"));
        }
        if trimmed.chars().all(|c| c.is_ascii_digit()) && trimmed.trim_start_matches('0').is_empty()
        {
            return Err("issue id must be a positive number".to_string());
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IssueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for IssueRef {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for IssueRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        let raw = match Raw::deserialize(deserializer)? {
            Raw::Number(id) => id.to_string(),
            Raw::Text(text) => text,
        };
        IssueRef::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueSummary {
    pub id: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alias: Vec<String>,
    pub summary: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    pub product: String,
    pub component: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub id: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alias: Vec<String>,
    pub summary: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    pub product: String,
    pub component: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comment {
    pub id: u64,
    /// Position within the issue; 0 is the original description.
    pub count: u64,
    pub author: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub is_private: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub when: DateTime<Utc>,
    pub who: String,
    pub changes: Vec<FieldChange>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub field: String,
    pub removed: String,
    pub added: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_id: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueQuery {
    pub status: Option<String>,
    pub assignee: Option<String>,
    pub text: Option<String>,
    pub product: Option<String>,
    pub component: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueDraft {
    pub summary: String,
    pub product: String,
    pub component: String,
    pub version: String,
    pub description: Option<String>,
    pub severity: Option<String>,
    pub priority: Option<String>,
    pub assignee: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub text: String,
    pub is_private: bool,
}

/// Field edits sent in one update; `None` leaves the remote value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueUpdate {
    pub status: Option<String>,
    pub resolution: Option<String>,
    pub comment: Option<String>,
    pub summary: Option<String>,
    pub assignee: Option<String>,
    pub priority: Option<String>,
    pub severity: Option<String>,
    pub component: Option<String>,
    pub version: Option<String>,
    pub whiteboard: Option<String>,
}

impl IssueUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Maps a free-form status or resolution name onto the tracker's
/// upper-snake form, so `in-progress` and `In Progress` both become
/// `IN_PROGRESS`.
pub fn normalize_workflow_value(raw: &str) -> String {
    raw.trim()
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|part| !part.is_empty())
        .map(str::to_uppercase)
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_numeric_and_alias_refs() {
        assert_eq!(IssueRef::parse(" 12345 ").unwrap().as_str(), "12345");
        assert_eq!(IssueRef::parse("crash-on-start").unwrap().as_str(), "crash-on-start");
        assert!(IssueRef::parse("").is_err());
        assert!(IssueRef::parse("0").is_err());
        assert!(IssueRef::parse("12/comment").is_err());
        assert!(IssueRef::parse("1,2").is_err());
    }

    #[test]
    fn rejects_refs_that_escape_the_bug_path() {
        for raw in [".", "..", "...", "%2e%2e", "12%2Fcomment", "..\\comment", "a%20b"] {
            assert!(IssueRef::parse(raw).is_err(), "{raw} should be rejected");
        }
        assert_eq!(IssueRef::parse("v1.2-crash").unwrap().as_str(), "v1.2-crash");
    }

    #[test]
    fn deserializes_ref_from_number_or_string() {
        let from_number: IssueRef = serde_json::from_value(json!(42)).unwrap();
        let from_text: IssueRef = serde_json::from_value(json!("42")).unwrap();
        assert_eq!(from_number, from_text);
        assert!(serde_json::from_value::<IssueRef>(json!(" ")).is_err());
        assert!(serde_json::from_value::<IssueRef>(json!(true)).is_err());
    }

    #[test]
    fn normalizes_workflow_values() {
        assert_eq!(normalize_workflow_value("resolved"), "RESOLVED");
        assert_eq!(normalize_workflow_value("in-progress"), "IN_PROGRESS");
        assert_eq!(normalize_workflow_value(" In Progress "), "IN_PROGRESS");
        assert_eq!(normalize_workflow_value("wont_fix"), "WONT_FIX");
    }

    #[test]
    fn empty_update_is_detected() {
        assert!(IssueUpdate::default().is_empty());
        let update = IssueUpdate {
            summary: Some("new".to_string()),
            ..IssueUpdate::default()
        };
        assert!(!update.is_empty());
    }
}
