//! Enumerations stored as snake_case text

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use super::ValidationError;

/// Role tiers. Used both as a user's global role and as a project membership role.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, Serialize, Deserialize, EnumString, Display,
)]
#[sqlx(type_name = "role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    /// Project-management office: portfolio-wide authority
    Pmo,
    /// Project manager
    Pm,
    /// Project / team lead
    Pl,
    Developer,
    Designer,
    Consultant,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    sqlx::Type,
    Serialize,
    Deserialize,
    EnumString,
    Display,
)]
#[sqlx(type_name = "project_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Planning,
    Active,
    OnHold,
    Completed,
    Cancelled,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    sqlx::Type,
    Serialize,
    Deserialize,
    EnumString,
    Display,
)]
#[sqlx(type_name = "phase_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PhaseStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

/// Kanban column a task sits in.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    sqlx::Type,
    Serialize,
    Deserialize,
    EnumString,
    Display,
)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    InReview,
    Done,
    Cancelled,
}

impl TaskStatus {
    /// Board column order.
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Todo,
        TaskStatus::InProgress,
        TaskStatus::InReview,
        TaskStatus::Done,
        TaskStatus::Cancelled,
    ];

    /// Done and cancelled tasks are no longer open work.
    pub fn is_closed(self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Cancelled)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    sqlx::Type,
    Serialize,
    Deserialize,
    EnumString,
    Display,
)]
#[sqlx(type_name = "priority", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Urgent,
    ];
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    sqlx::Type,
    Serialize,
    Deserialize,
    EnumString,
    Display,
)]
#[sqlx(type_name = "decision_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DecisionStatus {
    #[default]
    Proposed,
    Accepted,
    Rejected,
    Superseded,
}

impl DecisionStatus {
    /// Allowed decision-log transitions.
    pub fn can_transition_to(self, next: DecisionStatus) -> bool {
        matches!(
            (self, next),
            (DecisionStatus::Proposed, DecisionStatus::Accepted)
                | (DecisionStatus::Proposed, DecisionStatus::Rejected)
                | (DecisionStatus::Accepted, DecisionStatus::Superseded)
        )
    }
}

/// Parse a human-entered enum value: case-insensitive, spaces and hyphens
/// treated as underscores ("In Progress", "in-progress", "IN_PROGRESS").
pub fn parse_loose<T: FromStr>(field: &'static str, raw: &str) -> Result<T, ValidationError> {
    let normalized: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect();

    T::from_str(&normalized).map_err(|_| ValidationError::InvalidVariant {
        field,
        value: raw.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_storage_format() {
        assert_eq!(TaskStatus::InProgress.to_string(), "in_progress");
        assert_eq!(ProjectStatus::OnHold.to_string(), "on_hold");
        assert_eq!(Role::Pmo.to_string(), "pmo");
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&PhaseStatus::NotStarted).unwrap();
        assert_eq!(json, "\"not_started\"");
        let status: TaskStatus = serde_json::from_str("\"in_review\"").unwrap();
        assert_eq!(status, TaskStatus::InReview);
    }

    #[test]
    fn loose_parsing() {
        let status: TaskStatus = parse_loose("status", "In Progress").unwrap();
        assert_eq!(status, TaskStatus::InProgress);
        let priority: Priority = parse_loose("priority", " URGENT ").unwrap();
        assert_eq!(priority, Priority::Urgent);
        let status: TaskStatus = parse_loose("status", "in-review").unwrap();
        assert_eq!(status, TaskStatus::InReview);
    }

    #[test]
    fn loose_parsing_reports_raw_value() {
        let err = parse_loose::<Priority>("priority", "Critical").unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidVariant {
                field: "priority",
                value: "Critical".into()
            }
        );
    }

    #[test]
    fn decision_transitions() {
        use DecisionStatus::*;
        assert!(Proposed.can_transition_to(Accepted));
        assert!(Proposed.can_transition_to(Rejected));
        assert!(Accepted.can_transition_to(Superseded));
        assert!(!Rejected.can_transition_to(Accepted));
        assert!(!Proposed.can_transition_to(Superseded));
        assert!(!Accepted.can_transition_to(Accepted));
    }

    #[test]
    fn closed_statuses() {
        assert!(TaskStatus::Done.is_closed());
        assert!(TaskStatus::Cancelled.is_closed());
        assert!(!TaskStatus::InReview.is_closed());
    }
}
