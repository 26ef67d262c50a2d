//! Citizen applications against admin-defined forms.

use bson::{DateTime, Document};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Draft,
    Submitted,
    InReview,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "draft",
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::InReview => "in_review",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    /// Review transitions available to admins. Drafts only leave draft state
    /// through the owner's submit.
    pub fn can_transition_to(&self, next: ApplicationStatus) -> bool {
        use ApplicationStatus::*;
        matches!(
            (self, next),
            (Submitted, InReview)
                | (Submitted, Approved)
                | (Submitted, Rejected)
                | (InReview, Approved)
                | (InReview, Rejected)
        )
    }
}

impl FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ApplicationStatus::Draft),
            "submitted" => Ok(ApplicationStatus::Submitted),
            "in_review" => Ok(ApplicationStatus::InReview),
            "approved" => Ok(ApplicationStatus::Approved),
            "rejected" => Ok(ApplicationStatus::Rejected),
            other => Err(format!("unknown application status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub service_id: String,
    /// Snapshot of the form's display name at creation time.
    pub service_name: String,
    pub user_id: Uuid,
    /// Free-form answers keyed by field name; validated against the form's
    /// required fields on submit, not while drafting.
    pub data: Document,
    pub status: ApplicationStatus,
    pub remarks: Option<String>,
    pub submitted_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Application {
    pub fn new_draft(service_id: String, service_name: String, user_id: Uuid, data: Document) -> Self {
        let now = DateTime::now();
        Self {
            id: Uuid::new_v4(),
            service_id,
            service_name,
            user_id,
            data,
            status: ApplicationStatus::Draft,
            remarks: None,
            submitted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_draft(&self) -> bool {
        self.status == ApplicationStatus::Draft
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn review_transitions_are_restricted() {
        use ApplicationStatus::*;
        assert!(Submitted.can_transition_to(InReview));
        assert!(Submitted.can_transition_to(Approved));
        assert!(InReview.can_transition_to(Rejected));

        assert!(!Draft.can_transition_to(Approved));
        assert!(!Approved.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(InReview));
    }

    #[test]
    fn new_application_starts_as_draft() {
        let app = Application::new_draft(
            "tricycle_franchise".to_string(),
            "Tricycle Franchise".to_string(),
            Uuid::new_v4(),
            doc! { "full_name": "Juan dela Cruz" },
        );
        assert!(app.is_draft());
        assert!(app.submitted_at.is_none());
    }
}
