use crate::error::{CoreError, CoreResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const ADDRESS_MIN: usize = 10;
pub const ADDRESS_MAX: usize = 200;
pub const REFERENCE_POINT_MAX: usize = 200;
pub const DESCRIPTION_MIN: usize = 20;
pub const DESCRIPTION_MAX: usize = 1000;
pub const REPORTER_NAME_MIN: usize = 3;
pub const REPORTER_NAME_MAX: usize = 100;
pub const MAX_PHOTOS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Sidewalk,
    Staircase,
    Ramp,
    Tree,
    Lighting,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Sidewalk => "sidewalk",
            Category::Staircase => "staircase",
            Category::Ramp => "ramp",
            Category::Tree => "tree",
            Category::Lighting => "lighting",
            Category::Other => "other",
        }
    }

    pub fn parse(value: &str) -> CoreResult<Self> {
        match value {
            "sidewalk" => Ok(Category::Sidewalk),
            "staircase" => Ok(Category::Staircase),
            "ramp" => Ok(Category::Ramp),
            "tree" => Ok(Category::Tree),
            "lighting" => Ok(Category::Lighting),
            "other" => Ok(Category::Other),
            _ => Err(CoreError::validation(
                "category",
                format!("unknown category: {value}"),
            )),
        }
    }
}

/// Lifecycle status. The enumeration models a workflow but the transition
/// relation is the complete graph: an admin may move an occurrence between
/// any two statuses, including backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Received,
    UnderReview,
    InMaintenance,
    Completed,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::Received,
        Status::UnderReview,
        Status::InMaintenance,
        Status::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Received => "received",
            Status::UnderReview => "under_review",
            Status::InMaintenance => "in_maintenance",
            Status::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> CoreResult<Self> {
        match value {
            "received" => Ok(Status::Received),
            "under_review" => Ok(Status::UnderReview),
            "in_maintenance" => Ok(Status::InMaintenance),
            "completed" => Ok(Status::Completed),
            _ => Err(CoreError::validation(
                "status",
                format!("unknown status: {value}"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    pub fn parse(value: &str) -> CoreResult<Self> {
        match value {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(CoreError::validation(
                "priority",
                format!("unknown priority: {value}"),
            )),
        }
    }
}

/// Immutable, timestamped record attached to an occurrence. History is
/// append-only: entries are never edited or reordered after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryEntry {
    StatusChange {
        status: Status,
        timestamp: String, // RFC 3339, UTC
    },
    Comment {
        comment: String,
        timestamp: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Occurrence {
    pub id: String,
    pub reporter_user_id: Option<String>, // null = anonymous report
    pub category: Category,
    pub address: String,
    pub reference_point: Option<String>,
    pub description: String,
    pub photos: Vec<String>, // 0..=2 image references, insertion order
    pub accessibility_affected: bool,
    pub is_public: bool,
    pub status: Status,
    pub priority: Priority,
    pub history: Vec<HistoryEntry>,
    pub created_at: String, // RFC 3339, immutable
}

/// Reporter contact details, stored apart from the occurrence so the PII
/// never rides along with the public record. 1:1 with its occurrence,
/// created in the same transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OccurrenceContact {
    pub occurrence_id: String,
    pub name: String,
    pub phone: String,
}

/// A citizen submission, before any row exists. Contact fields are split
/// off into `occurrence_contacts` at insert time.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NewOccurrence {
    pub reporter_name: String,
    pub reporter_phone: String,
    pub category: Category,
    pub address: String,
    #[serde(default)]
    pub reference_point: Option<String>,
    pub description: String,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub accessibility_affected: bool,
    #[serde(default = "default_is_public")]
    pub is_public: bool,
}

fn default_is_public() -> bool {
    true
}

impl NewOccurrence {
    /// Checks every field bound and reports the first violation, the way the
    /// submission form surfaces a single inline message at a time.
    pub fn validate(&self) -> CoreResult<()> {
        let name = self.reporter_name.trim();
        if name.chars().count() < REPORTER_NAME_MIN {
            return Err(CoreError::validation("reporter_name", "name too short"));
        }
        if name.chars().count() > REPORTER_NAME_MAX {
            return Err(CoreError::validation("reporter_name", "name too long"));
        }

        let phone = self.reporter_phone.trim();
        if phone.len() < 10 || phone.len() > 11 || !phone.chars().all(|c| c.is_ascii_digit()) {
            return Err(CoreError::validation(
                "reporter_phone",
                "phone must be 10-11 digits",
            ));
        }

        let address = self.address.trim();
        if address.chars().count() < ADDRESS_MIN {
            return Err(CoreError::validation("address", "address too short"));
        }
        if address.chars().count() > ADDRESS_MAX {
            return Err(CoreError::validation("address", "address too long"));
        }

        if let Some(reference) = &self.reference_point {
            if reference.chars().count() > REFERENCE_POINT_MAX {
                return Err(CoreError::validation(
                    "reference_point",
                    "reference point too long",
                ));
            }
        }

        let description = self.description.trim();
        if description.chars().count() < DESCRIPTION_MIN {
            return Err(CoreError::validation(
                "description",
                "description too short",
            ));
        }
        if description.chars().count() > DESCRIPTION_MAX {
            return Err(CoreError::validation("description", "description too long"));
        }

        if self.photos.len() > MAX_PHOTOS {
            return Err(CoreError::validation("photos", "at most 2 photos"));
        }

        Ok(())
    }
}
