use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user's career profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    #[serde(default)]
    pub education: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub experiences: Vec<String>,
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub profile_complete: bool,
}

/// Profile fields the client may create or replace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfileUpsert {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub education: Option<String>,
    pub skills: Vec<String>,
    pub experiences: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
}

/// A scheduled activity on the user's calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub event_id: String,
    #[serde(default)]
    pub activity_id: Option<String>,
    #[serde(default)]
    pub activity_title: Option<String>,
    pub start_at: DateTime<Utc>,
    #[serde(default)]
    pub end_at: Option<DateTime<Utc>>,
}

impl CalendarEvent {
    /// The event title, falling back when the backend omits one.
    pub fn title(&self) -> &str {
        self.activity_title.as_deref().unwrap_or("Untitled")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEventUpsert {
    pub activity_id: String,
    pub start_at: DateTime<Utc>,
}

/// A recommendable career activity (contest, internship, course, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub activity_id: String,
    pub title: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub url: Option<String>,
}

/// One page of the activity listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityPage {
    #[serde(default)]
    pub items: Vec<Activity>,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub total: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendRequest {
    /// Absent for anonymous (pre-login) queries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub query: String,
    /// Whether the backend should weigh the stored profile into the
    /// recommendation. Only meaningful when signed in.
    pub use_profile_hints: bool,
}

impl RecommendRequest {
    pub fn new<S: Into<String>>(query: S) -> Self {
        Self {
            user_id: None,
            query: query.into(),
            use_profile_hints: false,
        }
    }

    pub fn for_user<S: Into<String>>(mut self, user_id: S) -> Self {
        self.user_id = Some(user_id.into());
        self.use_profile_hints = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedItem {
    pub activity: Activity,
    pub reason: String,
    #[serde(default)]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendResponse {
    #[serde(default)]
    pub items: Vec<RecommendedItem>,
}

impl RecommendResponse {
    /// Render the recommendations as a readable block: each activity
    /// title followed by the backend's reasoning.
    pub fn summary(&self) -> String {
        self.items
            .iter()
            .map(|item| format!("{}\n{}", item.activity.title, item.reason))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
