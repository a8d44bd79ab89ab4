use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub id: i64,
    pub url: String,
    pub title: Option<String>,
    pub tags: Option<String>,
    pub added_by_id: i64,
    pub added_by_name: String,
    pub added_at: DateTime<Utc>,
}

impl Link {
    /// Title if one was given, otherwise the url itself.
    pub fn label(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.url)
    }
}

#[derive(Debug, Clone)]
pub struct NewLink {
    pub url: String,
    pub title: Option<String>,
    pub tags: Option<String>,
    pub added_by_id: i64,
    pub added_by_name: String,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    #[default]
    Member,
    /// May remove links added by anyone.
    Moderator,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Caller {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub capability: Capability,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "name", rename_all = "camelCase")]
pub enum Command {
    Save {
        url: String,
        title: Option<String>,
        tags: Option<String>,
    },
    List {
        tag: Option<String>,
    },
    Get {
        id: i64,
    },
    Remove {
        id: i64,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Save { .. } => "save",
            Command::List { .. } => "list",
            Command::Get { .. } => "get",
            Command::Remove { .. } => "remove",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invocation {
    pub caller: Caller,
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    /// Visible only to the invoking member when set.
    pub ephemeral: bool,
    #[serde(flatten)]
    pub body: ReplyBody,
}

impl Reply {
    pub fn public(body: ReplyBody) -> Self {
        Self {
            ephemeral: false,
            body,
        }
    }

    pub fn ephemeral(body: ReplyBody) -> Self {
        Self {
            ephemeral: true,
            body,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ReplyBody {
    #[serde(rename_all = "camelCase")]
    Saved {
        id: i64,
        label: String,
        url: String,
        tags: Option<String>,
        added_by_name: String,
    },
    Listing {
        entries: Vec<ListingEntry>,
        shown: usize,
        total: usize,
        summary: String,
    },
    #[serde(rename_all = "camelCase")]
    Detail {
        id: i64,
        label: String,
        url: String,
        tags: String,
        added_by_name: String,
        added_at: DateTime<Utc>,
        hint: String,
    },
    Removed {
        id: i64,
        label: String,
        message: String,
    },
    Notice {
        reason: NoticeReason,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingEntry {
    pub id: i64,
    pub label: String,
    pub url: String,
    pub tags: Option<String>,
    pub added_by_name: String,
}

impl From<&Link> for ListingEntry {
    fn from(link: &Link) -> Self {
        Self {
            id: link.id,
            label: link.label().to_string(),
            url: link.url.clone(),
            tags: link.tags.clone(),
            added_by_name: link.added_by_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NoticeReason {
    InvalidUrl,
    NoResults,
    NotFound,
    PermissionDenied,
    Failure,
}
