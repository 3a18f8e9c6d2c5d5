//! Board (notice/poll) API types.

use crate::error::MoimError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Status returned when the caller lacks permission, often because the
/// credential went stale.
pub const STATUS_NO_PERMISSION: i64 = -4001;

/// Kind of a board post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PostKind {
    #[default]
    Text,
    Schedule,
    Poll,
    Quiz,
    #[serde(other)]
    Unknown,
}

/// A post on a room's board.
#[derive(Debug, Clone, Deserialize)]
pub struct Post {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub object_type: PostKind,
    /// Pinned as the room notice.
    #[serde(default)]
    pub notice: bool,
    /// JSON-encoded list of content segments (text posts).
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub schedule: Option<Schedule>,
    #[serde(default)]
    pub poll: Option<PollState>,
    #[serde(default)]
    pub quiz: Option<QuizState>,
}

impl Post {
    /// Text of the first content segment.
    pub fn text(&self) -> Option<String> {
        let segments: Vec<ContentSegment> = serde_json::from_str(self.content.as_deref()?).ok()?;
        segments.into_iter().next().map(|s| s.text)
    }

    /// Creation time parsed from the backend's RFC 3339 timestamp.
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        let raw = self.created_at.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentSegment {
    #[serde(default)]
    pub text: String,
    #[serde(rename = "type", default = "default_segment_type")]
    pub segment_type: String,
}

fn default_segment_type() -> String {
    "text".into()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Schedule {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub start_at: Option<String>,
    #[serde(default)]
    pub end_at: Option<String>,
    #[serde(default)]
    pub all_day: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PollState {
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub closed_at: Option<String>,
    #[serde(default)]
    pub poll_details: Vec<ChoiceDetail>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuizState {
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub time_limit: u64,
    #[serde(default)]
    pub quiz_details: Vec<ChoiceDetail>,
}

/// Question and tallied choices of a poll or quiz.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChoiceDetail {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub items: Vec<ChoiceItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChoiceItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub user_count: u64,
}

/// Posts listing; the backend answers with either a bare array or an
/// object wrapping it.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum PostsResponse {
    List(Vec<Post>),
    Wrapped {
        #[serde(default)]
        posts: Vec<Post>,
    },
}

impl PostsResponse {
    pub(crate) fn into_posts(self) -> Vec<Post> {
        match self {
            PostsResponse::List(posts) | PostsResponse::Wrapped { posts } => posts,
        }
    }
}

/// A poll to create on an open chat's board.
#[derive(Debug, Clone)]
pub struct PollSpec {
    pub subject: String,
    pub items: Vec<String>,
    pub multi_select: bool,
    pub secret: bool,
    pub duration: Duration,
}

impl PollSpec {
    pub const MIN_ITEMS: usize = 2;
    pub const MAX_ITEMS: usize = 10;
    pub const DEFAULT_DURATION: Duration = Duration::from_secs(48 * 60 * 60);

    /// Validate and build a poll. Items are trimmed and blanks dropped.
    pub fn new<I, S>(subject: impl Into<String>, items: I) -> Result<Self, MoimError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let subject = subject.into().trim().to_string();
        if subject.is_empty() {
            return Err(MoimError::InvalidPoll("subject is empty".into()));
        }

        let items: Vec<String> = items
            .into_iter()
            .map(|item| item.as_ref().trim().to_string())
            .filter(|item| !item.is_empty())
            .collect();

        if items.len() < Self::MIN_ITEMS {
            return Err(MoimError::InvalidPoll(format!(
                "at least {} items required",
                Self::MIN_ITEMS
            )));
        }
        if items.len() > Self::MAX_ITEMS {
            return Err(MoimError::InvalidPoll(format!(
                "at most {} items allowed",
                Self::MAX_ITEMS
            )));
        }

        Ok(Self {
            subject,
            items,
            multi_select: false,
            secret: false,
            duration: Self::DEFAULT_DURATION,
        })
    }

    pub fn multi_select(mut self, multi_select: bool) -> Self {
        self.multi_select = multi_select;
        self
    }

    pub fn secret(mut self, secret: bool) -> Self {
        self.secret = secret;
        self
    }

    pub fn closes_in(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Closing time in the backend's minute-resolution UTC format.
    pub fn closed_at(&self, now: DateTime<Utc>) -> Result<String, MoimError> {
        let duration = chrono::Duration::from_std(self.duration)
            .map_err(|_| MoimError::InvalidPoll("duration out of range".into()))?;
        let closes = now
            .checked_add_signed(duration)
            .ok_or_else(|| MoimError::InvalidPoll("duration out of range".into()))?;
        Ok(closes.format("%Y-%m-%dT%H:%M:00.000Z").to_string())
    }

    pub(crate) fn to_content(&self, now: DateTime<Utc>) -> Result<String, MoimError> {
        let content = PollContent {
            closed_at: self.closed_at(now)?,
            alarm: 30,
            poll_details: [PollDetailRequest {
                subject: &self.subject,
                item_type: "text",
                item_addable: false,
                multi_select: self.multi_select,
                secret: self.secret,
                items: self
                    .items
                    .iter()
                    .map(|title| PollItemRequest { title })
                    .collect(),
            }],
        };
        Ok(serde_json::to_string(&content)?)
    }
}

#[derive(Serialize)]
struct PollContent<'a> {
    closed_at: String,
    alarm: u32,
    poll_details: [PollDetailRequest<'a>; 1],
}

#[derive(Serialize)]
struct PollDetailRequest<'a> {
    subject: &'a str,
    item_type: &'static str,
    item_addable: bool,
    multi_select: bool,
    secret: bool,
    items: Vec<PollItemRequest<'a>>,
}

#[derive(Serialize)]
struct PollItemRequest<'a> {
    title: &'a str,
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

fn opt_string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}
