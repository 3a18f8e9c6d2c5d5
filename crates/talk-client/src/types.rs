//! Dispatch request and result types.

use crate::error::DispatchError;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;

/// Scope value the messaging backend uses for thread replies.
pub const THREAD_SCOPE: i32 = 3;

/// Failure categories surfaced through `DispatchResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The sidecar was unreachable or returned no usable credential.
    AuthUnavailable,
    /// Timeout or connection error talking to a backend.
    NetworkFailure,
    /// A backend answered but refused the request.
    BackendRejected,
    /// Rejected locally before any network call.
    InvalidInput,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::AuthUnavailable => "auth_unavailable",
            FailureKind::NetworkFailure => "network_failure",
            FailureKind::BackendRejected => "backend_rejected",
            FailureKind::InvalidInput => "invalid_input",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a send. Sends never return `Err`; failures are folded into
/// this value.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchResult {
    pub result: bool,
    /// HTTP status on transport-level rejection, or the backend's embedded
    /// status code.
    pub status: Option<i64>,
    pub failure: Option<FailureKind>,
    /// Parsed response body, `Null` when there was none.
    pub body: Value,
}

impl DispatchResult {
    /// Interpret a successful HTTP response body. An embedded
    /// `result: false` or negative `status` counts as a rejection.
    pub fn from_body(body: Value) -> Self {
        let status = body.get("status").and_then(Value::as_i64);
        let refused = body.get("result").and_then(Value::as_bool) == Some(false)
            || status.is_some_and(|s| s < 0);

        if refused {
            Self::rejected(status, body)
        } else {
            Self {
                result: true,
                status,
                failure: None,
                body,
            }
        }
    }

    pub fn rejected(status: Option<i64>, body: Value) -> Self {
        Self {
            result: false,
            status,
            failure: Some(FailureKind::BackendRejected),
            body,
        }
    }

    pub fn failed(error: &DispatchError) -> Self {
        Self {
            result: false,
            status: error.status(),
            failure: Some(error.kind()),
            body: Value::Null,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result
    }

    /// Wire form: the backend body on success, `{"result": false,
    /// "status": ..}` otherwise.
    pub fn to_json(&self) -> Value {
        if self.result {
            self.body.clone()
        } else {
            json!({ "result": false, "status": self.status })
        }
    }
}

/// A message to send to a room.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub room_id: String,
    pub text: String,
    pub attachment: Option<Value>,
    pub message_type: i32,
    /// Thread to reply into; `None`, empty or `"0"` posts to the room.
    pub thread_id: Option<String>,
}

impl OutboundMessage {
    pub const TYPE_TEXT: i32 = 1;
    pub const TYPE_EMOTICON: i32 = 12;

    pub fn new(room_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            text: text.into(),
            attachment: None,
            message_type: Self::TYPE_TEXT,
            thread_id: None,
        }
    }

    pub fn with_attachment(mut self, attachment: Value) -> Self {
        self.attachment = Some(attachment);
        self
    }

    pub fn with_type(mut self, message_type: i32) -> Self {
        self.message_type = message_type;
        self
    }

    pub fn in_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    /// Check the message and resolve its numeric thread id.
    pub(crate) fn validate(&self) -> Result<Option<i64>, DispatchError> {
        if self.room_id.trim().is_empty() {
            return Err(DispatchError::invalid("room id is empty"));
        }
        parse_thread_id(self.thread_id.as_deref())
    }
}

fn parse_thread_id(thread_id: Option<&str>) -> Result<Option<i64>, DispatchError> {
    let Some(raw) = thread_id.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };
    let id: i64 = raw
        .parse()
        .map_err(|_| DispatchError::invalid(format!("thread id '{}' is not numeric", raw)))?;
    Ok((id != 0).then_some(id))
}

/// Body of `POST /talk/write`.
#[derive(Debug, Serialize)]
pub(crate) struct WritePayload<'a> {
    #[serde(rename = "chatId")]
    chat_id: &'a str,
    #[serde(rename = "type")]
    message_type: i32,
    message: &'a str,
    /// JSON-encoded attachment object.
    attachment: String,
    #[serde(rename = "msgId")]
    msg_id: i64,
    #[serde(rename = "threadId", skip_serializing_if = "Option::is_none")]
    thread_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<i32>,
    /// JSON-encoded `{"scope":3,"threadId":..}` mirror of the thread fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    supplement: Option<String>,
}

#[derive(Serialize)]
struct Supplement {
    scope: i32,
    #[serde(rename = "threadId")]
    thread_id: i64,
}

impl<'a> WritePayload<'a> {
    pub(crate) fn new(
        message: &'a OutboundMessage,
        thread_id: Option<i64>,
        msg_id: i64,
    ) -> Result<Self, DispatchError> {
        let attachment = match &message.attachment {
            Some(value) => serde_json::to_string(value)?,
            None => "{}".to_string(),
        };
        let supplement = thread_id
            .map(|thread_id| {
                serde_json::to_string(&Supplement {
                    scope: THREAD_SCOPE,
                    thread_id,
                })
            })
            .transpose()?;

        Ok(Self {
            chat_id: &message.room_id,
            message_type: message.message_type,
            message: &message.text,
            attachment,
            msg_id,
            thread_id,
            scope: thread_id.map(|_| THREAD_SCOPE),
            supplement,
        })
    }
}

/// Reaction kinds accepted by the reaction backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReactionType {
    Cancel = 0,
    Heart = 1,
    Like = 2,
    Check = 3,
    Laugh = 4,
    Surprise = 5,
    Sad = 6,
}

impl ReactionType {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<i64> for ReactionType {
    type Error = DispatchError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => ReactionType::Cancel,
            1 => ReactionType::Heart,
            2 => ReactionType::Like,
            3 => ReactionType::Check,
            4 => ReactionType::Laugh,
            5 => ReactionType::Surprise,
            6 => ReactionType::Sad,
            other => {
                return Err(DispatchError::invalid(format!(
                    "reaction type {} is outside 0..=6",
                    other
                )))
            }
        })
    }
}

impl From<ReactionType> for i64 {
    fn from(reaction: ReactionType) -> Self {
        i64::from(reaction.code())
    }
}

/// A reaction on a logged message. `reaction_type` is checked at send time.
#[derive(Debug, Clone)]
pub struct ReactionRequest {
    pub room_id: String,
    pub log_id: String,
    pub reaction_type: i64,
    pub link_id: Option<String>,
}

impl ReactionRequest {
    pub fn new(
        room_id: impl Into<String>,
        log_id: impl Into<String>,
        reaction_type: impl Into<i64>,
    ) -> Self {
        Self {
            room_id: room_id.into(),
            log_id: log_id.into(),
            reaction_type: reaction_type.into(),
            link_id: None,
        }
    }

    pub fn with_link_id(mut self, link_id: Option<String>) -> Self {
        self.link_id = link_id;
        self
    }

    pub(crate) fn to_payload(&self, request_id: i64) -> Result<ReactionPayload, DispatchError> {
        let reaction = ReactionType::try_from(self.reaction_type)?;
        if self.room_id.trim().is_empty() {
            return Err(DispatchError::invalid("room id is empty"));
        }
        let log_id = parse_numeric("log id", &self.log_id)?;
        let link_id = self
            .link_id
            .as_deref()
            .filter(|l| !l.is_empty())
            .map(|l| parse_numeric("link id", l))
            .transpose()?;

        Ok(ReactionPayload {
            log_id,
            request_id,
            reaction_type: reaction.code(),
            link_id,
        })
    }
}

fn parse_numeric(field: &str, value: &str) -> Result<i64, DispatchError> {
    value
        .trim()
        .parse()
        .map_err(|_| DispatchError::invalid(format!("{} '{}' is not numeric", field, value)))
}

/// Body of the reaction endpoint; every field is numeric.
#[derive(Debug, Serialize)]
pub(crate) struct ReactionPayload {
    #[serde(rename = "logId")]
    log_id: i64,
    #[serde(rename = "reqId")]
    request_id: i64,
    #[serde(rename = "type")]
    reaction_type: u8,
    #[serde(rename = "linkId", skip_serializing_if = "Option::is_none")]
    link_id: Option<i64>,
}

/// A mention of one user, rendered as `@name text` or `[ @name ] text`.
#[derive(Debug, Clone)]
pub struct Mention {
    pub user_id: i64,
    pub name: String,
    pub text: String,
    pub bracketed: bool,
}

impl Mention {
    pub fn new(user_id: i64, name: impl Into<String>) -> Self {
        Self {
            user_id,
            name: name.into(),
            text: String::new(),
            bracketed: false,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn bracketed(mut self) -> Self {
        self.bracketed = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload_json(message: &OutboundMessage) -> Value {
        let thread_id = message.validate().unwrap();
        let payload = WritePayload::new(message, thread_id, 42).unwrap();
        serde_json::to_value(payload).unwrap()
    }

    #[test]
    fn test_write_payload_defaults() {
        let body = payload_json(&OutboundMessage::new("555", "hello"));

        assert_eq!(
            body,
            json!({
                "chatId": "555",
                "type": 1,
                "message": "hello",
                "attachment": "{}",
                "msgId": 42
            })
        );
    }

    #[test]
    fn test_write_payload_thread_fields() {
        let body = payload_json(&OutboundMessage::new("555", "hi").in_thread("123"));

        assert_eq!(body["threadId"], 123);
        assert_eq!(body["scope"], 3);
        let supplement: Value =
            serde_json::from_str(body["supplement"].as_str().unwrap()).unwrap();
        assert_eq!(supplement, json!({ "scope": 3, "threadId": 123 }));
    }

    #[test]
    fn test_write_payload_zero_thread() {
        for thread in ["0", "", " "] {
            let body = payload_json(&OutboundMessage::new("555", "hi").in_thread(thread));
            let fields = body.as_object().unwrap();
            assert!(!fields.contains_key("threadId"));
            assert!(!fields.contains_key("scope"));
            assert!(!fields.contains_key("supplement"));
        }
    }

    #[test]
    fn test_message_validation() {
        assert!(matches!(
            OutboundMessage::new("", "hi").validate(),
            Err(DispatchError::InvalidInput(_))
        ));
        assert!(matches!(
            OutboundMessage::new("555", "hi").in_thread("abc").validate(),
            Err(DispatchError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_attachment_is_encoded_string() {
        let message = OutboundMessage::new("555", "hi").with_attachment(json!({ "k": "값" }));
        let body = payload_json(&message);
        assert_eq!(body["attachment"], "{\"k\":\"값\"}");
    }

    #[test]
    fn test_reaction_type_range() {
        assert_eq!(ReactionType::try_from(0).unwrap(), ReactionType::Cancel);
        assert_eq!(ReactionType::try_from(6).unwrap(), ReactionType::Sad);
        assert!(ReactionType::try_from(7).is_err());
        assert!(ReactionType::try_from(-1).is_err());
        assert_eq!(i64::from(ReactionType::Laugh), 4);
    }

    #[test]
    fn test_reaction_payload() {
        let request = ReactionRequest::new("555", "777", ReactionType::Heart)
            .with_link_id(Some("900".into()));
        let body = serde_json::to_value(request.to_payload(1_700_000_000_000).unwrap()).unwrap();

        assert_eq!(
            body,
            json!({ "logId": 777, "reqId": 1_700_000_000_000i64, "type": 1, "linkId": 900 })
        );
    }

    #[test]
    fn test_reaction_payload_rejects_bad_ids() {
        let request = ReactionRequest::new("555", "not-a-log", 1);
        assert!(matches!(
            request.to_payload(0),
            Err(DispatchError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_result_from_body() {
        let ok = DispatchResult::from_body(json!({ "status": 0, "chatLog": {} }));
        assert!(ok.is_success());
        assert_eq!(ok.status, Some(0));

        let refused = DispatchResult::from_body(json!({ "status": -805 }));
        assert!(!refused.is_success());
        assert_eq!(refused.failure, Some(FailureKind::BackendRejected));
        assert_eq!(refused.to_json(), json!({ "result": false, "status": -805 }));

        let result_false = DispatchResult::from_body(json!({ "result": false }));
        assert_eq!(result_false.failure, Some(FailureKind::BackendRejected));
    }

    #[test]
    fn test_failed_result_wire_form() {
        let error = DispatchError::Api {
            status: 502,
            message: "bad gateway".into(),
        };
        let result = DispatchResult::failed(&error);

        assert_eq!(result.failure, Some(FailureKind::BackendRejected));
        assert_eq!(result.to_json(), json!({ "result": false, "status": 502 }));
    }
}
