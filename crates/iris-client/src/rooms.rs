//! Room and member lookups over the gateway query interface.

use crate::client::IrisClient;
use crate::error::IrisError;
use crate::types::{scalar_to_string, RoomMember, RowExt};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, instrument};

const LINK_ID_QUERY: &str = "SELECT id, link_id, type FROM chat_rooms WHERE id = ?";
const ACTIVE_MEMBERS_QUERY: &str = "SELECT active_member_ids FROM chat_rooms WHERE id = ?";
const MOIM_META_QUERY: &str = "SELECT moim_meta FROM chat_rooms WHERE id = ?";
const MEMBER_QUERY: &str =
    "SELECT user_id, nickname, link_member_type FROM open_chat_member WHERE user_id = ?";
const ALL_MEMBERS_QUERY: &str = "SELECT user_id, nickname FROM open_chat_member";

/// `link_member_type` of an open chat's host.
const HOST_MEMBER_TYPE: &str = "1";

impl IrisClient {
    /// Resolve the open-chat link id of a room.
    ///
    /// `Ok(None)` means the room exists but is not an open chat.
    #[instrument(skip(self))]
    pub async fn link_id(&self, room_id: &str) -> Result<Option<String>, IrisError> {
        let rows = self.query(LINK_ID_QUERY, &[room_id.to_string()]).await?;
        let row = rows
            .first()
            .ok_or_else(|| IrisError::RoomNotFound(room_id.to_string()))?;

        let link_id = row.text("link_id").filter(|id| id != "0");
        match &link_id {
            Some(id) => debug!("Room {} has link id {}", room_id, id),
            None => debug!("Room {} is not an open chat", room_id),
        }
        Ok(link_id)
    }

    /// Find the host of an open chat room.
    #[instrument(skip(self))]
    pub async fn room_host(&self, room_id: &str) -> Result<Option<RoomMember>, IrisError> {
        let rows = self
            .query(ACTIVE_MEMBERS_QUERY, &[room_id.to_string()])
            .await?;
        let Some(raw) = rows.first().and_then(|row| row.get("active_member_ids")) else {
            return Ok(None);
        };

        for member_id in parse_member_ids(raw) {
            let rows = self.query(MEMBER_QUERY, &[member_id]).await?;
            let Some(row) = rows.first() else {
                continue;
            };

            if row.text("link_member_type").as_deref() != Some(HOST_MEMBER_TYPE) {
                continue;
            }

            if let Some(id) = row.text("user_id").and_then(|id| id.parse().ok()) {
                return Ok(Some(RoomMember {
                    id,
                    name: row.text("nickname").unwrap_or_default(),
                }));
            }
        }

        Ok(None)
    }

    /// Look up a member's open-chat nickname.
    #[instrument(skip(self))]
    pub async fn member_nickname(&self, user_id: &str) -> Result<Option<String>, IrisError> {
        let rows = self.query(MEMBER_QUERY, &[user_id.to_string()]).await?;
        Ok(rows.first().and_then(|row| row.text("nickname")))
    }

    /// Map of user id to nickname over every known open-chat member.
    pub async fn member_nicknames(&self) -> Result<HashMap<String, String>, IrisError> {
        let rows = self.query(ALL_MEMBERS_QUERY, &[]).await?;
        Ok(rows
            .iter()
            .filter_map(|row| Some((row.text("user_id")?, row.text("nickname")?)))
            .collect())
    }

    /// Post id of the notice currently pinned in a room.
    #[instrument(skip(self))]
    pub async fn current_post_id(&self, room_id: &str) -> Result<Option<String>, IrisError> {
        let rows = self.query(MOIM_META_QUERY, &[room_id.to_string()]).await?;
        let Some(raw) = rows.first().and_then(|row| row.text("moim_meta")) else {
            return Ok(None);
        };

        let meta: Value = serde_json::from_str(&raw)?;
        let Some(ct) = meta
            .as_array()
            .and_then(|entries| entries.first())
            .and_then(|entry| entry.get("ct"))
            .and_then(Value::as_str)
        else {
            return Ok(None);
        };

        let content: Value = serde_json::from_str(ct)?;
        Ok(content.get("id").and_then(scalar_to_string))
    }
}

/// `active_member_ids` is stored as a JSON array, a bare id, or a comma list.
fn parse_member_ids(raw: &Value) -> Vec<String> {
    match raw {
        Value::Array(items) => items.iter().filter_map(scalar_to_string).collect(),
        Value::Number(_) => scalar_to_string(raw).into_iter().collect(),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(parsed @ (Value::Array(_) | Value::Number(_))) => parse_member_ids(&parsed),
            _ => s
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(String::from)
                .collect(),
        },
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_member_ids_json_array() {
        let ids = parse_member_ids(&json!("[1001, 1002]"));
        assert_eq!(ids, vec!["1001", "1002"]);
    }

    #[test]
    fn test_parse_member_ids_native_array() {
        let ids = parse_member_ids(&json!([1001, "1002"]));
        assert_eq!(ids, vec!["1001", "1002"]);
    }

    #[test]
    fn test_parse_member_ids_scalar() {
        assert_eq!(parse_member_ids(&json!("1001")), vec!["1001"]);
        assert_eq!(parse_member_ids(&json!(1001)), vec!["1001"]);
    }

    #[test]
    fn test_parse_member_ids_comma_list() {
        let ids = parse_member_ids(&json!("a1, b2,,c3 "));
        assert_eq!(ids, vec!["a1", "b2", "c3"]);
    }

    #[test]
    fn test_parse_member_ids_null() {
        assert!(parse_member_ids(&Value::Null).is_empty());
    }
}
