//! Iris gateway API types.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response from `GET /aot`.
#[derive(Clone, Deserialize)]
pub struct AotResponse {
    #[serde(default)]
    pub success: bool,
    pub aot: Option<AotPayload>,
}

#[derive(Clone, Deserialize)]
pub struct AotPayload {
    pub access_token: Option<String>,
    pub d_id: Option<String>,
}

/// Access token and device id issued by the gateway.
#[derive(Debug, Clone)]
pub struct Aot {
    pub access_token: SecretString,
    pub device_id: String,
}

/// Parameterized statement for `POST /query`.
#[derive(Debug, Clone, Serialize)]
pub struct QueryRequest<'a> {
    pub query: &'a str,
    pub bind: &'a [String],
}

/// Response from `POST /query`.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResponse {
    pub data: Option<Vec<Row>>,
}

/// A single result row keyed by column name.
pub type Row = serde_json::Map<String, Value>;

/// A member of a chat room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomMember {
    pub id: i64,
    pub name: String,
}

/// Column access that tolerates the store returning ids as numbers or strings.
pub trait RowExt {
    /// Column value as text. Null, empty strings and non-scalars yield `None`.
    fn text(&self, column: &str) -> Option<String>;
}

impl RowExt for Row {
    fn text(&self, column: &str) -> Option<String> {
        self.get(column).and_then(scalar_to_string)
    }
}

pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
