//! Wire format of the polling heartbeat.
//!
//! Each poll carries one flat JSON object shared by every guarded resource on
//! the page. Fields are prefixed with the resource key:
//!
//! - client -> server: `{key}_check`, `{key}_is_editing`
//! - server -> client: `{key}_status` (`locked` | `owned` | `free`),
//!   plus `{key}_owner` and `{key}_content` when locked

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::lock::LockVerdict;
use crate::resource::ResourceKey;

pub type Fields = Map<String, Value>;

const CHECK_SUFFIX: &str = "_check";
const IS_EDITING_SUFFIX: &str = "_is_editing";
const STATUS_SUFFIX: &str = "_status";
const OWNER_SUFFIX: &str = "_owner";
const CONTENT_SUFFIX: &str = "_content";

fn field(key: &ResourceKey, suffix: &str) -> String {
    format!("{}{}", key.as_str(), suffix)
}

/// Heartbeat values arrive as JSON booleans from well-behaved clients, but
/// form-encoded transports stringify them.
fn truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
        Some(Value::String(s)) => matches!(s.as_str(), "true" | "1"),
        _ => false,
    }
}

/// One resource's share of an outgoing poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollEntry {
    pub key: ResourceKey,
    pub is_editing: bool,
}

impl PollEntry {
    /// Attach this entry to an outgoing heartbeat.
    pub fn write(&self, fields: &mut Fields) {
        fields.insert(field(&self.key, CHECK_SUFFIX), Value::Bool(true));
        fields.insert(
            field(&self.key, IS_EDITING_SUFFIX),
            Value::Bool(self.is_editing),
        );
    }
}

/// Extract the entries for `resources` that the client asked to check.
///
/// Resources without a truthy `{key}_check` are skipped; fields for keys not in
/// `resources` are ignored.
pub fn read_request<'a>(
    fields: &Fields,
    resources: impl IntoIterator<Item = &'a ResourceKey>,
) -> Vec<PollEntry> {
    resources
        .into_iter()
        .filter(|key| truthy(fields.get(&field(key, CHECK_SUFFIX))))
        .map(|key| PollEntry {
            key: key.clone(),
            is_editing: truthy(fields.get(&field(key, IS_EDITING_SUFFIX))),
        })
        .collect()
}

/// Wire form of a lock verdict, as seen by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockStatus {
    Locked { owner: String, content: String },
    Owned,
    Free,
}

impl LockStatus {
    fn as_str(&self) -> &'static str {
        match self {
            LockStatus::Locked { .. } => "locked",
            LockStatus::Owned => "owned",
            LockStatus::Free => "free",
        }
    }
}

impl From<&LockVerdict> for LockStatus {
    fn from(verdict: &LockVerdict) -> Self {
        match verdict {
            LockVerdict::Locked {
                owner_name,
                content,
                ..
            } => LockStatus::Locked {
                owner: owner_name.clone(),
                content: content.clone(),
            },
            LockVerdict::Owned => LockStatus::Owned,
            LockVerdict::Free => LockStatus::Free,
        }
    }
}

/// Attach a verdict to an outgoing heartbeat reply.
pub fn write_status(fields: &mut Fields, key: &ResourceKey, status: &LockStatus) {
    fields.insert(
        field(key, STATUS_SUFFIX),
        Value::String(status.as_str().to_string()),
    );
    if let LockStatus::Locked { owner, content } = status {
        fields.insert(field(key, OWNER_SUFFIX), Value::String(owner.clone()));
        fields.insert(field(key, CONTENT_SUFFIX), Value::String(content.clone()));
    }
}

/// Read the verdict for `key` from a heartbeat reply.
///
/// Returns `None` when the reply has no (or an unrecognized) status for the key.
pub fn read_status(fields: &Fields, key: &ResourceKey) -> Option<LockStatus> {
    let status = fields.get(&field(key, STATUS_SUFFIX))?.as_str()?;
    let text = |suffix: &str| {
        fields
            .get(&field(key, suffix))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    match status {
        "locked" => Some(LockStatus::Locked {
            owner: text(OWNER_SUFFIX),
            content: text(CONTENT_SUFFIX),
        }),
        "owned" => Some(LockStatus::Owned),
        "free" => Some(LockStatus::Free),
        _ => None,
    }
}

/// Body of a save request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveRequest {
    pub nonce: String,
    pub content: String,
}

/// Body of a save response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Body of a nonce response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonceResponse {
    pub nonce: String,
}

/// Body of a document read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceResponse {
    pub key: ResourceKey,
    pub content: String,
    #[serde(default)]
    pub modified_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub modified_by: Option<String>,
}
