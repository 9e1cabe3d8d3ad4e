//! Wire types exchanged with the shim over stdin/stdout.
//!
//! Field names follow the runtime's JSON contract, not Rust naming.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// `msgtime` of a request whose time was never set (0001-01-01T00:00:00Z).
pub const UNSET_MSGTIME: i64 = -62_135_596_800;

/// Request published to the shim for a plain action invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub agent: String,
    pub action: String,
    #[serde(rename = "requestid")]
    pub request_id: String,
    #[serde(rename = "senderid")]
    pub sender_id: String,
    #[serde(rename = "callerid")]
    pub caller_id: String,
    pub collective: String,
    pub ttl: i64,
    #[serde(rename = "msgtime")]
    pub time: i64,
    pub body: RequestBody,
}

/// Body handed to the agent handler.
///
/// `agent` and `action` mirror the envelope so the handler can validate them
/// itself; nothing here enforces that they match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestBody {
    pub agent: String,
    pub action: String,
    /// Opaque action input, passed through without being decoded.
    pub data: Option<Box<RawValue>>,
    pub caller: String,
}

impl Request {
    pub fn new(agent: impl Into<String>, action: impl Into<String>) -> Self {
        let agent = agent.into();
        let action = action.into();
        Self {
            body: RequestBody {
                agent: agent.clone(),
                action: action.clone(),
                data: None,
                caller: String::new(),
            },
            agent,
            action,
            request_id: String::new(),
            sender_id: String::new(),
            caller_id: String::new(),
            collective: String::new(),
            ttl: 0,
            time: UNSET_MSGTIME,
        }
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = id.into();
        self
    }

    pub fn with_sender_id(mut self, id: impl Into<String>) -> Self {
        self.sender_id = id.into();
        self
    }

    pub fn with_caller_id(mut self, id: impl Into<String>) -> Self {
        self.caller_id = id.into();
        self
    }

    pub fn with_collective(mut self, collective: impl Into<String>) -> Self {
        self.collective = collective.into();
        self
    }

    pub fn with_ttl(mut self, ttl: i64) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = time.timestamp();
        self
    }

    pub fn with_caller(mut self, caller: impl Into<String>) -> Self {
        self.body.caller = caller.into();
        self
    }

    pub fn with_data(mut self, data: Box<RawValue>) -> Self {
        self.body.data = Some(data);
        self
    }

    /// Request time, or `None` when it carries the unset sentinel.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        if self.time == UNSET_MSGTIME {
            return None;
        }
        DateTime::from_timestamp(self.time, 0)
    }
}

/// Generator for request identifiers in the runtime's 32 hex character form.
pub struct RequestId;

impl RequestId {
    pub fn generate() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }
}

/// Conventional reply shape of a plain action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionReply {
    #[serde(default)]
    pub statuscode: i64,
    #[serde(default)]
    pub statusmsg: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Reply when validating a compound filter call stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ValidateReply {
    pub matched: bool,
}

/// Parsed compound filter as produced by the runtime.
///
/// Opaque: it is handed back to the runtime for validation unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallStack(String);

impl CallStack {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<String> for CallStack {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for CallStack {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

impl std::fmt::Display for CallStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_request() -> Request {
        Request::new("one", "status")
    }

    #[test]
    fn new_request_mirrors_agent_and_action() {
        let req = status_request();
        assert_eq!(req.body.agent, "one");
        assert_eq!(req.body.action, "status");
        assert_eq!(req.time, UNSET_MSGTIME);
        assert!(req.timestamp().is_none());
    }

    #[test]
    fn request_serializes() {
        insta::assert_json_snapshot!(status_request());
    }

    #[test]
    fn request_with_envelope_serializes() {
        let time = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let req = status_request()
            .with_request_id("8a3c0b6e2f4d4e1b9c7d5a6f3e2b1c0d")
            .with_sender_id("node1.example.net")
            .with_caller_id("choria=rip.mcollective")
            .with_collective("mcollective")
            .with_ttl(60)
            .with_time(time)
            .with_caller("choria=rip.mcollective");
        insta::assert_json_snapshot!(req);
    }

    #[test]
    fn data_is_passed_through_verbatim() {
        let data = RawValue::from_string(r#"{"msg":  "hello"}"#.to_string()).unwrap();
        let req = status_request().with_data(data);
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains(r#""data":{"msg":  "hello"}"#));
    }

    #[test]
    fn time_roundtrips_through_chrono() {
        let time = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let req = status_request().with_time(time);
        assert_eq!(req.time, 1_700_000_000);
        assert_eq!(req.timestamp(), Some(time));
    }

    #[test]
    fn request_id_is_32_hex_chars() {
        let id = RequestId::generate();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, RequestId::generate());
    }

    #[test]
    fn action_reply_tolerates_missing_fields() {
        let reply: ActionReply = serde_json::from_str(r#"{"statusmsg":"OK"}"#).unwrap();
        assert_eq!(reply.statuscode, 0);
        assert_eq!(reply.statusmsg, "OK");
        assert!(reply.data.is_null());
    }

    #[test]
    fn call_stack_is_opaque() {
        let stack = CallStack::from(r#"[{"statement":"systemd=true"}]"#);
        assert_eq!(stack.as_str(), r#"[{"statement":"systemd=true"}]"#);
        assert_eq!(stack.to_string(), stack.clone().into_inner());
    }
}
