//! JSON encoding of requests and decoding of shim output.
//!
//! Output is always buffered in full before it reaches these functions, so a
//! reply can be probed for a failure marker before it is decoded into the
//! caller's shape.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::error::{Result, ShimError};

/// Encode a request as compact JSON for the shim's stdin.
pub fn encode_request<T: Serialize + ?Sized>(request: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(request).map_err(ShimError::Encode)
}

/// Decode shim output into the caller's reply shape.
///
/// Unknown fields are ignored unless the target type denies them.
pub fn decode_reply<T: DeserializeOwned>(output: &[u8]) -> Result<T> {
    serde_json::from_slice(output).map_err(ShimError::Decode)
}

/// Look up a single top-level field without decoding the document into any
/// schema.
///
/// Strings yield their content, `null` yields an empty string and any other
/// value yields its compact JSON text. Returns `None` when the field is
/// absent or the output is not a JSON object.
pub fn probe_field(output: &[u8], name: &str) -> Option<String> {
    let mut object: Map<String, Value> = serde_json::from_slice(output).ok()?;
    match object.remove(name)? {
        Value::String(s) => Some(s),
        Value::Null => Some(String::new()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::protocol::{ActionReply, Request, ValidateReply};

    #[test]
    fn encodes_compact_json() {
        let bytes = encode_request(&Request::new("one", "status")).unwrap();
        let text = std::str::from_utf8(&bytes).unwrap();
        assert!(text.starts_with(r#"{"agent":"one","action":"status","#));
        assert!(!text.contains('\n'));
        assert!(!text.contains(": "));
    }

    #[test]
    fn encoding_failure_is_reported() {
        use std::collections::HashMap;

        // Maps with non-string keys cannot be represented as JSON objects.
        let mut unrepresentable = HashMap::new();
        unrepresentable.insert((1, 2), "pair");

        let err = encode_request(&unrepresentable).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encoding);
        assert!(
            err.to_string()
                .starts_with("cannot JSON encode ruby compatibility shim request:")
        );
    }

    #[test]
    fn decodes_action_reply() {
        let reply: ActionReply =
            decode_reply(br#"{"statuscode":0,"statusmsg":"OK","data":{"test":"ok"}}"#).unwrap();
        assert_eq!(reply.statuscode, 0);
        assert_eq!(reply.statusmsg, "OK");
        assert_eq!(reply.data, serde_json::json!({"test": "ok"}));
    }

    #[test]
    fn decode_ignores_unknown_fields() {
        let reply: ValidateReply = decode_reply(br#"{"matched":true,"extra":[1,2,3]}"#).unwrap();
        assert!(reply.matched);
    }

    #[test]
    fn decode_rejects_malformed_json() {
        let err = decode_reply::<ValidateReply>(b"{\"matched\":").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decoding);
        assert!(
            err.to_string()
                .starts_with("cannot decode output from the ruby compatibility shim:")
        );
    }

    #[test]
    fn decode_rejects_mismatched_shape() {
        let err = decode_reply::<ValidateReply>(br#"{"matched":"yes"}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decoding);
    }

    #[test]
    fn probe_finds_string_field() {
        let found = probe_field(br#"{"statusmsg":"simulated failure"}"#, "statusmsg");
        assert_eq!(found.as_deref(), Some("simulated failure"));
    }

    #[test]
    fn probe_treats_empty_and_null_as_present() {
        assert_eq!(
            probe_field(br#"{"statusmsg":""}"#, "statusmsg").as_deref(),
            Some("")
        );
        assert_eq!(
            probe_field(br#"{"statusmsg":null}"#, "statusmsg").as_deref(),
            Some("")
        );
    }

    #[test]
    fn probe_renders_non_string_values_as_json() {
        let found = probe_field(br#"{"statusmsg":{"code":4}}"#, "statusmsg");
        assert_eq!(found.as_deref(), Some(r#"{"code":4}"#));
    }

    #[test]
    fn probe_ignores_non_objects_and_absent_fields() {
        let stack = br#"[{"statement":"systemd=true"},{"and":"and"}]"#;
        assert_eq!(probe_field(stack, "statusmsg"), None);
        assert_eq!(probe_field(br#"{"matched":true}"#, "statusmsg"), None);
        assert_eq!(probe_field(b"not json", "statusmsg"), None);
    }

    #[test]
    fn probe_only_looks_at_top_level() {
        let nested = br#"{"data":{"statusmsg":"inner"}}"#;
        assert_eq!(probe_field(nested, "statusmsg"), None);
    }
}
