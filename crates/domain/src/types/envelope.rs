//! Controller response envelope
//!
//! Every site-scoped endpoint answers with
//! `{"meta": {"rc": "ok"|"error", "msg": ...}, "data": [...]}`.

use serde::{Deserialize, Serialize};

/// Status block of a controller response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiMeta {
    pub rc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

impl ApiMeta {
    pub fn is_ok(&self) -> bool {
        self.rc.eq_ignore_ascii_case("ok")
    }
}

/// Generic response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiEnvelope<T> {
    pub meta: ApiMeta,
    #[serde(default)]
    pub data: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_ok_with_data() {
        let raw = r#"{"meta":{"rc":"ok"},"data":[{"a":1},{"a":2}]}"#;
        let env: ApiEnvelope<serde_json::Value> = serde_json::from_str(raw).unwrap();
        assert!(env.meta.is_ok());
        assert_eq!(env.data.len(), 2);
    }

    #[test]
    fn test_envelope_error_without_data() {
        let raw = r#"{"meta":{"rc":"error","msg":"api.err.NoSiteContext"}}"#;
        let env: ApiEnvelope<serde_json::Value> = serde_json::from_str(raw).unwrap();
        assert!(!env.meta.is_ok());
        assert_eq!(env.meta.msg.as_deref(), Some("api.err.NoSiteContext"));
        assert!(env.data.is_empty());
    }
}
