//! Per-session conversational state and its scratch-data sidecar.
//!
//! Every field that can be absent on an older or partially-written record is
//! `#[serde(default)]` so the store can evolve the shape of `SessionState`
//! without invalidating sessions already in flight.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,
    pub msisdn: String,
    #[serde(default)]
    pub customer_id: Option<i64>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub step_id: String,
    #[serde(default)]
    pub last_input: String,
    #[serde(default)]
    pub last_response: String,
    #[serde(default)]
    pub pending_continuation: String,
    #[serde(default)]
    pub completed: bool,
}

fn default_language() -> String {
    "en".to_string()
}

impl SessionState {
    pub fn new(session_id: impl Into<String>, msisdn: impl Into<String>) -> Self {
        SessionState {
            session_id: session_id.into(),
            msisdn: msisdn.into(),
            customer_id: None,
            customer_name: None,
            language: default_language(),
            step_id: "home".to_string(),
            last_input: String::new(),
            last_response: String::new(),
            pending_continuation: String::new(),
            completed: false,
        }
    }

    pub fn has_pending_continuation(&self) -> bool {
        !self.pending_continuation.is_empty()
    }
}

/// Free-form per-session scratch data, keyed by the flow that owns it
/// (e.g. `electricity_meter_number`, `tv_amount`). Each service reads and
/// writes only the keys it owns; values round-trip through `serde_json::Value`,
/// so a handler can stash a typed value under its key and read the same type
/// back without the whole map collapsing to `Value`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionExtras(#[serde(default)] HashMap<String, Value>);

impl SessionExtras {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_typed<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.0
            .get(key)
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Serialize) {
        if let Ok(v) = serde_json::to_value(value) {
            self.0.insert(key.into(), v);
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.0.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_fields_are_ignored_on_read() {
        let json = serde_json::json!({
            "session_id": "s1",
            "msisdn": "250700000000",
            "future_field_not_yet_invented": true,
        });
        let state: SessionState = serde_json::from_value(json).unwrap();
        assert_eq!(state.session_id, "s1");
        assert_eq!(state.language, "en");
        assert_eq!(state.step_id, "");
    }

    #[test]
    fn extras_round_trip_typed_values() {
        let mut extras = SessionExtras::default();
        extras.set("electricity_amount", 1500u64);
        let amount: Option<u64> = extras.get_typed("electricity_amount");
        assert_eq!(amount, Some(1500));
        assert!(extras.get_typed::<u64>("missing_key").is_none());
    }
}
