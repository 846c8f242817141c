//! Per-(tool-name, normalized-input) retry counter, turn-local (spec
//! §4.4.2). Grounded on `ActNode::handle_error`'s `HandleToolErrors::Always`
//! templating shape, generalized from "always produce an error message" to
//! a 3-strike counter that escalates to a terminal directive.

use std::collections::HashMap;

use serde_json::Value;

/// §4.4.2: on the third failure of the same (tool, input) pair, stop
/// retrying and surface a terminal directive instead.
pub const MAX_ATTEMPTS: u32 = 3;

/// Canonical form for counter keying: object keys sorted recursively so
/// equivalent JSON with different key order hashes the same.
pub fn canonical_json(value: &Value) -> String {
    fn sort(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut entries: Vec<(String, Value)> =
                    map.iter().map(|(k, v)| (k.clone(), sort(v))).collect();
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                Value::Object(entries.into_iter().collect())
            }
            Value::Array(items) => Value::Array(items.iter().map(sort).collect()),
            other => other.clone(),
        }
    }
    sort(value).to_string()
}

#[derive(Default)]
pub struct RetryCounter {
    counts: HashMap<String, u32>,
}

impl RetryCounter {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(tool_name: &str, input: &Value) -> String {
        format!("{tool_name}\u{0}{}", canonical_json(input))
    }

    /// Records a failure and returns the new attempt count.
    pub fn record_failure(&mut self, tool_name: &str, input: &Value) -> u32 {
        let counter = self.counts.entry(Self::key(tool_name, input)).or_insert(0);
        *counter += 1;
        *counter
    }

    /// Whether this (tool, input) pair has hit [`MAX_ATTEMPTS`].
    pub fn exhausted(&self, tool_name: &str, input: &Value) -> bool {
        self.counts.get(&Self::key(tool_name, input)).copied().unwrap_or(0) >= MAX_ATTEMPTS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_json_ignores_key_order() {
        let a = serde_json::json!({"b": 1, "a": 2});
        let b = serde_json::json!({"a": 2, "b": 1});
        assert_eq!(canonical_json(&a), canonical_json(&b));
    }

    #[test]
    fn counter_escalates_to_exhausted_on_third_failure() {
        let mut counter = RetryCounter::new();
        let input = serde_json::json!({"command": "flaky"});
        assert_eq!(counter.record_failure("bash", &input), 1);
        assert!(!counter.exhausted("bash", &input));
        assert_eq!(counter.record_failure("bash", &input), 2);
        assert!(!counter.exhausted("bash", &input));
        assert_eq!(counter.record_failure("bash", &input), 3);
        assert!(counter.exhausted("bash", &input));
    }

    #[test]
    fn distinct_inputs_have_independent_counters() {
        let mut counter = RetryCounter::new();
        counter.record_failure("bash", &serde_json::json!({"command": "a"}));
        counter.record_failure("bash", &serde_json::json!({"command": "a"}));
        counter.record_failure("bash", &serde_json::json!({"command": "a"}));
        assert!(!counter.exhausted("bash", &serde_json::json!({"command": "b"})));
    }
}
