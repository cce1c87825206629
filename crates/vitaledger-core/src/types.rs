use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unix timestamp (seconds, UTC). Kept as `i64` to match the ISO-8601
/// round-trip helpers in `chrono`.
pub type UnixSeconds = i64;

/// A heterogeneous transaction payload value.
///
/// Transaction payloads are arbitrary clinical/administrative data; the
/// Context Engine only ever walks them as a recursive tree of scalars. This
/// is the tagged union described in spec §9 ("Dynamic payloads").
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PayloadValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<PayloadValue>),
    Map(BTreeMap<String, PayloadValue>),
}

impl PayloadValue {
    /// Depth-first walk collecting every scalar leaf as lowercase text,
    /// space-separated. Used by the Context Engine to build its
    /// keyword-scan search text.
    pub fn flatten_leaf_text(&self) -> String {
        let mut out = String::new();
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into(&self, out: &mut String) {
        match self {
            PayloadValue::Null => {}
            PayloadValue::Bool(b) => {
                out.push_str(&b.to_string());
                out.push(' ');
            }
            PayloadValue::Number(n) => {
                out.push_str(&n.to_string());
                out.push(' ');
            }
            PayloadValue::String(s) => {
                out.push_str(s);
                out.push(' ');
            }
            PayloadValue::List(items) => {
                for item in items {
                    item.flatten_into(out);
                }
            }
            PayloadValue::Map(map) => {
                for value in map.values() {
                    value.flatten_into(out);
                }
            }
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PayloadValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Payload is an ordered-by-key map from field name to value, matching the
/// "string to arbitrary value" shape from spec §3.
pub type Payload = BTreeMap<String, PayloadValue>;

/// Clamp a score into the closed unit interval, per spec §4.1's `clamp01`.
pub fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}
