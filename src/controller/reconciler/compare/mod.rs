//! # Equality Comparators
//!
//! Field-by-field drift detection between a desired and an observed object.
//!
//! Each managed kind declares a single field table. The table drives both the
//! comparison ([`detect`]) and the in-place update ([`overlay`]), so the set of
//! fields the reconciler compares can never diverge from the set it writes.
//!
//! Fields other actors own (cluster IPs, owner references, status, annotations a
//! platform component adds) are simply never listed.

mod kinds;
mod quantity;

pub use quantity::{same_quantity, ParsedQuantity, QuantityError};

use crate::store::StoreObject;
use serde_json::{Map, Value};

/// How a listed field participates in convergence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Exact semantic equality; missing and null are the same
    Owned,
    /// Values the desired object sets must match; keys the server adds are ignored
    Defaulted,
    /// Exact equality, but a mismatch requires delete and recreate
    Immutable,
}

/// One JSON pointer into the object plus its rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub pointer: &'static str,
    pub rule: Rule,
}

impl Field {
    #[must_use]
    pub const fn owned(pointer: &'static str) -> Self {
        Self {
            pointer,
            rule: Rule::Owned,
        }
    }

    #[must_use]
    pub const fn defaulted(pointer: &'static str) -> Self {
        Self {
            pointer,
            rule: Rule::Defaulted,
        }
    }

    #[must_use]
    pub const fn immutable(pointer: &'static str) -> Self {
        Self {
            pointer,
            rule: Rule::Immutable,
        }
    }
}

/// Result of comparing desired against observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Drift {
    /// Every listed field matches
    InSync,
    /// Mutable fields differ (the pointers listed) and can be updated in place
    Mutable(Vec<&'static str>),
    /// An immutable field differs; the object must be recreated
    Immutable(&'static str),
}

impl Drift {
    #[must_use]
    pub fn is_in_sync(&self) -> bool {
        matches!(self, Drift::InSync)
    }
}

/// A kind the reconciler converges
///
/// `fields` is the comparison and update allowlist. `preserve` copies values other
/// actors own from the observed object into the desired one before comparing.
pub trait Managed: StoreObject {
    fn fields() -> &'static [Field];

    fn preserve(_observed: &Self, _desired: &mut Self) {}
}

/// Compare the listed fields of two serialized objects
#[must_use]
pub fn detect(fields: &[Field], desired: &Value, observed: &Value) -> Drift {
    let mut mutable = Vec::new();
    for field in fields {
        let want = desired.pointer(field.pointer).unwrap_or(&Value::Null);
        let have = observed.pointer(field.pointer).unwrap_or(&Value::Null);
        let in_quantities = pointer_in_quantities(field.pointer);
        match field.rule {
            Rule::Owned => {
                if !exact_eq(want, have, in_quantities) {
                    mutable.push(field.pointer);
                }
            }
            Rule::Defaulted => {
                if !subset_eq(want, have, in_quantities) {
                    mutable.push(field.pointer);
                }
            }
            Rule::Immutable => {
                if !want.is_null() && !exact_eq(want, have, in_quantities) {
                    return Drift::Immutable(field.pointer);
                }
            }
        }
    }
    if mutable.is_empty() {
        Drift::InSync
    } else {
        Drift::Mutable(mutable)
    }
}

/// Copy every listed mutable field from `desired` into `observed`
///
/// An `Owned` field the desired object leaves unset is removed from `observed`; a
/// `Defaulted` one is left as the server has it. Immutable fields are never copied.
pub fn overlay(fields: &[Field], desired: &Value, observed: &mut Value) {
    for field in fields {
        let want = desired.pointer(field.pointer).filter(|v| !v.is_null());
        match (field.rule, want) {
            (Rule::Immutable, _) | (Rule::Defaulted, None) => {}
            (Rule::Owned, None) => remove_pointer(observed, field.pointer),
            (Rule::Owned | Rule::Defaulted, Some(value)) => {
                set_pointer(observed, field.pointer, value.clone());
            }
        }
    }
}

fn pointer_in_quantities(pointer: &str) -> bool {
    pointer
        .split('/')
        .any(|segment| segment == "limits" || segment == "requests")
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn scalar_eq(want: &Value, have: &Value, in_quantities: bool) -> bool {
    match (want, have) {
        (Value::String(a), Value::String(b)) if in_quantities => same_quantity(a, b),
        (Value::Number(a), Value::String(b)) | (Value::String(b), Value::Number(a))
            if in_quantities =>
        {
            same_quantity(&a.to_string(), b)
        }
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a == b,
            _ => a.as_f64() == b.as_f64(),
        },
        _ => want == have,
    }
}

/// Exact semantic equality: empty containers equal null, quantities by value
fn exact_eq(want: &Value, have: &Value, in_quantities: bool) -> bool {
    if is_empty(want) && is_empty(have) {
        return true;
    }
    match (want, have) {
        (Value::Object(a), Value::Object(b)) => a.keys().chain(b.keys()).all(|key| {
            exact_eq(
                a.get(key).unwrap_or(&Value::Null),
                b.get(key).unwrap_or(&Value::Null),
                in_quantities || key == "limits" || key == "requests",
            )
        }),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b.iter())
                    .all(|(x, y)| exact_eq(x, y, in_quantities))
        }
        _ => scalar_eq(want, have, in_quantities),
    }
}

/// Every value set in `want` matches `have`; extra keys in `have` are ignored
fn subset_eq(want: &Value, have: &Value, in_quantities: bool) -> bool {
    if is_empty(want) {
        return true;
    }
    match (want, have) {
        (Value::Object(a), Value::Object(b)) => a.iter().all(|(key, value)| {
            subset_eq(
                value,
                b.get(key).unwrap_or(&Value::Null),
                in_quantities || key == "limits" || key == "requests",
            )
        }),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b.iter())
                    .all(|(x, y)| subset_eq(x, y, in_quantities))
        }
        _ => scalar_eq(want, have, in_quantities),
    }
}

fn unescape(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

fn set_pointer(root: &mut Value, pointer: &str, value: Value) {
    let tokens: Vec<String> = pointer.split('/').skip(1).map(unescape).collect();
    let Some((last, parents)) = tokens.split_last() else {
        *root = value;
        return;
    };
    let mut current = root;
    for token in parents {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(map) = current else {
            return;
        };
        current = map.entry(token.clone()).or_insert(Value::Null);
    }
    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    if let Value::Object(map) = current {
        map.insert(last.clone(), value);
    }
}

fn remove_pointer(root: &mut Value, pointer: &str) {
    let Some((parent, last)) = pointer.rsplit_once('/') else {
        return;
    };
    let parent = if parent.is_empty() {
        Some(root)
    } else {
        root.pointer_mut(parent)
    };
    if let Some(Value::Object(map)) = parent {
        map.remove(&unescape(last));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TABLE: &[Field] = &[
        Field::owned("/metadata/labels"),
        Field::defaulted("/spec/template"),
        Field::immutable("/spec/host"),
    ];

    #[test]
    fn test_identical_objects_are_in_sync() {
        let obj = json!({"metadata": {"labels": {"a": "1"}}, "spec": {"host": "h", "template": {"x": 1}}});
        assert_eq!(detect(TABLE, &obj, &obj), Drift::InSync);
    }

    #[test]
    fn test_owned_detects_extra_observed_key() {
        let desired = json!({"metadata": {"labels": {"a": "1"}}});
        let observed = json!({"metadata": {"labels": {"a": "1", "b": "2"}}});
        assert_eq!(
            detect(TABLE, &desired, &observed),
            Drift::Mutable(vec!["/metadata/labels"])
        );
    }

    #[test]
    fn test_defaulted_ignores_server_added_keys() {
        let desired = json!({"spec": {"template": {"replicas": 1}}});
        let observed = json!({"spec": {"template": {"replicas": 1, "progressDeadlineSeconds": 600}}});
        assert!(detect(TABLE, &desired, &observed).is_in_sync());
    }

    #[test]
    fn test_defaulted_detects_changed_value() {
        let desired = json!({"spec": {"template": {"replicas": 2}}});
        let observed = json!({"spec": {"template": {"replicas": 1}}});
        assert_eq!(
            detect(TABLE, &desired, &observed),
            Drift::Mutable(vec!["/spec/template"])
        );
    }

    #[test]
    fn test_immutable_mismatch_wins() {
        let desired = json!({"metadata": {"labels": {"a": "2"}}, "spec": {"host": "new"}});
        let observed = json!({"metadata": {"labels": {"a": "1"}}, "spec": {"host": "old"}});
        assert_eq!(detect(TABLE, &desired, &observed), Drift::Immutable("/spec/host"));
    }

    #[test]
    fn test_immutable_unset_in_desired_accepts_assigned_value() {
        let desired = json!({"spec": {}});
        let observed = json!({"spec": {"host": "assigned.example.com"}});
        assert!(detect(TABLE, &desired, &observed).is_in_sync());
    }

    #[test]
    fn test_empty_containers_equal_missing() {
        let desired = json!({"metadata": {"labels": {}}});
        let observed = json!({"metadata": {}});
        assert!(detect(TABLE, &desired, &observed).is_in_sync());
    }

    #[test]
    fn test_quantities_compare_by_value() {
        let table = &[Field::defaulted("/spec/resources")];
        let desired = json!({"spec": {"resources": {"limits": {"cpu": "1", "memory": "1Gi"}}}});
        let observed = json!({"spec": {"resources": {"limits": {"cpu": "1000m", "memory": "1024Mi"}}}});
        assert!(detect(table, &desired, &observed).is_in_sync());

        let different = json!({"spec": {"resources": {"limits": {"cpu": "2", "memory": "1Gi"}}}});
        assert!(!detect(table, &different, &observed).is_in_sync());
    }

    #[test]
    fn test_strings_outside_quantities_compare_verbatim() {
        let table = &[Field::owned("/data")];
        let desired = json!({"data": {"cpu": "1"}});
        let observed = json!({"data": {"cpu": "1000m"}});
        assert!(!detect(table, &desired, &observed).is_in_sync());
    }

    #[test]
    fn test_numbers_compare_semantically() {
        let table = &[Field::owned("/spec/replicas")];
        assert!(detect(table, &json!({"spec": {"replicas": 1}}), &json!({"spec": {"replicas": 1.0}}))
            .is_in_sync());
    }

    #[test]
    fn test_overlay_copies_mutable_fields_only() {
        let desired = json!({
            "metadata": {"labels": {"a": "2"}},
            "spec": {"host": "new", "template": {"replicas": 2}}
        });
        let mut observed = json!({
            "metadata": {"labels": {"a": "1"}, "resourceVersion": "7"},
            "spec": {"host": "old", "template": {"replicas": 1}, "clusterIP": "10.0.0.1"}
        });
        overlay(TABLE, &desired, &mut observed);

        assert_eq!(observed["metadata"]["labels"], json!({"a": "2"}));
        assert_eq!(observed["metadata"]["resourceVersion"], json!("7"));
        assert_eq!(observed["spec"]["template"], json!({"replicas": 2}));
        assert_eq!(observed["spec"]["host"], json!("old"));
        assert_eq!(observed["spec"]["clusterIP"], json!("10.0.0.1"));
    }

    #[test]
    fn test_overlay_removes_unset_owned_field() {
        let desired = json!({"metadata": {}});
        let mut observed = json!({"metadata": {"labels": {"a": "1"}}});
        overlay(TABLE, &desired, &mut observed);
        assert!(observed["metadata"].get("labels").is_none());
    }

    #[test]
    fn test_overlay_creates_missing_parents() {
        let desired = json!({"spec": {"template": {"x": 1}}});
        let mut observed = json!({});
        overlay(TABLE, &desired, &mut observed);
        assert_eq!(observed, json!({"spec": {"template": {"x": 1}}}));
    }

    #[test]
    fn test_overlay_then_detect_is_in_sync() {
        let desired = json!({"metadata": {"labels": {"a": "2"}}, "spec": {"template": {"y": [1, 2]}}});
        let mut observed = json!({"metadata": {"labels": {"z": "9"}}, "spec": {"template": {"y": [3]}}});
        overlay(TABLE, &desired, &mut observed);
        assert!(detect(TABLE, &desired, &observed).is_in_sync());
    }
}
