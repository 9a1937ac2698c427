use core::fmt;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumDiscriminants, EnumIter};

use crate::instance::{Document, InstanceKey, Label};

/// Opaque handle to a collaborator-provided target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Handle {
    Doc(Arc<Document>),
    Label(Arc<Label>),
    Key(InstanceKey),
}

impl Handle {
    /// Display text of the underlying target.
    pub fn text(&self) -> String {
        match self {
            Handle::Doc(doc) => doc.text(),
            Handle::Label(label) => label.text.clone(),
            Handle::Key(key) => key.to_string(),
        }
    }

    /// Document backing the handle, when it has one.
    pub fn doc(&self) -> Option<&Document> {
        match self {
            Handle::Doc(doc) => Some(doc),
            Handle::Label(label) => label.doc.as_ref(),
            Handle::Key(_) => None,
        }
    }
}

// runtime value
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize, EnumDiscriminants)]
#[serde(untagged)]
#[strum_discriminants(name(ValueTag), derive(Hash, EnumIter, Display))]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    List(Vec<Value>),
    Handle(Handle),
}

impl Value {
    pub fn tag(&self) -> ValueTag {
        ValueTag::from(self)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Handle(_) => true,
        }
    }

    /// Numeric view; booleans count as 1 and 0.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn doc(doc: Document) -> Self {
        Value::Handle(Handle::Doc(Arc::new(doc)))
    }

    pub fn label(label: Label) -> Self {
        Value::Handle(Handle::Label(Arc::new(label)))
    }

    pub fn key(key: InstanceKey) -> Self {
        Value::Handle(Handle::Key(key))
    }

    /// Total order used for sorting categorical values: by tag first, then
    /// by content.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => a.total_cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let ord = x.total_cmp(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Value::Handle(a), Value::Handle(b)) => a.text().cmp(&b.text()),
            (a, b) => (a.tag() as u8).cmp(&(b.tag() as u8)),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => write!(f, "None"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(items) => {
                let items: Vec<String> = items.iter().map(|i| i.to_string()).collect();
                write!(f, "[{}]", items.join(", "))
            }
            Value::Handle(handle) => write!(f, "{}", handle.text()),
        }
    }
}

/// [`Value`] wrapper ordered by [`Value::total_cmp`], for use as a map key.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderedValue(pub Value);

impl PartialEq for OrderedValue {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for OrderedValue {}

impl PartialOrd for OrderedValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Result of evaluating one node: the value plus the instance keys whose data
/// produced it.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct OpNodeReturn {
    pub provenance: BTreeSet<InstanceKey>,
    pub value: Value,
}

impl OpNodeReturn {
    pub fn new(provenance: BTreeSet<InstanceKey>, value: Value) -> Self {
        Self { provenance, value }
    }

    pub fn bare(value: Value) -> Self {
        Self {
            provenance: BTreeSet::new(),
            value,
        }
    }

    pub fn keyed(key: &InstanceKey, value: Value) -> Self {
        Self {
            provenance: BTreeSet::from([key.clone()]),
            value,
        }
    }

    pub fn null() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.truthy());
        assert!(!Value::Number(0.0).truthy());
        assert!(Value::Number(-1.0).truthy());
        assert!(!Value::Str(String::new()).truthy());
        assert!(Value::from(vec![1.0]).truthy());
        assert!(Value::key(InstanceKey::new("q", 0)).truthy());
    }

    #[test]
    fn test_total_order_sorts_by_tag_then_content() {
        let mut values = vec![
            Value::from("b"),
            Value::Number(3.0),
            Value::from("a"),
            Value::Bool(true),
            Value::Number(-1.0),
        ];
        values.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(
            values,
            vec![
                Value::Bool(true),
                Value::Number(-1.0),
                Value::Number(3.0),
                Value::from("a"),
                Value::from("b"),
            ]
        );
    }

    #[test]
    fn test_untagged_json() {
        let value: Value = serde_json::from_str(r#"[1, "x", true, null]"#).unwrap();
        assert_eq!(
            value,
            Value::List(vec![
                Value::Number(1.0),
                Value::from("x"),
                Value::Bool(true),
                Value::Null
            ])
        );
        let label: Value =
            serde_json::from_str(r#"{"model": "bidaf", "text": "Paris", "perform": {"f1": 1.0}}"#)
                .unwrap();
        assert!(matches!(label, Value::Handle(Handle::Label(_))));
    }
}
