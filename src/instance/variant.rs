use std::sync::Arc;

use crate::eval::{Handle, Value};

use super::{InstanceKey, Label};

/// Rewrite id of the unedited variant.
pub const UNREWRITTEN_RID: &str = "unrewritten";

/// One variant of a logical item with its named entries.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub key: InstanceKey,
    pub rid: String,
    entries: Vec<(String, Value)>,
}

impl Instance {
    pub fn new<S: Into<String>>(qid: S, vid: u32) -> Self {
        Self {
            key: InstanceKey::new(qid, vid),
            rid: UNREWRITTEN_RID.to_string(),
            entries: Vec::new(),
        }
    }

    pub fn with_rid<S: Into<String>>(mut self, rid: S) -> Self {
        self.rid = rid.into();
        self
    }

    pub fn with_entry<S: Into<String>>(mut self, name: S, value: Value) -> Self {
        self.set_entry(name, value);
        self
    }

    /// Sets an entry, keeping the position of an existing one.
    pub fn set_entry<S: Into<String>>(&mut self, name: S, value: Value) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Stored entry, without virtual entries.
    pub fn raw_entry(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }

    /// Entry lookup including the virtual `instance`, `groundtruth` and
    /// `prediction` entries. `prediction` needs the model to pick.
    pub fn entry(&self, name: &str, model: Option<&str>) -> Option<Value> {
        if name == "instance" {
            return Some(Value::key(self.key.clone()));
        }
        if let Some(value) = self.raw_entry(name) {
            return Some(value.clone());
        }
        match name {
            "groundtruth" => self
                .groundtruth()
                .map(|label| Value::Handle(Handle::Label(label))),
            "prediction" => model
                .and_then(|model| self.prediction(model))
                .map(|label| Value::Handle(Handle::Label(label))),
            _ => None,
        }
    }

    pub fn has_entry(&self, name: &str, model: Option<&str>) -> bool {
        self.entry(name, model).is_some()
    }

    fn labels(&self, entry: &str) -> Vec<Arc<Label>> {
        match self.raw_entry(entry) {
            Some(Value::Handle(Handle::Label(label))) => vec![label.clone()],
            Some(Value::List(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Value::Handle(Handle::Label(label)) => Some(label.clone()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn groundtruths(&self) -> Vec<Arc<Label>> {
        self.labels("groundtruths")
    }

    /// The groundtruth with the highest `count` meta, the first one on ties.
    pub fn groundtruth(&self) -> Option<Arc<Label>> {
        let count = |label: &Arc<Label>| {
            label
                .get_meta("count")
                .and_then(Value::as_number)
                .unwrap_or(-1.0)
        };
        let mut best: Option<Arc<Label>> = None;
        for label in self.groundtruths() {
            let better = best.as_ref().map_or(true, |b| count(&label) > count(b));
            if better {
                best = Some(label);
            }
        }
        best
    }

    pub fn predictions(&self) -> Vec<Arc<Label>> {
        self.labels("predictions")
    }

    pub fn prediction(&self, model: &str) -> Option<Arc<Label>> {
        self.predictions().into_iter().find(|p| p.model == model)
    }

    /// Whether `model` got this instance wrong. No prediction counts as correct.
    pub fn is_incorrect(&self, model: &str, primary_metric: &str) -> bool {
        self.prediction(model)
            .map(|p| p.is_incorrect(primary_metric))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::Document;

    fn instance() -> Instance {
        Instance::new("q1", 0)
            .with_entry("question", Value::doc(Document::from_text("who is it")))
            .with_entry(
                "groundtruths",
                Value::List(vec![
                    Value::label(Label::new("groundtruth", "a")),
                    Value::label(
                        Label::new("groundtruth", "b").with_meta("count", Value::Number(3.0)),
                    ),
                ]),
            )
            .with_entry(
                "predictions",
                Value::List(vec![
                    Value::label(Label::new("bidaf", "a").with_perform("f1", 0.0)),
                    Value::label(Label::new("bert", "b").with_perform("f1", 1.0)),
                ]),
            )
    }

    #[test]
    fn test_virtual_entries() {
        let instance = instance();
        assert_eq!(
            instance.entry("instance", None),
            Some(Value::key(InstanceKey::unedited("q1")))
        );
        match instance.entry("groundtruth", None) {
            Some(Value::Handle(Handle::Label(label))) => assert_eq!(label.text, "b"),
            other => panic!("unexpected groundtruth {:?}", other),
        }
        match instance.entry("prediction", Some("bert")) {
            Some(Value::Handle(Handle::Label(label))) => assert_eq!(label.text, "b"),
            other => panic!("unexpected prediction {:?}", other),
        }
        assert_eq!(instance.entry("prediction", None), None);
        assert!(instance.has_entry("question", None));
        assert!(!instance.has_entry("context", None));
    }

    #[test]
    fn test_correctness() {
        let instance = instance();
        assert!(instance.is_incorrect("bidaf", "f1"));
        assert!(!instance.is_incorrect("bert", "f1"));
        assert!(!instance.is_incorrect("unknown", "f1"));
    }
}
