use std::collections::BTreeMap;

use super::{Instance, InstanceKey, UNREWRITTEN_RID};

/// Every variant of one logical item, keyed by vid.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InstanceGroup {
    pub qid: String,
    variants: BTreeMap<u32, Instance>,
}

impl InstanceGroup {
    pub fn new<S: Into<String>>(qid: S) -> Self {
        Self {
            qid: qid.into(),
            variants: BTreeMap::new(),
        }
    }

    /// Adds a variant, replacing any variant with the same vid.
    pub fn insert(&mut self, instance: Instance) {
        self.variants.insert(instance.key.vid, instance);
    }

    pub fn with_variant(mut self, instance: Instance) -> Self {
        self.insert(instance);
        self
    }

    pub fn unedited(&self) -> Option<&Instance> {
        self.variants.get(&0)
    }

    pub fn unedited_key(&self) -> InstanceKey {
        InstanceKey::unedited(self.qid.clone())
    }

    pub fn by_vid(&self, vid: u32) -> Option<&Instance> {
        self.variants.get(&vid)
    }

    /// Variant produced by rewrite `rid`. The unedited id always maps to vid 0.
    pub fn by_rid(&self, rid: &str) -> Option<&Instance> {
        if rid == UNREWRITTEN_RID {
            return self.unedited();
        }
        self.variants.values().find(|instance| instance.rid == rid)
    }

    pub fn variants(&self) -> impl Iterator<Item = &Instance> {
        self.variants.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &InstanceKey> {
        self.variants.values().map(|instance| &instance.key)
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}
