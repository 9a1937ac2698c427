use std::collections::{BTreeMap, BTreeSet};
use std::{fs::File, io::BufReader, path::Path};

use serde::{Deserialize, Serialize};

use crate::eval::Value;
use crate::EngineResult;

use super::{Instance, InstanceGroup, InstanceKey, UNREWRITTEN_RID};

fn default_rid() -> String {
    UNREWRITTEN_RID.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub qid: String,
    #[serde(default)]
    pub vid: u32,
    #[serde(default = "default_rid")]
    pub rid: String,
    #[serde(default)]
    pub entries: BTreeMap<String, Value>,
}

/// On-disk shape of a dataset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetFile {
    pub instances: Vec<InstanceRecord>,
    /// Training vocabulary frequencies per target type, `{type: {lemma: count}}`
    #[serde(default)]
    pub frequencies: BTreeMap<String, BTreeMap<String, u64>>,
}

/// The evaluation universe: instance groups ordered by qid.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    groups: BTreeMap<String, InstanceGroup>,
    frequencies: BTreeMap<String, BTreeMap<String, u64>>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_instances<I: IntoIterator<Item = Instance>>(instances: I) -> Self {
        let mut dataset = Self::new();
        instances
            .into_iter()
            .for_each(|instance| dataset.insert(instance));
        dataset
    }

    pub fn from_json_str(s: &str) -> EngineResult<Self> {
        let file: DatasetFile = serde_json::from_str(s)?;
        Ok(Self::from(file))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let reader = BufReader::new(File::open(path)?);
        let file: DatasetFile = serde_json::from_reader(reader)?;
        Ok(Self::from(file))
    }

    pub fn insert(&mut self, instance: Instance) {
        self.groups
            .entry(instance.key.qid.clone())
            .or_insert_with(|| InstanceGroup::new(instance.key.qid.clone()))
            .insert(instance);
    }

    pub fn with_frequencies(
        mut self,
        target_type: &str,
        table: BTreeMap<String, u64>,
    ) -> Self {
        self.frequencies.insert(target_type.to_string(), table);
        self
    }

    pub fn frequencies(&self) -> &BTreeMap<String, BTreeMap<String, u64>> {
        &self.frequencies
    }

    pub fn group(&self, qid: &str) -> Option<&InstanceGroup> {
        self.groups.get(qid)
    }

    pub fn groups(&self) -> impl Iterator<Item = &InstanceGroup> {
        self.groups.values()
    }

    pub fn qids(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(|q| q.as_str())
    }

    /// Number of instance groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn instance(&self, key: &InstanceKey) -> Option<&Instance> {
        self.groups.get(&key.qid).and_then(|g| g.by_vid(key.vid))
    }

    pub fn instances(&self) -> impl Iterator<Item = &Instance> {
        self.groups.values().flat_map(|g| g.variants())
    }

    pub fn unedited_keys(&self) -> BTreeSet<InstanceKey> {
        self.instances()
            .filter(|i| i.key.is_unedited())
            .map(|i| i.key.clone())
            .collect()
    }

    pub fn edited_keys(&self) -> BTreeSet<InstanceKey> {
        self.instances()
            .filter(|i| !i.key.is_unedited())
            .map(|i| i.key.clone())
            .collect()
    }

    /// Keys whose `model` prediction scores below 1 on `primary_metric`.
    pub fn incorrect_keys(&self, model: &str, primary_metric: &str) -> BTreeSet<InstanceKey> {
        self.instances()
            .filter(|i| i.is_incorrect(model, primary_metric))
            .map(|i| i.key.clone())
            .collect()
    }
}

impl From<DatasetFile> for Dataset {
    fn from(file: DatasetFile) -> Self {
        let mut dataset = Dataset::from_instances(file.instances.into_iter().map(|record| {
            record.entries.into_iter().fold(
                Instance::new(record.qid, record.vid).with_rid(record.rid),
                |instance, (name, value)| instance.with_entry(name, value),
            )
        }));
        dataset.frequencies = file.frequencies;
        dataset
    }
}
