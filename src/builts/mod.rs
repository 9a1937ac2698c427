//! Named, memoized evaluation results: attributes hold one value per
//! instance, groups hold the instances an expression accepts.

mod attribute;
mod group;
pub mod stats;
mod store;

pub use attribute::{Attribute, AttributeRecord, Dtype, ValueCounts};
pub use group::{
    Correctness, ErrorRates, Group, GroupCounts, GroupRecord, GroupStats, ModelComparison,
};
pub use store::{Built, BuiltDefinition, BuiltStore};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::instance::{Dataset, InstanceGroup};

#[derive(Debug, Clone)]
pub struct CreateOptions {
    /// Restrict evaluation to these qids.
    pub sample_list: Option<Vec<String>>,
    /// Upper bound on the evaluated instance groups. Defaults to the dataset size.
    pub test_size: Option<usize>,
    pub force_recompute: bool,
    pub save: bool,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            sample_list: None,
            test_size: None,
            force_recompute: false,
            save: true,
        }
    }
}

impl CreateOptions {
    pub fn with_test_size(mut self, test_size: usize) -> Self {
        self.test_size = Some(test_size);
        self
    }

    pub fn with_sample_list<I, S>(mut self, qids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sample_list = Some(qids.into_iter().map(Into::into).collect());
        self
    }

    pub fn force_recompute(mut self) -> Self {
        self.force_recompute = true;
        self
    }

    pub fn unsaved(mut self) -> Self {
        self.save = false;
        self
    }

    pub(crate) fn resolved_test_size(&self, dataset: &Dataset, default: Option<usize>) -> usize {
        self.test_size.or(default).unwrap_or_else(|| dataset.len())
    }

    /// Whether an equivalent registered block may stand in for a new run.
    pub(crate) fn allows_reuse(&self) -> bool {
        !self.force_recompute && self.sample_list.is_none()
    }

    /// Instance groups to evaluate: the sample list (or everything), cut down
    /// to `test_size` by uniform sampling.
    pub(crate) fn sample<'a>(
        &self,
        dataset: &'a Dataset,
        test_size: usize,
        seed: Option<u64>,
    ) -> Vec<&'a InstanceGroup> {
        let mut candidates: Vec<&InstanceGroup> = match &self.sample_list {
            Some(qids) => qids.iter().filter_map(|qid| dataset.group(qid)).collect(),
            None => dataset.groups().collect(),
        };
        if candidates.len() > test_size {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            candidates = candidates
                .choose_multiple(&mut rng, test_size)
                .copied()
                .collect();
            candidates.sort_by(|a, b| a.qid.cmp(&b.qid));
            tracing::debug!("sampled {} instance groups", candidates.len());
        }
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::Instance;

    fn dataset() -> Dataset {
        Dataset::from_instances((0..10).map(|i| Instance::new(format!("q{}", i), 0)))
    }

    #[test]
    fn test_sample_respects_test_size() {
        let dataset = dataset();
        let options = CreateOptions::default().with_test_size(3);
        let first = options.sample(&dataset, 3, Some(7));
        let second = options.sample(&dataset, 3, Some(7));
        assert_eq!(first.len(), 3);
        let qids = |groups: &[&InstanceGroup]| -> Vec<String> {
            groups.iter().map(|g| g.qid.clone()).collect()
        };
        assert_eq!(qids(&first), qids(&second));
    }

    #[test]
    fn test_sample_list() {
        let dataset = dataset();
        let options = CreateOptions::default().with_sample_list(["q2", "q5", "nope"]);
        let sampled = options.sample(&dataset, 10, None);
        assert_eq!(sampled.len(), 2);
        assert!(!options.allows_reuse());
        assert_eq!(options.resolved_test_size(&dataset, None), 10);
    }
}
