//! Multi-version data model the expressions are evaluated against.

mod dataset;
mod group;
mod key;
mod target;
mod variant;

pub use dataset::{Dataset, DatasetFile, InstanceRecord};
pub use group::InstanceGroup;
pub use key::InstanceKey;
pub use target::{DocToken, Document, Label};
pub use variant::{Instance, UNREWRITTEN_RID};
