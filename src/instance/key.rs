use core::fmt;
use serde::{Deserialize, Serialize};

/// Identifies one variant of one logical item. `vid == 0` is the unedited
/// original.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceKey {
    pub qid: String,
    pub vid: u32,
}

impl InstanceKey {
    pub fn new<S: Into<String>>(qid: S, vid: u32) -> Self {
        Self {
            qid: qid.into(),
            vid,
        }
    }

    pub fn unedited<S: Into<String>>(qid: S) -> Self {
        Self::new(qid, 0)
    }

    pub fn is_unedited(&self) -> bool {
        self.vid == 0
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "qid:{}-vid:{}", self.qid, self.vid)
    }
}
