use crate::instance::{Instance, InstanceGroup, UNREWRITTEN_RID};
use crate::registry_context::RegistryContext;

/// Where a node is evaluated: one instance group, the registries, and the
/// rewrite whose variant is requested.
#[derive(Clone)]
pub struct EvalContext<'a> {
    pub group: &'a InstanceGroup,
    pub registry: &'a RegistryContext,
    pub requested_rewrite: String,
}

impl<'a> EvalContext<'a> {
    pub fn new(group: &'a InstanceGroup, registry: &'a RegistryContext) -> Self {
        Self {
            group,
            registry,
            requested_rewrite: UNREWRITTEN_RID.to_string(),
        }
    }

    /// Same group and registries, another variant.
    pub fn with_rewrite<S: Into<String>>(&self, rid: S) -> Self {
        Self {
            group: self.group,
            registry: self.registry,
            requested_rewrite: rid.into(),
        }
    }

    pub fn is_unrewritten(&self) -> bool {
        self.requested_rewrite == UNREWRITTEN_RID
    }

    /// The requested variant, if the group has one.
    pub fn instance(&self) -> Option<&'a Instance> {
        self.group.by_rid(&self.requested_rewrite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_selection() {
        let registry = RegistryContext::default();
        let group = InstanceGroup::new("q1")
            .with_variant(Instance::new("q1", 0))
            .with_variant(Instance::new("q1", 2).with_rid("swap"));
        let ctx = EvalContext::new(&group, &registry);
        assert!(ctx.is_unrewritten());
        assert_eq!(ctx.instance().map(|i| i.key.vid), Some(0));

        let swapped = ctx.with_rewrite("swap");
        assert_eq!(swapped.instance().map(|i| i.key.vid), Some(2));
        assert!(ctx.with_rewrite("missing").instance().is_none());
    }
}
