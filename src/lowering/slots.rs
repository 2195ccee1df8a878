//! Runtime slots and the shared runtime environment

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use super::shard::ShardFilter;
use crate::errors::{OptimizerError, OptimizerResult};

/// Name of the global slot holding the shard filter
pub const SHARD_FILTERER_SLOT: &str = "shardFilterer";

/// Runtime slot id
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SlotId(pub u32);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Monotonic slot id allocator; ids are never reused within one assembly
#[derive(Debug, Default)]
pub struct SlotIdGenerator {
    last: u32,
}

impl SlotIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate(&mut self) -> SlotId {
        self.last += 1;
        SlotId(self.last)
    }
}

/// Projection name to slot
pub type SlotVarMap = BTreeMap<String, SlotId>;

/// Value bound to a global slot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SharedBinding {
    ShardFilter(ShardFilter),
}

/// Global slots shared by every operator of one tree
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RuntimeEnvironment {
    slots: BTreeMap<String, SlotId>,
    bindings: BTreeMap<SlotId, SharedBinding>,
}

impl RuntimeEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates and binds a named global slot
    pub fn register_slot(
        &mut self,
        name: &str,
        binding: SharedBinding,
        generator: &mut SlotIdGenerator,
    ) -> OptimizerResult<SlotId> {
        if self.slots.contains_key(name) {
            return Err(OptimizerError::internal(format!(
                "global slot '{}' registered twice",
                name
            )));
        }
        let slot = generator.generate();
        self.slots.insert(name.to_string(), slot);
        self.bindings.insert(slot, binding);
        Ok(slot)
    }

    pub fn get_slot(&self, name: &str) -> Option<SlotId> {
        self.slots.get(name).copied()
    }

    pub fn binding(&self, slot: SlotId) -> Option<&SharedBinding> {
        self.bindings.get(&slot)
    }

    pub fn is_bound(&self, slot: SlotId) -> bool {
        self.bindings.contains_key(&slot)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Namespace;

    #[test]
    fn test_generator_is_monotonic() {
        let mut generator = SlotIdGenerator::new();
        assert_eq!(generator.generate(), SlotId(1));
        assert_eq!(generator.generate(), SlotId(2));
        assert_eq!(SlotId(2).to_string(), "s2");
    }

    #[test]
    fn test_register_once() {
        let mut generator = SlotIdGenerator::new();
        let mut env = RuntimeEnvironment::new();
        let filter = ShardFilter::new(Namespace::new("test", "items"), vec!["a".into()]);
        let slot = env
            .register_slot(SHARD_FILTERER_SLOT, SharedBinding::ShardFilter(filter.clone()), &mut generator)
            .unwrap();
        assert_eq!(env.get_slot(SHARD_FILTERER_SLOT), Some(slot));
        assert!(env.is_bound(slot));
        assert!(env
            .register_slot(SHARD_FILTERER_SLOT, SharedBinding::ShardFilter(filter), &mut generator)
            .is_err());
    }
}
