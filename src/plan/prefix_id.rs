//! Projection and variable name generator

use std::collections::BTreeMap;

/// Generates unique names for one optimization run.
///
/// Descriptive mode keeps a counter per prefix (`scan_0`, `scan_1`,
/// `filter_0`). Compact mode shares one counter (`p0`, `p1`).
#[derive(Debug, Clone)]
pub struct PrefixId {
    descriptive: bool,
    per_prefix: BTreeMap<String, u64>,
    shared: u64,
}

impl PrefixId {
    pub fn new(descriptive: bool) -> Self {
        Self {
            descriptive,
            per_prefix: BTreeMap::new(),
            shared: 0,
        }
    }

    /// Returns the next unused name for `prefix`
    pub fn next_id(&mut self, prefix: &str) -> String {
        if self.descriptive {
            let counter = self.per_prefix.entry(prefix.to_string()).or_insert(0);
            let id = format!("{}_{}", prefix, counter);
            *counter += 1;
            id
        } else {
            let id = format!("p{}", self.shared);
            self.shared += 1;
            id
        }
    }

    pub fn is_descriptive(&self) -> bool {
        self.descriptive
    }
}

impl Default for PrefixId {
    fn default() -> Self {
        Self::new(true)
    }
}
