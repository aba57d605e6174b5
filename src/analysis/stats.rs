//! Join-size statistics feeding the cost-based scheduler.
//!
//! The numbers come from a profiled run of the program; collecting them is
//! the profiler's job, so lowering sees only this interface. `unique_keys`
//! queries report the number of distinct projections onto the given key
//! columns under the given constant bindings.

use std::collections::{BTreeMap, BTreeSet};

pub trait AutoSchedulerStats {
    fn relation_size(&self, relation: &str) -> usize;

    fn recursive_unique_keys(
        &self,
        relation: &str,
        key_columns: &BTreeSet<usize>,
        constants: &BTreeMap<usize, String>,
    ) -> usize;

    fn non_recursive_unique_keys(
        &self,
        relation: &str,
        key_columns: &BTreeSet<usize>,
        constants: &BTreeMap<usize, String>,
    ) -> usize;
}

/// Statistics loaded from a profile, held as plain maps. Missing entries
/// report zero, which the scheduler treats as "no reduction".
#[derive(Clone, Debug, Default)]
pub struct ProfileStats {
    pub sizes: BTreeMap<String, usize>,
    pub recursive_keys: BTreeMap<(String, Vec<usize>, Vec<(usize, String)>), usize>,
    pub non_recursive_keys: BTreeMap<(String, Vec<usize>, Vec<(usize, String)>), usize>,
}

impl ProfileStats {
    fn key(
        relation: &str,
        key_columns: &BTreeSet<usize>,
        constants: &BTreeMap<usize, String>,
    ) -> (String, Vec<usize>, Vec<(usize, String)>) {
        (
            relation.to_owned(),
            key_columns.iter().copied().collect(),
            constants
                .iter()
                .map(|(&col, value)| (col, value.clone()))
                .collect(),
        )
    }
}

impl AutoSchedulerStats for ProfileStats {
    fn relation_size(&self, relation: &str) -> usize {
        self.sizes.get(relation).copied().unwrap_or(0)
    }

    fn recursive_unique_keys(
        &self,
        relation: &str,
        key_columns: &BTreeSet<usize>,
        constants: &BTreeMap<usize, String>,
    ) -> usize {
        self.recursive_keys
            .get(&Self::key(relation, key_columns, constants))
            .copied()
            .unwrap_or(0)
    }

    fn non_recursive_unique_keys(
        &self,
        relation: &str,
        key_columns: &BTreeSet<usize>,
        constants: &BTreeMap<usize, String>,
    ) -> usize {
        self.non_recursive_keys
            .get(&Self::key(relation, key_columns, constants))
            .copied()
            .unwrap_or(0)
    }
}
