//! The relation schedule: for each topological step, the relations whose
//! last use is that step. The stratum compiler clears them once the step
//! finishes; output relations are never expired.

use crate::analysis::io_type::IoTypes;
use crate::analysis::scc_graph::SccGraph;
use crate::analysis::{literal_relation_names, RelationDetails};
use crate::data::ast::{Program, RelationId};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Debug)]
pub struct ScheduleStep {
    expired: BTreeSet<RelationId>,
}

impl ScheduleStep {
    pub fn expired(&self) -> &BTreeSet<RelationId> {
        &self.expired
    }
}

#[derive(Clone, Debug)]
pub struct RelationSchedule {
    steps: Vec<ScheduleStep>,
}

impl RelationSchedule {
    pub fn compute(
        program: &Program,
        details: &RelationDetails,
        sccs: &SccGraph,
        io: &IoTypes,
    ) -> Self {
        // A relation is used at every step whose stratum contains a clause
        // mentioning it, and at the step of its own stratum.
        let mut last_use: BTreeMap<RelationId, usize> = BTreeMap::new();
        let order = sccs.topological_order();

        for (step, &scc) in order.iter().enumerate() {
            for &relation in sccs.internal_relations(scc) {
                last_use.insert(relation, step);
                for &clause_id in details.clauses(relation) {
                    let clause = &program.clauses[clause_id];
                    let mut mentioned = Vec::new();
                    for lit in &clause.body {
                        literal_relation_names(lit, &mut mentioned);
                    }
                    for name in mentioned {
                        if let Some(dep) = details.relation(&name) {
                            let slot = last_use.entry(dep).or_insert(step);
                            *slot = (*slot).max(step);
                        }
                    }
                }
            }
        }

        let steps = (0..order.len())
            .map(|step| ScheduleStep {
                expired: last_use
                    .iter()
                    .filter(|&(&rel, &last)| last == step && !io.is_output(rel))
                    .map(|(&rel, _)| rel)
                    .collect(),
            })
            .collect();

        RelationSchedule { steps }
    }

    pub fn step(&self, index: usize) -> &ScheduleStep {
        &self.steps[index]
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
