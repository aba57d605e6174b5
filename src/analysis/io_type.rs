//! Relation IO classification from the program's directives.

use crate::analysis::RelationDetails;
use crate::data::ast::{DirectiveKind, Program, RelationId};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Debug, Default)]
pub struct IoTypes {
    inputs: BTreeSet<RelationId>,
    outputs: BTreeSet<RelationId>,
    limit_sizes: BTreeMap<RelationId, i64>,
}

impl IoTypes {
    pub fn compute(program: &Program, details: &RelationDetails) -> Self {
        let mut io = IoTypes::default();
        for directive in &program.directives {
            let Some(relation) = details.relation(&directive.relation) else {
                continue;
            };
            match directive.kind {
                DirectiveKind::Input => {
                    io.inputs.insert(relation);
                }
                DirectiveKind::Output | DirectiveKind::PrintSize => {
                    io.outputs.insert(relation);
                }
                DirectiveKind::LimitSize => {
                    let limit = directive
                        .params
                        .get("n")
                        .and_then(|n| n.parse().ok())
                        .unwrap_or(0);
                    io.limit_sizes.insert(relation, limit);
                }
            }
        }
        io
    }

    pub fn is_input(&self, relation: RelationId) -> bool {
        self.inputs.contains(&relation)
    }

    pub fn is_output(&self, relation: RelationId) -> bool {
        self.outputs.contains(&relation)
    }

    pub fn is_limit_size(&self, relation: RelationId) -> bool {
        self.limit_sizes.contains_key(&relation)
    }

    pub fn limit_size(&self, relation: RelationId) -> Option<i64> {
        self.limit_sizes.get(&relation).copied()
    }
}
