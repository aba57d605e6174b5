//! Which clauses participate in a fixpoint: a clause is recursive when some
//! body atom's relation shares a stratum with the head's relation.

use crate::analysis::scc_graph::SccGraph;
use crate::analysis::RelationDetails;
use crate::data::ast::{ClauseId, Literal, Program};
use std::collections::BTreeSet;

#[derive(Clone, Debug)]
pub struct RecursiveClauses {
    recursive: BTreeSet<ClauseId>,
}

impl RecursiveClauses {
    pub fn compute(program: &Program, details: &RelationDetails, sccs: &SccGraph) -> Self {
        let mut recursive = BTreeSet::new();
        for (clause_id, clause) in &program.clauses {
            let Some(head) = details.relation(&clause.head.name) else {
                continue;
            };
            let head_scc = sccs.scc_of(head);
            let in_head_scc = clause.body.iter().any(|lit| match lit {
                Literal::Atom(atom) => details
                    .relation(&atom.name)
                    .is_some_and(|rel| sccs.scc_of(rel) == head_scc),
                _ => false,
            });
            if in_head_scc {
                recursive.insert(clause_id);
            }
        }
        RecursiveClauses { recursive }
    }

    pub fn recursive(&self, clause: ClauseId) -> bool {
        self.recursive.contains(&clause)
    }
}
