//! The SCC graph over relations: one strongly-connected component per
//! stratum, in topological (dependency-first) order.

use crate::analysis::io_type::IoTypes;
use crate::analysis::{literal_relation_names, RelationDetails};
use crate::data::ast::{Program, RelationId};
use crate::graph::{strongly_connected, Graph, NodeId};
use id_collections::id_type;
use std::collections::{BTreeMap, BTreeSet};

#[id_type]
pub struct SccId(pub usize);

#[derive(Clone, Debug)]
pub struct SccGraph {
    components: Vec<BTreeSet<RelationId>>,
    scc_of: BTreeMap<RelationId, SccId>,
    recursive: Vec<bool>,
    inputs: Vec<BTreeSet<RelationId>>,
    outputs: Vec<BTreeSet<RelationId>>,
    predecessors: Vec<BTreeSet<SccId>>,
}

impl SccGraph {
    pub fn compute(program: &Program, details: &RelationDetails, io: &IoTypes) -> Self {
        let num_relations = program.relations.len();

        // Dependency edges: the head relation depends on every relation its
        // body mentions, including atoms inside aggregators.
        let mut edges_out: Vec<BTreeSet<NodeId>> = vec![BTreeSet::new(); num_relations];
        let mut self_loops: BTreeSet<RelationId> = BTreeSet::new();
        for (_, clause) in &program.clauses {
            let Some(head) = details.relation(&clause.head.name) else {
                continue;
            };
            let mut mentioned = Vec::new();
            for lit in &clause.body {
                literal_relation_names(lit, &mut mentioned);
            }
            for name in mentioned {
                if let Some(dep) = details.relation(&name) {
                    edges_out[head.0].insert(NodeId(dep.0));
                    if dep == head {
                        self_loops.insert(head);
                    }
                }
            }
        }

        let graph = Graph {
            edges_out: edges_out
                .into_iter()
                .map(|succs| succs.into_iter().collect())
                .collect(),
        };

        let mut components = Vec::new();
        let mut scc_of = BTreeMap::new();
        for component in strongly_connected(&graph) {
            let id = SccId(components.len());
            let members: BTreeSet<RelationId> =
                component.into_iter().map(|NodeId(n)| RelationId(n)).collect();
            for &member in &members {
                scc_of.insert(member, id);
            }
            components.push(members);
        }

        let recursive = components
            .iter()
            .map(|members| {
                members.len() > 1 || members.iter().any(|rel| self_loops.contains(rel))
            })
            .collect();

        let inputs = components
            .iter()
            .map(|members| {
                members
                    .iter()
                    .copied()
                    .filter(|&rel| io.is_input(rel))
                    .collect()
            })
            .collect();
        let outputs = components
            .iter()
            .map(|members| {
                members
                    .iter()
                    .copied()
                    .filter(|&rel| io.is_output(rel))
                    .collect()
            })
            .collect();

        let mut predecessors: Vec<BTreeSet<SccId>> = vec![BTreeSet::new(); components.len()];
        for (src, succs) in graph.edges_out.iter().enumerate() {
            let src_scc = scc_of[&RelationId(src)];
            for &NodeId(dest) in succs {
                let dest_scc = scc_of[&RelationId(dest)];
                if dest_scc != src_scc {
                    predecessors[src_scc.0].insert(dest_scc);
                }
            }
        }

        SccGraph {
            components,
            scc_of,
            recursive,
            inputs,
            outputs,
            predecessors,
        }
    }

    pub fn num_sccs(&self) -> usize {
        self.components.len()
    }

    /// SCC indices in topological order: every stratum appears after its
    /// predecessors.
    pub fn topological_order(&self) -> Vec<SccId> {
        (0..self.num_sccs()).map(SccId).collect()
    }

    pub fn scc_of(&self, relation: RelationId) -> SccId {
        self.scc_of[&relation]
    }

    pub fn internal_relations(&self, scc: SccId) -> &BTreeSet<RelationId> {
        &self.components[scc.0]
    }

    pub fn internal_input_relations(&self, scc: SccId) -> &BTreeSet<RelationId> {
        &self.inputs[scc.0]
    }

    pub fn internal_output_relations(&self, scc: SccId) -> &BTreeSet<RelationId> {
        &self.outputs[scc.0]
    }

    pub fn is_recursive(&self, scc: SccId) -> bool {
        self.recursive[scc.0]
    }

    pub fn predecessors(&self, scc: SccId) -> &BTreeSet<SccId> {
        &self.predecessors[scc.0]
    }
}
