//! The analysis facade: read-only views over results precomputed before
//! lowering starts.
//!
//! Everything here is keyed by ids or names, never by references into the
//! AST, so the views stay valid across the pure pre-passes that rewrite
//! clause arguments. The facade is immutable for the whole lowering.

pub mod io_type;
pub mod polymorphism;
pub mod recursive_clauses;
pub mod relation_schedule;
pub mod scc_graph;
pub mod stats;
pub mod sum_type_branches;

use crate::data::ast::{Atom, ClauseId, Literal, Program, QualifiedName, RelationId};
use crate::data::operators::TypeAttribute;
use crate::names;
use id_collections::IdVec;
use std::collections::BTreeMap;

use self::io_type::IoTypes;
use self::polymorphism::{DefaultResolver, PolymorphicResolver};
use self::recursive_clauses::RecursiveClauses;
use self::relation_schedule::RelationSchedule;
use self::scc_graph::SccGraph;
use self::stats::AutoSchedulerStats;
use self::sum_type_branches::SumTypeBranches;

/// Name-to-id lookups and the per-relation clause lists.
#[derive(Clone, Debug)]
pub struct RelationDetails {
    by_name: BTreeMap<QualifiedName, RelationId>,
    clauses_of: IdVec<RelationId, Vec<ClauseId>>,
}

impl RelationDetails {
    pub fn compute(program: &Program) -> Self {
        let mut by_name = BTreeMap::new();
        for (id, relation) in &program.relations {
            by_name.insert(relation.name.clone(), id);
        }

        let mut clauses_of: IdVec<RelationId, Vec<ClauseId>> =
            IdVec::from_vec(vec![Vec::new(); program.relations.len()]);
        for (clause_id, clause) in &program.clauses {
            if let Some(&rel) = by_name.get(&clause.head.name) {
                clauses_of[rel].push(clause_id);
            }
        }

        RelationDetails {
            by_name,
            clauses_of,
        }
    }

    pub fn relation(&self, name: &QualifiedName) -> Option<RelationId> {
        self.by_name.get(name).copied()
    }

    pub fn clauses(&self, relation: RelationId) -> &[ClauseId] {
        &self.clauses_of[relation]
    }
}

/// Auxiliary (hidden) arity per relation; zero unless an instrumentation
/// analysis assigned extra columns.
#[derive(Clone, Debug, Default)]
pub struct AuxArity {
    overrides: BTreeMap<RelationId, usize>,
}

impl AuxArity {
    pub fn with_overrides(overrides: BTreeMap<RelationId, usize>) -> Self {
        AuxArity { overrides }
    }

    pub fn arity(&self, relation: RelationId) -> usize {
        self.overrides.get(&relation).copied().unwrap_or(0)
    }
}

/// Maps attribute type names to the qualifier strings recorded in RAM
/// relation descriptors.
#[derive(Clone, Debug)]
pub struct TypeEnvironment {
    attributes: BTreeMap<String, TypeAttribute>,
}

impl TypeEnvironment {
    pub fn with_primitives() -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert("number".to_owned(), TypeAttribute::Signed);
        attributes.insert("unsigned".to_owned(), TypeAttribute::Unsigned);
        attributes.insert("float".to_owned(), TypeAttribute::Float);
        attributes.insert("symbol".to_owned(), TypeAttribute::Symbol);
        TypeEnvironment { attributes }
    }

    pub fn register(&mut self, type_name: impl Into<String>, attribute: TypeAttribute) {
        self.attributes.insert(type_name.into(), attribute);
    }

    pub fn qualifier(&self, type_name: &str) -> String {
        let attribute = self
            .attributes
            .get(type_name)
            .copied()
            .unwrap_or(TypeAttribute::Signed);
        format!("{}:{}", attribute.prefix(), type_name)
    }
}

/// All analysis results lowering consumes, bundled.
pub struct Analyses {
    pub relation_details: RelationDetails,
    pub scc_graph: SccGraph,
    pub recursive_clauses: RecursiveClauses,
    pub relation_schedule: RelationSchedule,
    pub io_types: IoTypes,
    pub aux_arity: AuxArity,
    pub type_env: TypeEnvironment,
    pub sum_types: SumTypeBranches,
    pub polymorphism: Box<dyn PolymorphicResolver>,
    pub stats: Option<Box<dyn AutoSchedulerStats>>,
}

impl Analyses {
    /// Computes the graph-derived analyses from the program and defaults the
    /// externally-produced ones (monomorphic operator resolution, no ADTs
    /// registered, no statistics). Callers with richer analysis results
    /// overwrite the corresponding fields.
    pub fn compute(program: &Program) -> Self {
        let relation_details = RelationDetails::compute(program);
        let io_types = IoTypes::compute(program, &relation_details);
        let scc_graph = SccGraph::compute(program, &relation_details, &io_types);
        let recursive_clauses =
            RecursiveClauses::compute(program, &relation_details, &scc_graph);
        let relation_schedule =
            RelationSchedule::compute(program, &relation_details, &scc_graph, &io_types);

        Analyses {
            relation_details,
            scc_graph,
            recursive_clauses,
            relation_schedule,
            io_types,
            aux_arity: AuxArity::default(),
            type_env: TypeEnvironment::with_primitives(),
            sum_types: SumTypeBranches::default(),
            polymorphism: Box::new(DefaultResolver),
            stats: None,
        }
    }

}

/// Relation names mentioned by a literal, including atoms nested inside
/// aggregator bodies.
pub fn literal_relation_names(lit: &Literal, out: &mut Vec<QualifiedName>) {
    fn atom_names(atom: &Atom, out: &mut Vec<QualifiedName>) {
        out.push(atom.name.clone());
        for arg in &atom.args {
            arg.for_each(&mut |arg| {
                if let crate::data::ast::Argument::Aggregate(agg) = arg {
                    for lit in &agg.body {
                        match lit {
                            Literal::Atom(inner) | Literal::Negation(inner) => {
                                out.push(inner.name.clone());
                            }
                            Literal::Constraint(_) => {}
                        }
                    }
                }
            });
        }
    }

    match lit {
        Literal::Atom(atom) | Literal::Negation(atom) => atom_names(atom, out),
        Literal::Constraint(bc) => {
            for side in [&bc.lhs, &bc.rhs] {
                side.for_each(&mut |arg| {
                    if let crate::data::ast::Argument::Aggregate(agg) = arg {
                        for lit in &agg.body {
                            match lit {
                                Literal::Atom(inner) | Literal::Negation(inner) => {
                                    out.push(inner.name.clone());
                                }
                                Literal::Constraint(_) => {}
                            }
                        }
                    }
                });
            }
        }
    }
}

/// Evaluation arity of an atom as named in the input: info relations
/// evaluate with arity zero, and `@delta_`/`@new_` variants evaluate with
/// their base relation's auxiliary arity.
pub fn evaluation_arity(
    atom: &Atom,
    details: &RelationDetails,
    aux: &AuxArity,
) -> usize {
    let name = atom.name.to_string();
    if names::is_info_name(&name) {
        return 0;
    }
    let base = names::strip_evaluation_prefix(&name);
    match details.relation(&QualifiedName::from(base)) {
        Some(relation) => aux.arity(relation),
        None => 0,
    }
}
