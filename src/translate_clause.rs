//! Lowers one clause to a single RAM query.
//!
//! The operation tree is assembled bottom-up: the insertion first, then body
//! constraint filters, variable-binding equalities, generator levels, the
//! scan/unpack levels that introduce variables, and finally the entry filter.
//! Each tuple-introducing operation takes the next level in the order it was
//! indexed, so emitted `TupleElement` references are always in scope.

use crate::auto_schedule;
use crate::context::Context;
use crate::data::ast::{
    Argument, Atom, BranchInit, Clause, ClauseKind, Literal, RecordInit, RelationId,
};
use crate::data::operators::{ConstraintOp, FunctorOp, NumericType};
use crate::data::ram::{self, Condition, NestedIntrinsicOp, Operation, Statement};
use crate::log_statement;
use crate::names;
use crate::translate_value::{translate_constant, translate_constraint, translate_value};
use crate::value_index::{Location, ValueIndex};
use crate::Error;
use std::collections::BTreeSet;
use std::ptr;

/// How atom names are resolved during translation. `Default` covers plain
/// and semi-naive translation; the subsumption modes redirect the head and
/// the dominated/dominating atoms of a subsumptive clause into the
/// `@reject_`/`@delete_` staging relations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TranslationMode {
    Default,
    SubsumeRejectNewCurrent,
    SubsumeRejectNewNew,
    SubsumeDeleteCurrentDelta,
    SubsumeDeleteCurrentCurrent,
}

impl TranslationMode {
    fn is_delete(self) -> bool {
        matches!(
            self,
            TranslationMode::SubsumeDeleteCurrentDelta
                | TranslationMode::SubsumeDeleteCurrentCurrent
        )
    }
}

/// Translates a non-recursive clause.
pub fn translate_clause(
    ctx: &Context,
    clause: &Clause,
    mode: TranslationMode,
) -> Result<Statement, Error> {
    ClauseTranslator::new(ctx, mode).translate(clause)
}

/// Translates one version of a recursive clause: the version-slot atom of
/// the recursive-atom subsequence reads `@delta_`, the head writes `@new_`,
/// and re-derivations are blocked by negations added to the body.
pub fn translate_recursive_clause(
    ctx: &Context,
    clause: &Clause,
    scc: &BTreeSet<RelationId>,
    version: usize,
    mode: TranslationMode,
) -> Result<Statement, Error> {
    let scc_atoms = clause
        .body_atoms()
        .into_iter()
        .filter(|atom| {
            ctx.analyses
                .relation_details
                .relation(&atom.name)
                .is_some_and(|rel| scc.contains(&rel))
        })
        .collect::<Vec<_>>();

    let mut translator = ClauseTranslator::new(ctx, mode);
    translator.scc_atoms = scc_atoms;
    translator.version = version;

    let mut rule = translator.translate(clause)?;

    if ctx.config.profile {
        let relation_name = names::concrete_name(&clause.head.name);
        let clause_text = log_statement::stringify(&clause.to_string());
        let message = log_statement::t_recursive_rule(
            &relation_name,
            version,
            &clause.src_loc,
            &clause_text,
        );
        rule = Statement::LogRelationTimer {
            inner: Box::new(rule),
            message,
            relation: names::new_name(&clause.head.name),
        };
    }

    rule = Statement::DebugInfo {
        inner: Box::new(rule),
        message: format!("{}\nin file {}", clause, clause.src_loc),
    };

    Ok(Statement::Sequence(vec![rule]))
}

/// An operation level recorded during indexing. Levels are assigned in push
/// order; emission walks the list backwards so inner levels wrap first.
enum Operator<'c> {
    Scan {
        atom: &'c Atom,
    },
    UnpackRecord {
        record: &'c RecordInit,
        source: Location,
    },
    /// Outer level of an ADT branch: column 0 is the branch tag, column 1
    /// the payload.
    UnpackBranch {
        branch: &'c BranchInit,
        source: Location,
    },
    /// Inner payload level of a non-simple branch; always directly preceded
    /// by its `UnpackBranch`.
    UnpackBranchArgs {
        branch: &'c BranchInit,
    },
}

pub struct ClauseTranslator<'a, 'c> {
    ctx: &'a Context<'a>,
    mode: TranslationMode,
    version: usize,
    scc_atoms: Vec<&'c Atom>,
    operators: Vec<Operator<'c>>,
    generators: Vec<&'c Argument>,
    index: ValueIndex<'c>,
}

impl<'a, 'c> ClauseTranslator<'a, 'c> {
    pub fn new(ctx: &'a Context<'a>, mode: TranslationMode) -> Self {
        ClauseTranslator {
            ctx,
            mode,
            version: 0,
            scc_atoms: Vec::new(),
            operators: Vec::new(),
            generators: Vec::new(),
            index: ValueIndex::new(),
        }
    }

    fn is_recursive(&self) -> bool {
        !self.scc_atoms.is_empty()
    }

    pub fn translate(&mut self, clause: &'c Clause) -> Result<Statement, Error> {
        if clause.is_fact() {
            debug_assert!(!self.is_recursive());
            return Ok(Statement::Query(self.create_insertion(clause)?));
        }

        self.index_clause(clause)?;

        let mut op = self.create_insertion(clause)?;
        op = self.add_body_literal_constraints(clause, op)?;
        op = self.add_variable_binding_constraints(op);
        op = self.add_generator_levels(clause, op)?;
        op = self.add_variable_introductions(clause, op)?;
        op = self.add_entry_point(clause, op);
        Ok(Statement::Query(op))
    }

    /// Physical name an atom reads or writes under the current mode and
    /// version.
    fn clause_atom_name(&self, clause: &Clause, atom: &Atom) -> String {
        if clause.kind == ClauseKind::Subsumptive {
            let dominated = subsumptive_body_atom(clause, 0);
            let dominating = subsumptive_body_atom(clause, 1);

            if ptr::eq(&clause.head, atom) {
                return if self.mode.is_delete() {
                    names::delete_name(&atom.name)
                } else {
                    names::reject_name(&atom.name)
                };
            }

            if dominated.is_some_and(|dominated| ptr::eq(dominated, atom)) {
                return if self.mode.is_delete() {
                    names::concrete_name(&atom.name)
                } else {
                    names::new_name(&atom.name)
                };
            }

            if dominating.is_some_and(|dominating| ptr::eq(dominating, atom)) {
                return match self.mode {
                    TranslationMode::SubsumeRejectNewCurrent
                    | TranslationMode::SubsumeDeleteCurrentCurrent => {
                        names::concrete_name(&atom.name)
                    }
                    TranslationMode::SubsumeDeleteCurrentDelta => names::delta_name(&atom.name),
                    _ => names::new_name(&atom.name),
                };
            }

            if self.is_recursive()
                && self
                    .scc_atoms
                    .get(self.version + 1)
                    .is_some_and(|&slot| ptr::eq(slot, atom))
            {
                return names::delta_name(&atom.name);
            }
        }

        if !self.is_recursive() {
            return names::concrete_name(&atom.name);
        }
        if ptr::eq(&clause.head, atom) {
            return names::new_name(&atom.name);
        }
        if self
            .scc_atoms
            .get(self.version)
            .is_some_and(|&slot| ptr::eq(slot, atom))
        {
            return names::delta_name(&atom.name);
        }
        names::concrete_name(&atom.name)
    }

    // --- Insertion ---------------------------------------------------------

    fn create_insertion(&self, clause: &Clause) -> Result<Operation, Error> {
        let head = &clause.head;
        let relation = self.clause_atom_name(clause, head);

        let values = head
            .args
            .iter()
            .map(|arg| translate_value(self.ctx, &self.index, arg))
            .collect::<Result<Vec<_>, _>>()?;

        // A proposition is inserted at most once.
        if head.arity() == 0 {
            return Ok(Operation::filtered(
                Condition::EmptinessCheck(relation.clone()),
                Operation::Insert { relation, values },
            ));
        }

        if let Some(condition) = self.functional_dependency_guard(clause)? {
            return Ok(Operation::GuardedInsert {
                relation,
                values,
                condition,
            });
        }

        Ok(Operation::Insert { relation, values })
    }

    /// The guard for a head relation with functional dependencies: one
    /// negated existence check per key set, with ⊥ in the non-key columns;
    /// doubled against the concrete relation in a recursive context.
    fn functional_dependency_guard(&self, clause: &Clause) -> Result<Option<Condition>, Error> {
        let head = &clause.head;
        let Ok(relation_id) = self.ctx.relation(&head.name) else {
            return Ok(None);
        };
        let relation = self.ctx.relation_decl(relation_id);
        if relation.functional_dependencies.is_empty() {
            return Ok(None);
        }

        let head_relation_name = self.clause_atom_name(clause, head);
        let mut dependencies = Vec::new();
        let mut seen_keys: Vec<BTreeSet<&str>> = Vec::new();

        for fd in &relation.functional_dependencies {
            let keys: BTreeSet<&str> = fd.keys.iter().map(String::as_str).collect();
            if seen_keys.contains(&keys) {
                continue;
            }
            seen_keys.push(keys.clone());

            let mut values = Vec::with_capacity(relation.arity());
            for (i, attribute) in relation.attributes.iter().enumerate() {
                if keys.contains(attribute.name.as_str()) {
                    values.push(translate_value(self.ctx, &self.index, &head.args[i])?);
                } else {
                    values.push(ram::Expr::UndefValue);
                }
            }

            if self.is_recursive() {
                dependencies.push(
                    Condition::ExistenceCheck {
                        relation: head_relation_name.clone(),
                        values: values.clone(),
                    }
                    .negate(),
                );
                dependencies.push(
                    Condition::ExistenceCheck {
                        relation: names::concrete_name(&relation.name),
                        values,
                    }
                    .negate(),
                );
            } else {
                dependencies.push(
                    Condition::ExistenceCheck {
                        relation: head_relation_name.clone(),
                        values,
                    }
                    .negate(),
                );
            }
        }

        Ok(Some(Condition::all(dependencies)))
    }

    // --- Constraints -------------------------------------------------------

    fn add_body_literal_constraints(
        &self,
        clause: &Clause,
        mut op: Operation,
    ) -> Result<Operation, Error> {
        for lit in &clause.body {
            if let Some(condition) = translate_constraint(self.ctx, &self.index, lit)? {
                op = Operation::filtered(condition, op);
            }
        }

        if clause.kind == ClauseKind::Subsumptive {
            if matches!(
                self.mode,
                TranslationMode::SubsumeRejectNewNew | TranslationMode::SubsumeDeleteCurrentCurrent
            ) {
                if let (Some(dominated), Some(dominating)) = (
                    subsumptive_body_atom(clause, 0),
                    subsumptive_body_atom(clause, 1),
                ) {
                    op = self.add_distinct(op, dominated, dominating)?;
                }
            }
            return Ok(op);
        }

        if self.is_recursive() {
            // Block re-derivation of tuples the concrete relation already
            // holds.
            if clause.head.arity() > 0 {
                op = self.add_negated_atom(op, &clause.head, names::concrete_name)?;
            }

            // Semi-naive ordering discipline: versions past this one handle
            // the newer delta combinations.
            for i in self.version + 1..self.scc_atoms.len() {
                op = self.add_negated_atom(op, self.scc_atoms[i], names::delta_name)?;
            }
        }

        Ok(op)
    }

    fn add_negated_atom(
        &self,
        op: Operation,
        atom: &Atom,
        name: impl Fn(&crate::data::ast::QualifiedName) -> String,
    ) -> Result<Operation, Error> {
        let relation = name(&atom.name);

        if atom.arity() == 0 {
            return Ok(Operation::filtered(Condition::EmptinessCheck(relation), op));
        }

        let values = atom
            .args
            .iter()
            .map(|arg| translate_value(self.ctx, &self.index, arg))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Operation::filtered(
            Condition::ExistenceCheck { relation, values }.negate(),
            op,
        ))
    }

    /// Requires the dominated and dominating tuples of a subsumptive clause
    /// to differ in at least one column.
    fn add_distinct(
        &self,
        op: Operation,
        dominated: &Atom,
        dominating: &Atom,
    ) -> Result<Operation, Error> {
        let mut conditions = Vec::new();
        for (a1, a2) in dominated.args.iter().zip(&dominating.args) {
            let lhs = translate_value(self.ctx, &self.index, a1)?;
            let rhs = translate_value(self.ctx, &self.index, a2)?;
            if lhs != rhs {
                conditions.push(Condition::eq(lhs, rhs));
            }
        }
        Ok(Operation::filtered(
            Condition::all(conditions).negate(),
            op,
        ))
    }

    fn add_variable_binding_constraints(&self, mut op: Operation) -> Operation {
        for references in self.index.var_references().values() {
            let mut refs = references.iter();
            let Some(&first) = refs.next() else {
                continue;
            };
            for &reference in refs {
                if !self.index.is_generator_level(reference.level) {
                    op = Operation::filtered(
                        Condition::eq(
                            ram::Expr::tuple_element(first.level, first.column),
                            ram::Expr::tuple_element(reference.level, reference.column),
                        ),
                        op,
                    );
                }
            }
        }
        op
    }

    // --- Generators --------------------------------------------------------

    fn add_generator_levels(
        &self,
        clause: &Clause,
        mut op: Operation,
    ) -> Result<Operation, Error> {
        for (slot, &generator) in self.generators.iter().enumerate().rev() {
            let level = self.operators.len() + slot;
            op = match generator {
                Argument::Aggregate(agg) => {
                    self.instantiate_aggregator(op, clause, agg, level)?
                }
                Argument::Intrinsic(functor) => {
                    let resolved = functor.final_op.unwrap_or(functor.op);
                    let nested_op = match resolved {
                        FunctorOp::Range => NestedIntrinsicOp::Range,
                        FunctorOp::URange => NestedIntrinsicOp::URange,
                        FunctorOp::FRange => NestedIntrinsicOp::FRange,
                        _ => unreachable!("only multi-result functors are generators"),
                    };
                    let args = functor
                        .args
                        .iter()
                        .map(|arg| translate_value(self.ctx, &self.index, arg))
                        .collect::<Result<_, _>>()?;
                    Operation::NestedIntrinsic {
                        op: nested_op,
                        args,
                        level,
                        inner: Box::new(op),
                    }
                }
                _ => unreachable!("unhandled generator kind"),
            };
        }
        Ok(op)
    }

    fn instantiate_aggregator(
        &self,
        op: Operation,
        clause: &Clause,
        agg: &crate::data::ast::Aggregator,
        level: usize,
    ) -> Result<Operation, Error> {
        let mut agg_cond: Option<Condition> = None;

        // Conditions of the sub-clause.
        for lit in &agg.body {
            if let Some(condition) = translate_constraint(self.ctx, &self.index, lit)? {
                agg_cond = Some(Condition::conjoin(agg_cond, condition));
            }
        }

        let agg_atom = single_aggregator_atom(agg)
            .ok_or_else(|| Error::MalformedAggregator(clause.to_string()))?;

        // Wire the generator's tuple to outer variables and constants.
        for (i, arg) in agg_atom.args.iter().enumerate() {
            if let Argument::Var(name) = arg {
                let references = self
                    .index
                    .var_references()
                    .get(name)
                    .cloned()
                    .unwrap_or_default();
                for reference in references {
                    if reference.level != level || reference.column != i {
                        agg_cond = Some(Condition::conjoin(
                            agg_cond,
                            Condition::eq(
                                ram::Expr::tuple_element(level, i),
                                ram::Expr::tuple_element(reference.level, reference.column),
                            ),
                        ));
                        break;
                    }
                }
            } else {
                let value = translate_value(self.ctx, &self.index, arg)?;
                if !value.is_undef() {
                    agg_cond = Some(Condition::conjoin(
                        agg_cond,
                        Condition::eq(ram::Expr::tuple_element(level, i), value),
                    ));
                }
            }
        }

        let target = match &agg.target {
            Some(target) => translate_value(self.ctx, &self.index, target)?,
            None => ram::Expr::UndefValue,
        };

        let agg_op = agg
            .final_op
            .ok_or_else(|| Error::UnresolvedAggregateOp(agg.op.to_string()))?;

        Ok(Operation::Aggregate {
            op: agg_op,
            relation: self.clause_atom_name(clause, agg_atom),
            target,
            condition: agg_cond.unwrap_or(Condition::True),
            level,
            inner: Box::new(op),
        })
    }

    // --- Variable introductions --------------------------------------------

    fn add_variable_introductions(
        &self,
        clause: &Clause,
        mut op: Operation,
    ) -> Result<Operation, Error> {
        let mut i = self.operators.len();
        while i > 0 {
            i -= 1;
            match &self.operators[i] {
                Operator::Scan { atom } => {
                    op = self.add_atom_scan(op, atom, clause, i)?;
                }
                Operator::UnpackRecord { record, source } => {
                    op = self.add_record_unpack(op, record, i, *source)?;
                }
                Operator::UnpackBranch { branch, source } => {
                    // Only simple branches appear without a payload level.
                    op = self.add_branch_unpack(op, branch, i, i, *source)?;
                }
                Operator::UnpackBranchArgs { branch } => {
                    let Operator::UnpackBranch { source, .. } = &self.operators[i - 1] else {
                        unreachable!("payload level without its branch level");
                    };
                    op = self.add_branch_unpack(op, branch, i - 1, i, *source)?;
                    i -= 1;
                }
            }
        }
        Ok(op)
    }

    fn add_atom_scan(
        &self,
        mut op: Operation,
        atom: &Atom,
        clause: &Clause,
        level: usize,
    ) -> Result<Operation, Error> {
        let head = &clause.head;

        op = self.add_constant_constraints(
            level,
            atom.args.iter().enumerate().collect(),
            op,
        )?;

        op = Operation::filtered(
            Condition::EmptinessCheck(self.clause_atom_name(clause, atom)).negate(),
            op,
        );

        let all_unnamed = atom
            .args
            .iter()
            .all(|arg| matches!(arg, Argument::Unnamed));

        if atom.arity() != 0 && !all_unnamed {
            // A nullary head needs only one witness; stop the scan as soon
            // as it has been derived.
            if head.arity() == 0 {
                op = Operation::Break {
                    condition: Condition::EmptinessCheck(self.clause_atom_name(clause, head))
                        .negate(),
                    inner: Box::new(op),
                };
            }

            op = Operation::Scan {
                relation: self.clause_atom_name(clause, atom),
                level,
                inner: Box::new(op),
            };
        }

        Ok(op)
    }

    fn add_record_unpack(
        &self,
        mut op: Operation,
        record: &RecordInit,
        level: usize,
        source: Location,
    ) -> Result<Operation, Error> {
        op = self.add_constant_constraints(
            level,
            record.args.iter().enumerate().collect(),
            op,
        )?;
        Ok(Operation::UnpackRecord {
            level,
            source: ram::Expr::tuple_element(source.level, source.column),
            arity: record.args.len(),
            inner: Box::new(op),
        })
    }

    /// Unpacks an ADT branch. A simple branch (arity = 1) uses a single
    /// level holding the tag at column 0 and the payload at column 1; any
    /// other branch nests a payload record beneath the tag level.
    fn add_branch_unpack(
        &self,
        mut op: Operation,
        branch: &BranchInit,
        branch_level: usize,
        payload_level: usize,
        source: Location,
    ) -> Result<Operation, Error> {
        let branch_id = self
            .ctx
            .analyses
            .sum_types
            .branch_id(branch)
            .ok_or_else(|| Error::UnknownConstructor(branch.constructor.clone()))? as i64;

        op = Operation::filtered(
            Condition::eq(
                ram::Expr::tuple_element(branch_level, 0),
                ram::Expr::SignedConstant(branch_id),
            ),
            op,
        );

        let simple = self.ctx.analyses.sum_types.is_simple_branch(branch);
        if simple {
            // The payload sits next to the tag.
            op = self.add_constant_constraints(
                branch_level,
                branch.args.iter().enumerate().map(|(i, arg)| (i + 1, arg)).collect(),
                op,
            )?;
        } else {
            op = self.add_constant_constraints(
                payload_level,
                branch.args.iter().enumerate().collect(),
                op,
            )?;
            op = Operation::UnpackRecord {
                level: payload_level,
                source: ram::Expr::tuple_element(branch_level, 1),
                arity: branch.args.len(),
                inner: Box::new(op),
            };
        }

        Ok(Operation::UnpackRecord {
            level: branch_level,
            source: ram::Expr::tuple_element(source.level, source.column),
            arity: 2,
            inner: Box::new(op),
        })
    }

    fn add_constant_constraints(
        &self,
        level: usize,
        arguments: Vec<(usize, &Argument)>,
        mut op: Operation,
    ) -> Result<Operation, Error> {
        for (i, argument) in arguments {
            match argument {
                Argument::Number(constant) => {
                    let is_float = constant.final_type == Some(NumericType::Float);
                    op = Operation::filtered(
                        Condition::Constraint {
                            op: if is_float {
                                ConstraintOp::FEq
                            } else {
                                ConstraintOp::Eq
                            },
                            lhs: ram::Expr::tuple_element(level, i),
                            rhs: translate_constant(constant)?,
                        },
                        op,
                    );
                }
                Argument::Str(_) | Argument::Nil => {
                    op = Operation::filtered(
                        Condition::eq(
                            ram::Expr::tuple_element(level, i),
                            translate_value(self.ctx, &self.index, argument)?,
                        ),
                        op,
                    );
                }
                Argument::Branch(branch) if self.ctx.analyses.sum_types.is_enum(branch) => {
                    let branch_id = self
                        .ctx
                        .analyses
                        .sum_types
                        .branch_id(branch)
                        .ok_or_else(|| Error::UnknownConstructor(branch.constructor.clone()))?
                        as i64;
                    op = Operation::filtered(
                        Condition::eq(
                            ram::Expr::tuple_element(level, i),
                            ram::Expr::SignedConstant(branch_id),
                        ),
                        op,
                    );
                }
                _ => {}
            }
        }
        Ok(op)
    }

    fn add_entry_point(&self, clause: &Clause, op: Operation) -> Operation {
        // A recursive proposition already derived needs no further work.
        if self.is_recursive() && clause.head.arity() == 0 {
            return Operation::filtered(
                Condition::EmptinessCheck(names::concrete_name(&clause.head.name)),
                op,
            );
        }
        op
    }

    // --- Indexing ----------------------------------------------------------

    fn index_clause(&mut self, clause: &'c Clause) -> Result<(), Error> {
        self.index_atoms(clause)?;
        self.index_aggregators(clause)?;
        self.index_multi_result_functors(clause);
        Ok(())
    }

    fn index_atoms(&mut self, clause: &'c Clause) -> Result<(), Error> {
        for atom in self.atom_ordering(clause)? {
            let scan_level = self.add_operator_level(Operator::Scan { atom });
            self.index_node_arguments(
                scan_level,
                atom.args.iter().enumerate().collect(),
            );
        }
        Ok(())
    }

    fn index_node_arguments(&mut self, level: usize, args: Vec<(usize, &'c Argument)>) {
        for (i, arg) in args {
            match arg {
                Argument::Var(name) => {
                    self.index.add_var_reference(name, Location::new(level, i));
                }
                Argument::Record(record) => {
                    self.index
                        .set_record_definition(record, Location::new(level, i));
                    let unpack_level = self.add_operator_level(Operator::UnpackRecord {
                        record,
                        source: Location::new(level, i),
                    });
                    self.index_node_arguments(
                        unpack_level,
                        record.args.iter().enumerate().collect(),
                    );
                }
                Argument::Branch(branch) => {
                    // Enum constructors are plain constants; everything else
                    // introduces unpack levels.
                    if !self.ctx.analyses.sum_types.is_enum(branch) {
                        self.index
                            .set_branch_definition(branch, Location::new(level, i));
                        let unpack_level = self.add_operator_level(Operator::UnpackBranch {
                            branch,
                            source: Location::new(level, i),
                        });
                        if self.ctx.analyses.sum_types.is_simple_branch(branch) {
                            self.index_node_arguments(
                                unpack_level,
                                branch
                                    .args
                                    .iter()
                                    .enumerate()
                                    .map(|(i, arg)| (i + 1, arg))
                                    .collect(),
                            );
                        } else {
                            let payload_level = self
                                .add_operator_level(Operator::UnpackBranchArgs { branch });
                            self.index_node_arguments(
                                payload_level,
                                branch.args.iter().enumerate().collect(),
                            );
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn index_aggregators(&mut self, clause: &'c Clause) -> Result<(), Error> {
        let mut aggregators = Vec::new();
        collect_generators(clause, &mut |arg| {
            if matches!(arg, Argument::Aggregate(_)) {
                aggregators.push(arg);
            }
        });

        for &node in &aggregators {
            let level = self.add_generator_level(node);
            self.index.set_generator_location(node, Location::new(level, 0));
        }

        // Index the single body atom of each aggregator at its level.
        for &node in &aggregators {
            let Argument::Aggregate(agg) = node else {
                unreachable!()
            };
            let location = self.index.generator_location(node).unwrap();
            let atom = single_aggregator_atom(agg)
                .ok_or_else(|| Error::MalformedAggregator(clause.to_string()))?;
            for (i, arg) in atom.args.iter().enumerate() {
                if let Argument::Var(name) = arg {
                    self.index
                        .add_var_reference(name, Location::new(location.level, i));
                }
            }
        }

        // `v = <aggregator>` introduces `v` at the generator's location.
        for_each_literal(clause, &mut |lit| {
            if let Literal::Constraint(bc) = lit {
                if !bc.op.is_eq() {
                    return;
                }
                if let (Argument::Var(name), rhs @ Argument::Aggregate(_)) =
                    (bc.lhs.as_ref(), bc.rhs.as_ref())
                {
                    if let Some(location) = self.index.generator_location(rhs) {
                        self.index.add_var_reference(name, location);
                    }
                }
            }
        });

        Ok(())
    }

    fn index_multi_result_functors(&mut self, clause: &'c Clause) {
        let mut functors = Vec::new();
        collect_generators(clause, &mut |arg| {
            if let Argument::Intrinsic(functor) = arg {
                if functor.final_op.unwrap_or(functor.op).is_multi_result() {
                    functors.push(arg);
                }
            }
        });

        for &node in &functors {
            let level = self.add_generator_level(node);
            self.index.set_generator_location(node, Location::new(level, 0));
        }

        for_each_literal(clause, &mut |lit| {
            if let Literal::Constraint(bc) = lit {
                if !bc.op.is_eq() {
                    return;
                }
                if let (Argument::Var(name), rhs @ Argument::Intrinsic(_)) =
                    (bc.lhs.as_ref(), bc.rhs.as_ref())
                {
                    if let Some(location) = self.index.generator_location(rhs) {
                        self.index.add_var_reference(name, location);
                    }
                }
            }
        });
    }

    fn add_operator_level(&mut self, operator: Operator<'c>) -> usize {
        let level = self.operators.len() + self.generators.len();
        self.operators.push(operator);
        level
    }

    fn add_generator_level(&mut self, generator: &'c Argument) -> usize {
        let level = self.operators.len() + self.generators.len();
        self.generators.push(generator);
        level
    }

    // --- Join ordering -----------------------------------------------------

    fn atom_ordering(&self, clause: &'c Clause) -> Result<Vec<&'c Atom>, Error> {
        let atoms = clause.body_atoms();

        // An explicit plan for this version takes precedence.
        if let Some(plan) = &clause.execution_plan {
            if let Some(order) = plan.orders.get(&self.version) {
                return reorder_atoms(clause, &atoms, order);
            }
        }

        if self.ctx.config.auto_schedule
            && atoms.len() >= 2
            && self.ctx.analyses.stats.is_some()
        {
            let names = atoms
                .iter()
                .map(|atom| self.clause_atom_name(clause, atom))
                .collect::<Vec<_>>();
            let mut recursive_slots = BTreeSet::new();
            for (i, atom) in atoms.iter().enumerate() {
                if self
                    .scc_atoms
                    .iter()
                    .any(|&scc_atom| ptr::eq(scc_atom, *atom))
                {
                    recursive_slots.insert(i);
                }
            }
            let stats = self.ctx.analyses.stats.as_deref().unwrap();
            let order =
                auto_schedule::schedule_atoms(clause, &atoms, &names, &recursive_slots, stats)?;
            return Ok(order.into_iter().map(|i| atoms[i]).collect());
        }

        let order = self.ctx.config.sips.reorder(&atoms);
        Ok(order.into_iter().map(|i| atoms[i]).collect())
    }
}

/// Applies a user-supplied 1-based ordering.
fn reorder_atoms<'c>(
    clause: &Clause,
    atoms: &[&'c Atom],
    order: &[usize],
) -> Result<Vec<&'c Atom>, Error> {
    if order.len() != atoms.len() {
        return Err(Error::MalformedExecutionPlan(clause.to_string()));
    }
    order
        .iter()
        .map(|&position| {
            position
                .checked_sub(1)
                .and_then(|index| atoms.get(index).copied())
                .ok_or_else(|| Error::MalformedExecutionPlan(clause.to_string()))
        })
        .collect()
}

fn subsumptive_body_atom(clause: &Clause, position: usize) -> Option<&Atom> {
    match clause.body.get(position) {
        Some(Literal::Atom(atom)) => Some(atom),
        _ => None,
    }
}

fn single_aggregator_atom(agg: &crate::data::ast::Aggregator) -> Option<&Atom> {
    let mut atoms = agg.body.iter().filter_map(|lit| match lit {
        Literal::Atom(atom) => Some(atom),
        _ => None,
    });
    let atom = atoms.next()?;
    if atoms.next().is_some() {
        return None;
    }
    Some(atom)
}

/// Visits every argument of the clause in a fixed depth-first order; used to
/// assign generator levels deterministically.
fn collect_generators<'c>(clause: &'c Clause, f: &mut impl FnMut(&'c Argument)) {
    for arg in &clause.head.args {
        arg.for_each(f);
    }
    for lit in &clause.body {
        lit.for_each_argument(f);
    }
}

/// Visits every literal of the clause, including literals nested inside
/// aggregator bodies.
fn for_each_literal<'c>(clause: &'c Clause, f: &mut impl FnMut(&'c Literal)) {
    for lit in &clause.body {
        f(lit);
    }
    collect_generators(clause, &mut |arg| {
        if let Argument::Aggregate(agg) = arg {
            for lit in &agg.body {
                f(lit);
            }
        }
    });
}
