//! Builders for small test programs and walkers over the emitted RAM.

use crate::analysis::Analyses;
use crate::config::Config;
use crate::data::ast::*;
use crate::data::ram::{Condition, Expr, Operation, Statement};
use crate::{lower, Error, LoweredUnit};
use id_collections::IdVec;
use std::collections::BTreeMap;

pub fn var(name: &str) -> Argument {
    Argument::Var(name.to_owned())
}

pub fn num(value: i64) -> Argument {
    Argument::Number(NumericConstant::unresolved(value.to_string()))
}

pub fn atom(name: &str, args: Vec<Argument>) -> Atom {
    Atom {
        name: QualifiedName::from(name),
        args,
    }
}

pub fn pos(atom: Atom) -> Literal {
    Literal::Atom(atom)
}

pub fn clause(head: Atom, body: Vec<Literal>) -> Clause {
    Clause {
        head,
        body,
        kind: ClauseKind::Plain,
        execution_plan: None,
        src_loc: SrcLoc::default(),
    }
}

pub fn relation(name: &str, arity: usize) -> Relation {
    let attributes = (0..arity)
        .map(|i| Attribute {
            name: format!("x{}", i),
            type_name: "number".to_owned(),
        })
        .collect();
    Relation {
        name: QualifiedName::from(name),
        attributes,
        representation: Representation::Default,
        functional_dependencies: Vec::new(),
        src_loc: SrcLoc::default(),
    }
}

pub fn directive(kind: DirectiveKind, relation: &str) -> Directive {
    Directive {
        kind,
        relation: QualifiedName::from(relation),
        params: BTreeMap::new(),
    }
}

pub fn program(
    relations: Vec<Relation>,
    clauses: Vec<Clause>,
    directives: Vec<Directive>,
) -> Program {
    Program {
        relations: IdVec::from_vec(relations),
        clauses: IdVec::from_vec(clauses),
        directives,
    }
}

pub fn lower_program(program: Program) -> Result<LoweredUnit, Error> {
    let analyses = Analyses::compute(&program);
    lower(program, &analyses, &Config::default())
}

pub fn lower_with(
    program: Program,
    analyses: Analyses,
    config: Config,
) -> Result<LoweredUnit, Error> {
    lower(program, &analyses, &config)
}

// --- RAM walkers -----------------------------------------------------------

/// Every statement in the tree, pre-order, descending through wrappers.
pub fn all_statements(stmt: &Statement) -> Vec<&Statement> {
    let mut out = Vec::new();
    collect_statements(stmt, &mut out);
    out
}

fn collect_statements<'a>(stmt: &'a Statement, out: &mut Vec<&'a Statement>) {
    out.push(stmt);
    match stmt {
        Statement::Sequence(stmts) | Statement::Parallel(stmts) => {
            for stmt in stmts {
                collect_statements(stmt, out);
            }
        }
        Statement::Loop(body) => collect_statements(body, out),
        Statement::LogRelationTimer { inner, .. }
        | Statement::LogTimer { inner, .. }
        | Statement::DebugInfo { inner, .. } => collect_statements(inner, out),
        _ => {}
    }
}

/// Every query operation in the tree.
pub fn queries(stmt: &Statement) -> Vec<&Operation> {
    all_statements(stmt)
        .into_iter()
        .filter_map(|stmt| match stmt {
            Statement::Query(op) => Some(op),
            _ => None,
        })
        .collect()
}

/// Every operation nested beneath (and including) `op`, outermost first.
pub fn all_operations(op: &Operation) -> Vec<&Operation> {
    let mut out = Vec::new();
    let mut current = Some(op);
    while let Some(op) = current {
        out.push(op);
        current = match op {
            Operation::Scan { inner, .. }
            | Operation::IndexScan { inner, .. }
            | Operation::UnpackRecord { inner, .. }
            | Operation::Aggregate { inner, .. }
            | Operation::NestedIntrinsic { inner, .. }
            | Operation::Filter { inner, .. }
            | Operation::Break { inner, .. } => Some(inner),
            Operation::Insert { .. } | Operation::GuardedInsert { .. } => None,
        };
    }
    out
}

/// Relations scanned by the query, outermost first.
pub fn scanned_relations(op: &Operation) -> Vec<String> {
    all_operations(op)
        .into_iter()
        .filter_map(|op| match op {
            Operation::Scan { relation, .. } | Operation::IndexScan { relation, .. } => {
                Some(relation.clone())
            }
            _ => None,
        })
        .collect()
}

/// The relation the query ultimately inserts into.
pub fn insert_target(op: &Operation) -> Option<&str> {
    all_operations(op).into_iter().find_map(|op| match op {
        Operation::Insert { relation, .. } | Operation::GuardedInsert { relation, .. } => {
            Some(relation.as_str())
        }
        _ => None,
    })
}

/// All conditions attached anywhere in the query, flattening conjunctions.
pub fn all_conditions(op: &Operation) -> Vec<&Condition> {
    let mut out = Vec::new();
    for op in all_operations(op) {
        match op {
            Operation::Filter { condition, .. }
            | Operation::Break { condition, .. }
            | Operation::Aggregate { condition, .. }
            | Operation::GuardedInsert { condition, .. } => flatten_condition(condition, &mut out),
            _ => {}
        }
    }
    out
}

fn flatten_condition<'a>(cond: &'a Condition, out: &mut Vec<&'a Condition>) {
    out.push(cond);
    match cond {
        Condition::Conjunction(lhs, rhs) => {
            flatten_condition(lhs, out);
            flatten_condition(rhs, out);
        }
        Condition::Negation(inner) => flatten_condition(inner, out),
        _ => {}
    }
}

/// Checks that every `TupleElement` reference sits beneath the operation
/// introducing its level.
pub fn assert_levels_scoped(op: &Operation) {
    fn exprs_in_condition<'a>(cond: &'a Condition, out: &mut Vec<&'a Expr>) {
        match cond {
            Condition::True | Condition::EmptinessCheck(_) => {}
            Condition::Conjunction(lhs, rhs) => {
                exprs_in_condition(lhs, out);
                exprs_in_condition(rhs, out);
            }
            Condition::Negation(inner) => exprs_in_condition(inner, out),
            Condition::Constraint { lhs, rhs, .. } => {
                out.push(lhs);
                out.push(rhs);
            }
            Condition::ExistenceCheck { values, .. } => out.extend(values.iter()),
        }
    }

    fn check_exprs(exprs: &[&Expr], in_scope: &std::collections::BTreeSet<usize>) {
        for expr in exprs {
            check_expr(expr, in_scope);
        }
    }

    fn check_expr(expr: &Expr, in_scope: &std::collections::BTreeSet<usize>) {
        match expr {
            Expr::TupleElement { level, .. } => {
                assert!(in_scope.contains(level), "level {} out of scope", level);
            }
            Expr::Intrinsic { args, .. }
            | Expr::UserDefined { args, .. }
            | Expr::PackRecord(args) => {
                for arg in args {
                    check_expr(arg, in_scope);
                }
            }
            _ => {}
        }
    }

    fn walk(op: &Operation, mut in_scope: std::collections::BTreeSet<usize>) {
        match op {
            Operation::Scan { level, inner, .. } => {
                assert!(in_scope.insert(*level), "level {} introduced twice", level);
                walk(inner, in_scope);
            }
            Operation::IndexScan {
                level,
                pattern,
                inner,
                ..
            } => {
                check_exprs(&pattern.iter().collect::<Vec<_>>(), &in_scope);
                assert!(in_scope.insert(*level));
                walk(inner, in_scope);
            }
            Operation::UnpackRecord {
                level,
                source,
                inner,
                ..
            } => {
                check_expr(source, &in_scope);
                assert!(in_scope.insert(*level));
                walk(inner, in_scope);
            }
            Operation::Aggregate {
                level,
                target,
                condition,
                inner,
                ..
            } => {
                assert!(in_scope.insert(*level));
                check_expr(target, &in_scope);
                let mut exprs = Vec::new();
                exprs_in_condition(condition, &mut exprs);
                check_exprs(&exprs, &in_scope);
                walk(inner, in_scope);
            }
            Operation::NestedIntrinsic {
                level,
                args,
                inner,
                ..
            } => {
                check_exprs(&args.iter().collect::<Vec<_>>(), &in_scope);
                assert!(in_scope.insert(*level));
                walk(inner, in_scope);
            }
            Operation::Filter { condition, inner } | Operation::Break { condition, inner } => {
                let mut exprs = Vec::new();
                exprs_in_condition(condition, &mut exprs);
                check_exprs(&exprs, &in_scope);
                walk(inner, in_scope);
            }
            Operation::Insert { values, .. } => {
                check_exprs(&values.iter().collect::<Vec<_>>(), &in_scope);
            }
            Operation::GuardedInsert {
                values, condition, ..
            } => {
                check_exprs(&values.iter().collect::<Vec<_>>(), &in_scope);
                let mut exprs = Vec::new();
                exprs_in_condition(condition, &mut exprs);
                check_exprs(&exprs, &in_scope);
            }
        }
    }

    walk(op, std::collections::BTreeSet::new());
}
