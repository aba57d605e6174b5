//! The relational algebra program emitted by lowering.
//!
//! RAM trees are built bottom-up and exclusively owned by their parents;
//! there are no cycles and no back-references into the AST.

use crate::data::ast::Representation;
use crate::data::operators::{AggregateOp, ConstraintOp, FunctorOp};
use crate::symbol_table::{SymbolId, SymbolTable};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    SignedConstant(i64),
    UnsignedConstant(u64),
    FloatConstant(f64),
    StringConstant(SymbolId),
    TupleElement {
        level: usize,
        column: usize,
    },
    /// The unbound value, written ⊥; used for padding auxiliary columns and
    /// non-key columns of existence checks.
    UndefValue,
    Intrinsic {
        op: FunctorOp,
        args: Vec<Expr>,
    },
    UserDefined {
        name: String,
        args: Vec<Expr>,
    },
    PackRecord(Vec<Expr>),
    RelationSize(String),
}

impl Expr {
    pub fn tuple_element(level: usize, column: usize) -> Expr {
        Expr::TupleElement { level, column }
    }

    pub fn is_undef(&self) -> bool {
        matches!(self, Expr::UndefValue)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    True,
    Conjunction(Box<Condition>, Box<Condition>),
    Negation(Box<Condition>),
    Constraint {
        op: ConstraintOp,
        lhs: Expr,
        rhs: Expr,
    },
    EmptinessCheck(String),
    ExistenceCheck {
        relation: String,
        values: Vec<Expr>,
    },
}

impl Condition {
    pub fn eq(lhs: Expr, rhs: Expr) -> Condition {
        Condition::Constraint {
            op: ConstraintOp::Eq,
            lhs,
            rhs,
        }
    }

    pub fn negate(self) -> Condition {
        Condition::Negation(Box::new(self))
    }

    pub fn and(self, other: Condition) -> Condition {
        Condition::Conjunction(Box::new(self), Box::new(other))
    }

    /// Conjoins a term onto an optional condition, as the operator stack
    /// accumulates guards.
    pub fn conjoin(cond: Option<Condition>, term: Condition) -> Condition {
        match cond {
            None => term,
            Some(cond) => cond.and(term),
        }
    }

    /// Folds a list of conditions into one; an empty list is `True`.
    pub fn all(conds: Vec<Condition>) -> Condition {
        let mut result = None;
        for cond in conds {
            result = Some(Condition::conjoin(result, cond));
        }
        result.unwrap_or(Condition::True)
    }
}

/// The operation sublanguage nested inside a `Statement::Query`. Every
/// tuple-introducing operation records the level it introduces; references
/// `TupleElement { level, .. }` are valid only beneath that operation.
#[derive(Clone, Debug, PartialEq)]
pub enum Operation {
    Scan {
        relation: String,
        level: usize,
        inner: Box<Operation>,
    },
    /// Emitted by downstream index selection, never by lowering itself; part
    /// of the IR so the transformer and interpreter share one language.
    IndexScan {
        relation: String,
        level: usize,
        pattern: Vec<Expr>,
        inner: Box<Operation>,
    },
    UnpackRecord {
        level: usize,
        source: Expr,
        arity: usize,
        inner: Box<Operation>,
    },
    Aggregate {
        op: AggregateOp,
        relation: String,
        target: Expr,
        condition: Condition,
        level: usize,
        inner: Box<Operation>,
    },
    NestedIntrinsic {
        op: NestedIntrinsicOp,
        args: Vec<Expr>,
        level: usize,
        inner: Box<Operation>,
    },
    Filter {
        condition: Condition,
        inner: Box<Operation>,
    },
    Break {
        condition: Condition,
        inner: Box<Operation>,
    },
    Insert {
        relation: String,
        values: Vec<Expr>,
    },
    GuardedInsert {
        relation: String,
        values: Vec<Expr>,
        condition: Condition,
    },
}

impl Operation {
    pub fn filtered(condition: Condition, inner: Operation) -> Operation {
        Operation::Filter {
            condition,
            inner: Box::new(inner),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NestedIntrinsicOp {
    Range,
    URange,
    FRange,
}

impl NestedIntrinsicOp {
    pub fn name(self) -> &'static str {
        match self {
            NestedIntrinsicOp::Range => "range",
            NestedIntrinsicOp::URange => "urange",
            NestedIntrinsicOp::FRange => "frange",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    Sequence(Vec<Statement>),
    Parallel(Vec<Statement>),
    Loop(Box<Statement>),
    Exit(Condition),
    Call(String),
    Clear(String),
    Swap(String, String),
    Extend {
        target: String,
        source: String,
    },
    Io {
        relation: String,
        directives: BTreeMap<String, String>,
    },
    Query(Operation),
    LogRelationTimer {
        inner: Box<Statement>,
        message: String,
        relation: String,
    },
    LogTimer {
        inner: Box<Statement>,
        message: String,
    },
    LogSize {
        relation: String,
        message: String,
    },
    DebugInfo {
        inner: Box<Statement>,
        message: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelationDescriptor {
    pub name: String,
    pub arity: usize,
    pub aux_arity: usize,
    pub attribute_names: Vec<String>,
    pub attribute_type_qualifiers: Vec<String>,
    pub representation: Representation,
}

/// The finished RAM program: relation descriptors, the main statement, the
/// per-stratum subroutines, and the symbol table accumulated while
/// translating string constants.
#[derive(Debug)]
pub struct TranslationUnit {
    pub relations: Vec<RelationDescriptor>,
    pub main: Statement,
    pub subroutines: BTreeMap<String, Statement>,
    pub symbols: SymbolTable,
}
