//! The typed input program.
//!
//! Lowering treats the AST as read-mostly: the only writes are the two pure
//! pre-passes (`finalize_types`, `remove_adts`), both of which consume a
//! program and return a rewritten one.

use crate::data::operators::{AggregateOp, ConstraintOp, FunctorOp, NumericType, TypeAttribute};
use id_collections::{id_type, IdVec};
use itertools::Itertools;
use std::collections::BTreeMap;
use std::fmt;

#[id_type]
pub struct RelationId(pub usize);

#[id_type]
pub struct ClauseId(pub usize);

/// A dot-joined relation name, e.g. `graph.edge`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QualifiedName(Vec<String>);

impl QualifiedName {
    pub fn new(parts: Vec<String>) -> Self {
        QualifiedName(parts)
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl From<&str> for QualifiedName {
    fn from(name: &str) -> Self {
        QualifiedName(name.split('.').map(str::to_owned).collect())
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.iter().format("."))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SrcLoc {
    pub file: String,
    pub line: usize,
    pub column: usize,
}

impl Default for SrcLoc {
    fn default() -> Self {
        SrcLoc {
            file: "<unknown>".to_owned(),
            line: 0,
            column: 0,
        }
    }
}

impl fmt::Display for SrcLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}:{}]", self.file, self.line, self.column)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Representation {
    Default,
    Btree,
    Brie,
    EqRel,
    Provenance,
    Info,
}

#[derive(Clone, Debug)]
pub struct Attribute {
    pub name: String,
    pub type_name: String,
}

/// An attribute-level key constraint: the non-key columns are functionally
/// determined by the named key columns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionalDependency {
    pub keys: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct Relation {
    pub name: QualifiedName,
    pub attributes: Vec<Attribute>,
    pub representation: Representation,
    pub functional_dependencies: Vec<FunctionalDependency>,
    pub src_loc: SrcLoc,
}

impl Relation {
    pub fn arity(&self) -> usize {
        self.attributes.len()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum DirectiveKind {
    Input,
    Output,
    PrintSize,
    LimitSize,
}

#[derive(Clone, Debug)]
pub struct Directive {
    pub kind: DirectiveKind,
    pub relation: QualifiedName,
    pub params: BTreeMap<String, String>,
}

/// Numeric constants keep their source text; the final type decides how the
/// text is parsed during lowering.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NumericConstant {
    pub text: String,
    pub final_type: Option<NumericType>,
}

impl NumericConstant {
    pub fn unresolved(text: impl Into<String>) -> Self {
        NumericConstant {
            text: text.into(),
            final_type: None,
        }
    }

    pub fn signed(value: i64) -> Self {
        NumericConstant {
            text: value.to_string(),
            final_type: Some(NumericType::Signed),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordInit {
    pub args: Vec<Argument>,
}

/// A branch constructor of an algebraic data type. None of these survive the
/// ADT lowering pre-pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BranchInit {
    pub constructor: String,
    pub args: Vec<Argument>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntrinsicFunctor {
    pub op: FunctorOp,
    pub final_op: Option<FunctorOp>,
    pub final_return: Option<TypeAttribute>,
    pub args: Vec<Argument>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserDefinedFunctor {
    pub name: String,
    pub final_return: Option<TypeAttribute>,
    pub args: Vec<Argument>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Aggregator {
    pub op: AggregateOp,
    pub final_op: Option<AggregateOp>,
    pub target: Option<Box<Argument>>,
    pub body: Vec<Literal>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Argument {
    Var(String),
    Unnamed,
    Number(NumericConstant),
    Str(String),
    Nil,
    Record(RecordInit),
    Branch(BranchInit),
    Intrinsic(IntrinsicFunctor),
    UserDefined(UserDefinedFunctor),
    Aggregate(Aggregator),
}

impl Argument {
    pub fn is_constant(&self) -> bool {
        matches!(
            self,
            Argument::Number(_) | Argument::Str(_) | Argument::Nil
        )
    }

    /// Rewrites this argument bottom-up: children first, then the node
    /// itself.
    pub fn map(self, f: &mut impl FnMut(Argument) -> Argument) -> Argument {
        let mapped_children = match self {
            Argument::Record(rec) => Argument::Record(RecordInit {
                args: rec.args.into_iter().map(|arg| arg.map(f)).collect(),
            }),
            Argument::Branch(branch) => Argument::Branch(BranchInit {
                constructor: branch.constructor,
                args: branch.args.into_iter().map(|arg| arg.map(f)).collect(),
            }),
            Argument::Intrinsic(IntrinsicFunctor {
                op,
                final_op,
                final_return,
                args,
            }) => Argument::Intrinsic(IntrinsicFunctor {
                op,
                final_op,
                final_return,
                args: args.into_iter().map(|arg| arg.map(f)).collect(),
            }),
            Argument::UserDefined(UserDefinedFunctor {
                name,
                final_return,
                args,
            }) => Argument::UserDefined(UserDefinedFunctor {
                name,
                final_return,
                args: args.into_iter().map(|arg| arg.map(f)).collect(),
            }),
            Argument::Aggregate(agg) => Argument::Aggregate(Aggregator {
                op: agg.op,
                final_op: agg.final_op,
                target: agg.target.map(|target| Box::new(target.map(f))),
                body: agg
                    .body
                    .into_iter()
                    .map(|lit| lit.map_arguments(f))
                    .collect(),
            }),
            leaf => leaf,
        };
        f(mapped_children)
    }

    /// Visits this argument and every nested argument, parents before
    /// children.
    pub fn for_each<'a>(&'a self, f: &mut impl FnMut(&'a Argument)) {
        f(self);
        match self {
            Argument::Record(rec) => {
                for arg in &rec.args {
                    arg.for_each(f);
                }
            }
            Argument::Branch(branch) => {
                for arg in &branch.args {
                    arg.for_each(f);
                }
            }
            Argument::Intrinsic(functor) => {
                for arg in &functor.args {
                    arg.for_each(f);
                }
            }
            Argument::UserDefined(functor) => {
                for arg in &functor.args {
                    arg.for_each(f);
                }
            }
            Argument::Aggregate(agg) => {
                if let Some(target) = &agg.target {
                    target.for_each(f);
                }
                for lit in &agg.body {
                    lit.for_each_argument(f);
                }
            }
            Argument::Var(_)
            | Argument::Unnamed
            | Argument::Number(_)
            | Argument::Str(_)
            | Argument::Nil => {}
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Atom {
    pub name: QualifiedName,
    pub args: Vec<Argument>,
}

impl Atom {
    pub fn arity(&self) -> usize {
        self.args.len()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BinaryConstraint {
    pub op: ConstraintOp,
    pub final_op: Option<ConstraintOp>,
    pub lhs: Box<Argument>,
    pub rhs: Box<Argument>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Literal {
    Atom(Atom),
    Negation(Atom),
    Constraint(BinaryConstraint),
}

impl Literal {
    pub fn map_arguments(self, f: &mut impl FnMut(Argument) -> Argument) -> Literal {
        match self {
            Literal::Atom(atom) => Literal::Atom(Atom {
                name: atom.name,
                args: atom.args.into_iter().map(|arg| arg.map(f)).collect(),
            }),
            Literal::Negation(atom) => Literal::Negation(Atom {
                name: atom.name,
                args: atom.args.into_iter().map(|arg| arg.map(f)).collect(),
            }),
            Literal::Constraint(bc) => Literal::Constraint(BinaryConstraint {
                op: bc.op,
                final_op: bc.final_op,
                lhs: Box::new(bc.lhs.map(f)),
                rhs: Box::new(bc.rhs.map(f)),
            }),
        }
    }

    pub fn for_each_argument<'a>(&'a self, f: &mut impl FnMut(&'a Argument)) {
        match self {
            Literal::Atom(atom) | Literal::Negation(atom) => {
                for arg in &atom.args {
                    arg.for_each(f);
                }
            }
            Literal::Constraint(bc) => {
                bc.lhs.for_each(f);
                bc.rhs.for_each(f);
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClauseKind {
    Plain,
    /// The clause encodes a subsumption rule: body[0] is the dominated head
    /// atom and body[1] the dominating one.
    Subsumptive,
}

/// A user-supplied join order per clause version; positions are 1-based in
/// the surface syntax.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub orders: BTreeMap<usize, Vec<usize>>,
}

#[derive(Clone, Debug)]
pub struct Clause {
    pub head: Atom,
    pub body: Vec<Literal>,
    pub kind: ClauseKind,
    pub execution_plan: Option<ExecutionPlan>,
    pub src_loc: SrcLoc,
}

impl Clause {
    pub fn is_fact(&self) -> bool {
        self.body.is_empty()
    }

    /// Body atoms in source order (top level only; atoms inside aggregators
    /// do not participate in join ordering).
    pub fn body_atoms(&self) -> Vec<&Atom> {
        self.body
            .iter()
            .filter_map(|lit| match lit {
                Literal::Atom(atom) => Some(atom),
                _ => None,
            })
            .collect()
    }

    pub fn body_constraints(&self) -> Vec<&BinaryConstraint> {
        self.body
            .iter()
            .filter_map(|lit| match lit {
                Literal::Constraint(bc) => Some(bc),
                _ => None,
            })
            .collect()
    }

    pub fn map_arguments(self, f: &mut impl FnMut(Argument) -> Argument) -> Clause {
        Clause {
            head: Atom {
                name: self.head.name,
                args: self.head.args.into_iter().map(|arg| arg.map(f)).collect(),
            },
            body: self
                .body
                .into_iter()
                .map(|lit| lit.map_arguments(f))
                .collect(),
            kind: self.kind,
            execution_plan: self.execution_plan,
            src_loc: self.src_loc,
        }
    }

    pub fn for_each_argument<'a>(&'a self, f: &mut impl FnMut(&'a Argument)) {
        for arg in &self.head.args {
            arg.for_each(f);
        }
        for lit in &self.body {
            lit.for_each_argument(f);
        }
    }
}

#[derive(Clone, Debug)]
pub struct Program {
    pub relations: IdVec<RelationId, Relation>,
    pub clauses: IdVec<ClauseId, Clause>,
    pub directives: Vec<Directive>,
}

// Display renders the surface syntax; the strings end up in RAM debug-info
// nodes and profile log messages.

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Var(name) => write!(f, "{}", name),
            Argument::Unnamed => write!(f, "_"),
            Argument::Number(num) => write!(f, "{}", num.text),
            Argument::Str(text) => write!(f, "{:?}", text),
            Argument::Nil => write!(f, "nil"),
            Argument::Record(rec) => write!(f, "[{}]", rec.args.iter().format(", ")),
            Argument::Branch(branch) => {
                write!(f, "${}({})", branch.constructor, branch.args.iter().format(", "))
            }
            Argument::Intrinsic(functor) => {
                let op = functor.final_op.unwrap_or(functor.op);
                write!(f, "{}({})", op, functor.args.iter().format(", "))
            }
            Argument::UserDefined(functor) => {
                write!(f, "@{}({})", functor.name, functor.args.iter().format(", "))
            }
            Argument::Aggregate(agg) => {
                let op = agg.final_op.unwrap_or(agg.op);
                write!(f, "{}", op)?;
                if let Some(target) = &agg.target {
                    write!(f, " {}", target)?;
                }
                write!(f, " : {{ {} }}", agg.body.iter().format(", "))
            }
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.args.iter().format(", "))
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Atom(atom) => write!(f, "{}", atom),
            Literal::Negation(atom) => write!(f, "!{}", atom),
            Literal::Constraint(bc) => {
                let op = bc.final_op.unwrap_or(bc.op);
                write!(f, "{} {} {}", bc.lhs, op, bc.rhs)
            }
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.body.is_empty() {
            write!(f, "{}.", self.head)
        } else {
            write!(f, "{} :- {}.", self.head, self.body.iter().format(", "))
        }
    }
}
