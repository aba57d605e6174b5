//! Operator vocabularies shared between the AST and the RAM IR.
//!
//! Binary constraints, intrinsic functors, and aggregators are polymorphic in
//! the surface language; type analysis resolves each occurrence to one of the
//! monomorphic operators below before lowering starts.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum NumericType {
    Signed,
    Unsigned,
    Float,
}

/// Type qualifier of a relation attribute, as recorded in RAM relation
/// descriptors ("i:number", "s:symbol", ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum TypeAttribute {
    Signed,
    Unsigned,
    Float,
    Symbol,
    Record,
}

impl TypeAttribute {
    pub fn prefix(self) -> char {
        match self {
            TypeAttribute::Signed => 'i',
            TypeAttribute::Unsigned => 'u',
            TypeAttribute::Float => 'f',
            TypeAttribute::Symbol => 's',
            TypeAttribute::Record => 'r',
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConstraintOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    FEq,
    FNe,
    FLt,
    FLe,
    FGt,
    FGe,
    ULt,
    ULe,
    UGt,
    UGe,
    Match,
    NotMatch,
    Contains,
    NotContains,
}

impl ConstraintOp {
    pub fn is_eq(self) -> bool {
        matches!(self, ConstraintOp::Eq | ConstraintOp::FEq)
    }

    pub fn is_inequality(self) -> bool {
        use ConstraintOp::*;
        matches!(
            self,
            Lt | Le | Gt | Ge | FLt | FLe | FGt | FGe | ULt | ULe | UGt | UGe
        )
    }

    pub fn is_less(self) -> bool {
        use ConstraintOp::*;
        matches!(self, Lt | Le | FLt | FLe | ULt | ULe)
    }

    pub fn is_greater(self) -> bool {
        use ConstraintOp::*;
        matches!(self, Gt | Ge | FGt | FGe | UGt | UGe)
    }

    pub fn symbol(self) -> &'static str {
        use ConstraintOp::*;
        match self {
            Eq | FEq => "=",
            Ne | FNe => "!=",
            Lt | FLt | ULt => "<",
            Le | FLe | ULe => "<=",
            Gt | FGt | UGt => ">",
            Ge | FGe | UGe => ">=",
            Match => "match",
            NotMatch => "not_match",
            Contains => "contains",
            NotContains => "not_contains",
        }
    }
}

impl fmt::Display for ConstraintOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum FunctorOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    Band,
    Bor,
    Bxor,
    Bnot,
    Max,
    Min,
    UAdd,
    USub,
    UMul,
    UDiv,
    UMod,
    FAdd,
    FSub,
    FMul,
    FDiv,
    FNeg,
    Cat,
    StrLen,
    SubStr,
    Ord,
    ToNumber,
    ToString,
    // Multi-result: these generate one tuple per value in an interval and
    // therefore introduce their own operation level.
    Range,
    URange,
    FRange,
}

impl FunctorOp {
    pub fn is_multi_result(self) -> bool {
        matches!(self, FunctorOp::Range | FunctorOp::URange | FunctorOp::FRange)
    }

    pub fn name(self) -> &'static str {
        use FunctorOp::*;
        match self {
            Add => "add",
            Sub => "sub",
            Mul => "mul",
            Div => "div",
            Mod => "mod",
            Neg => "neg",
            Band => "band",
            Bor => "bor",
            Bxor => "bxor",
            Bnot => "bnot",
            Max => "max",
            Min => "min",
            UAdd => "uadd",
            USub => "usub",
            UMul => "umul",
            UDiv => "udiv",
            UMod => "umod",
            FAdd => "fadd",
            FSub => "fsub",
            FMul => "fmul",
            FDiv => "fdiv",
            FNeg => "fneg",
            Cat => "cat",
            StrLen => "strlen",
            SubStr => "substr",
            Ord => "ord",
            ToNumber => "to_number",
            ToString => "to_string",
            Range => "range",
            URange => "urange",
            FRange => "frange",
        }
    }
}

impl fmt::Display for FunctorOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum AggregateOp {
    Count,
    Min,
    Max,
    Sum,
    Mean,
    FMin,
    FMax,
    FSum,
    FMean,
    UMin,
    UMax,
    USum,
}

impl AggregateOp {
    pub fn name(self) -> &'static str {
        use AggregateOp::*;
        match self {
            Count => "count",
            Min => "min",
            Max => "max",
            Sum => "sum",
            Mean => "mean",
            FMin => "fmin",
            FMax => "fmax",
            FSum => "fsum",
            FMean => "fmean",
            UMin => "umin",
            UMax => "umax",
            USum => "usum",
        }
    }
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
