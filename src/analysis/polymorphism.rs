//! Resolution of polymorphic objects: numeric constants, overloaded
//! constraint operators, aggregators, and functors.
//!
//! The resolution itself is produced by the type-inference pipeline, which
//! is outside this subsystem; lowering only consumes it through this trait.
//! `DefaultResolver` resolves everything monomorphically (signed arithmetic,
//! base operators), which is exact for programs without overloading.

use crate::data::ast::{Aggregator, BinaryConstraint, IntrinsicFunctor, NumericConstant, UserDefinedFunctor};
use crate::data::operators::{AggregateOp, ConstraintOp, FunctorOp, NumericType, TypeAttribute};

pub trait PolymorphicResolver {
    fn numeric_constant_type(&self, constant: &NumericConstant) -> Option<NumericType>;
    fn constraint_op(&self, constraint: &BinaryConstraint) -> Option<ConstraintOp>;
    fn aggregate_op(&self, aggregator: &Aggregator) -> Option<AggregateOp>;
    fn functor_op(&self, functor: &IntrinsicFunctor) -> Option<FunctorOp>;
    fn functor_return_type(&self, functor: &IntrinsicFunctor) -> Option<TypeAttribute>;
    fn user_defined_return_type(&self, functor: &UserDefinedFunctor) -> Option<TypeAttribute>;
}

pub struct DefaultResolver;

impl PolymorphicResolver for DefaultResolver {
    fn numeric_constant_type(&self, constant: &NumericConstant) -> Option<NumericType> {
        if constant.text.contains(['.', 'e', 'E']) {
            Some(NumericType::Float)
        } else {
            Some(NumericType::Signed)
        }
    }

    fn constraint_op(&self, constraint: &BinaryConstraint) -> Option<ConstraintOp> {
        Some(constraint.op)
    }

    fn aggregate_op(&self, aggregator: &Aggregator) -> Option<AggregateOp> {
        Some(aggregator.op)
    }

    fn functor_op(&self, functor: &IntrinsicFunctor) -> Option<FunctorOp> {
        Some(functor.op)
    }

    fn functor_return_type(&self, functor: &IntrinsicFunctor) -> Option<TypeAttribute> {
        use FunctorOp::*;
        let attribute = match functor.op {
            UAdd | USub | UMul | UDiv | UMod | URange => TypeAttribute::Unsigned,
            FAdd | FSub | FMul | FDiv | FNeg | FRange => TypeAttribute::Float,
            Cat | SubStr | ToString => TypeAttribute::Symbol,
            _ => TypeAttribute::Signed,
        };
        Some(attribute)
    }

    fn user_defined_return_type(&self, _functor: &UserDefinedFunctor) -> Option<TypeAttribute> {
        Some(TypeAttribute::Signed)
    }
}
