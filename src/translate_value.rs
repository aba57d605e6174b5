//! Translation of single AST expressions and literals into RAM, given a
//! value index mapping variables and generators to tuple locations.

use crate::context::Context;
use crate::data::ast::{Argument, Literal, NumericConstant};
use crate::data::operators::NumericType;
use crate::data::ram;
use crate::names;
use crate::value_index::ValueIndex;
use crate::Error;

/// Maps one expression to a RAM expression.
pub fn translate_value(
    ctx: &Context,
    index: &ValueIndex,
    arg: &Argument,
) -> Result<ram::Expr, Error> {
    match arg {
        Argument::Var(name) => index
            .definition_point(name)
            .map(|loc| ram::Expr::tuple_element(loc.level, loc.column))
            .ok_or_else(|| Error::UngroundedVariable(name.clone())),

        Argument::Unnamed => Ok(ram::Expr::UndefValue),

        Argument::Number(constant) => translate_constant(constant),

        Argument::Str(text) => Ok(ram::Expr::StringConstant(ctx.symbols.intern(text))),

        Argument::Nil => Ok(ram::Expr::SignedConstant(0)),

        Argument::Record(record) => {
            // A record introduced by the body resolves to its unpack level;
            // anywhere else it is packed from its parts.
            if let Some(loc) = index.record_definition(record) {
                return Ok(ram::Expr::tuple_element(loc.level, loc.column));
            }
            let args = record
                .args
                .iter()
                .map(|arg| translate_value(ctx, index, arg))
                .collect::<Result<_, _>>()?;
            Ok(ram::Expr::PackRecord(args))
        }

        Argument::Branch(_) => Err(Error::UnsupportedArgument(
            "branch constructor survived ADT lowering",
        )),

        Argument::Intrinsic(functor) => {
            let op = functor
                .final_op
                .ok_or_else(|| Error::UnresolvedFunctorOp(functor.op.to_string()))?;
            if op.is_multi_result() {
                let loc = index
                    .generator_location(arg)
                    .ok_or(Error::UnindexedGenerator)?;
                return Ok(ram::Expr::tuple_element(loc.level, loc.column));
            }
            let args = functor
                .args
                .iter()
                .map(|arg| translate_value(ctx, index, arg))
                .collect::<Result<_, _>>()?;
            Ok(ram::Expr::Intrinsic { op, args })
        }

        Argument::UserDefined(functor) => {
            let args = functor
                .args
                .iter()
                .map(|arg| translate_value(ctx, index, arg))
                .collect::<Result<_, _>>()?;
            Ok(ram::Expr::UserDefined {
                name: functor.name.clone(),
                args,
            })
        }

        Argument::Aggregate(_) => index
            .generator_location(arg)
            .map(|loc| ram::Expr::tuple_element(loc.level, loc.column))
            .ok_or(Error::UnindexedGenerator),
    }
}

/// Maps one body literal to a RAM condition. Atoms are structural and yield
/// `None`; boolean literals yield the condition to wrap as a filter.
pub fn translate_constraint(
    ctx: &Context,
    index: &ValueIndex,
    lit: &Literal,
) -> Result<Option<ram::Condition>, Error> {
    match lit {
        Literal::Atom(_) => Ok(None),

        Literal::Negation(atom) => {
            let name = names::concrete_name(&atom.name);

            // A negated proposition holds iff the relation is empty.
            if atom.arity() == 0 {
                return Ok(Some(ram::Condition::EmptinessCheck(name)));
            }

            let mut values = atom
                .args
                .iter()
                .map(|arg| translate_value(ctx, index, arg))
                .collect::<Result<Vec<_>, _>>()?;
            for _ in 0..ctx.evaluation_arity(atom) {
                values.push(ram::Expr::UndefValue);
            }
            Ok(Some(
                ram::Condition::ExistenceCheck {
                    relation: name,
                    values,
                }
                .negate(),
            ))
        }

        Literal::Constraint(bc) => {
            let op = bc
                .final_op
                .ok_or_else(|| Error::UnresolvedConstraintOp(bc.op.to_string()))?;
            let lhs = translate_value(ctx, index, &bc.lhs)?;
            let rhs = translate_value(ctx, index, &bc.rhs)?;
            Ok(Some(ram::Condition::Constraint { op, lhs, rhs }))
        }
    }
}

pub fn translate_constant(constant: &NumericConstant) -> Result<ram::Expr, Error> {
    let final_type = constant
        .final_type
        .ok_or_else(|| Error::UnresolvedNumericType(constant.text.clone()))?;
    match final_type {
        NumericType::Signed => parse_signed(&constant.text)
            .map(ram::Expr::SignedConstant)
            .ok_or_else(|| Error::MalformedNumericConstant(constant.text.clone())),
        NumericType::Unsigned => parse_unsigned(&constant.text)
            .map(ram::Expr::UnsignedConstant)
            .ok_or_else(|| Error::MalformedNumericConstant(constant.text.clone())),
        NumericType::Float => constant
            .text
            .parse()
            .map(ram::Expr::FloatConstant)
            .map_err(|_| Error::MalformedNumericConstant(constant.text.clone())),
    }
}

fn parse_signed(text: &str) -> Option<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let magnitude = parse_unsigned(digits)? as i128;
    let value = if negative { -magnitude } else { magnitude };
    i64::try_from(value).ok()
}

fn parse_unsigned(text: &str) -> Option<u64> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = text.strip_prefix("0b").or_else(|| text.strip_prefix("0B")) {
        u64::from_str_radix(bin, 2).ok()
    } else {
        text.parse().ok()
    }
}
