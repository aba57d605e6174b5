//! The middle end of a Datalog compiler: lowers a typed, analyzed logic
//! program into a relational algebra program (RAM) evaluated with the
//! semi-naive strategy.
//!
//! The input AST and the precomputed analyses are read-only; the two
//! intentional AST rewrites (type finalization, ADT lowering) are pure
//! pre-passes. Lowering either returns a complete RAM translation unit or a
//! fatal error, never a partial program.

pub mod analysis;
pub mod config;
pub mod data;
pub mod graph;
pub mod names;
pub mod sips;
pub mod symbol_table;

pub mod finalize_types;
pub mod remove_adts;

pub mod context;
pub mod value_index;

pub mod translate_value;

pub mod auto_schedule;
pub mod translate_clause;

pub mod translate_program;

pub mod log_statement;
pub mod pretty_print;

#[cfg(test)]
mod test;

use crate::analysis::Analyses;
use crate::config::Config;
use crate::context::Context;
use crate::data::{ast, ram};
use crate::symbol_table::SymbolTable;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown relation `{0}` referenced during lowering")]
    UnknownRelation(String),

    #[error("unknown branch constructor `{0}`")]
    UnknownConstructor(String),

    #[error("numeric constant `{0}` has no resolved type")]
    UnresolvedNumericType(String),

    #[error("numeric constant `{0}` does not fit its resolved type")]
    MalformedNumericConstant(String),

    #[error("binary constraint `{0}` has no resolved operator")]
    UnresolvedConstraintOp(String),

    #[error("aggregator `{0}` has no resolved operator")]
    UnresolvedAggregateOp(String),

    #[error("intrinsic functor `{0}` has no resolved operator")]
    UnresolvedFunctorOp(String),

    #[error("variable `{0}` has no binding location")]
    UngroundedVariable(String),

    #[error("generator was never assigned a level")]
    UnindexedGenerator,

    #[error("unsupported node in clause lowering: {0}")]
    UnsupportedArgument(&'static str),

    #[error("aggregator body must contain exactly one atom in `{0}`")]
    MalformedAggregator(String),

    #[error("malformed execution plan on `{0}`")]
    MalformedExecutionPlan(String),

    #[error(
        "execution plan on `{clause}` names version {named}, but only {generated} versions were generated"
    )]
    MissingPlanVersions {
        clause: String,
        named: usize,
        generated: usize,
    },

    #[error("duplicate RAM relation `{0}`")]
    DuplicateRelation(String),

    #[error("duplicate RAM subroutine `{0}`")]
    DuplicateSubroutine(String),
}

#[derive(Clone, Debug)]
pub struct Section {
    pub id: String,
    pub title: String,
    pub body: String,
}

/// Sections to attach to the compiler's debug report; populated only under
/// the `debug-report` flag.
#[derive(Clone, Debug, Default)]
pub struct DebugReport {
    pub sections: Vec<Section>,
}

#[derive(Debug)]
pub struct LoweredUnit {
    pub unit: ram::TranslationUnit,
    pub debug_report: DebugReport,
}

/// Lowers a program to RAM: finalizes polymorphic types, eliminates ADT
/// constructors, then compiles each stratum in topological order.
pub fn lower(
    program: ast::Program,
    analyses: &Analyses,
    config: &Config,
) -> Result<LoweredUnit, Error> {
    let start = Instant::now();

    let program = finalize_types::finalize_types(program, analyses.polymorphism.as_ref());
    let (program, _) = remove_adts::remove_adts(program, &analyses.sum_types)?;

    let symbols = SymbolTable::new();
    let ctx = Context {
        program: &program,
        analyses,
        config,
        symbols: &symbols,
    };

    let (relations, main, subroutines) = translate_program::translate_program(&ctx)?;

    let unit = ram::TranslationUnit {
        relations,
        main,
        subroutines,
        symbols,
    };

    let mut debug_report = DebugReport::default();
    if config.debug_report {
        debug_report.sections.push(Section {
            id: "ram-program".to_owned(),
            title: format!("RAM Program ({:.3}s)", start.elapsed().as_secs_f64()),
            body: pretty_print::program_to_string(&unit),
        });
    }

    Ok(LoweredUnit { unit, debug_report })
}
