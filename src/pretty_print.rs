//! Indented textual rendering of a RAM translation unit; the payload of the
//! debug report.

use crate::data::ram::{
    Condition, Expr, Operation, Statement, TranslationUnit,
};
use crate::symbol_table::SymbolTable;
use itertools::Itertools;
use std::io::{self, Write};

pub fn write_program(dest: &mut impl Write, unit: &TranslationUnit) -> io::Result<()> {
    writeln!(dest, "PROGRAM")?;

    writeln!(dest, " DECLARATION")?;
    for relation in &unit.relations {
        let columns = relation
            .attribute_names
            .iter()
            .zip(&relation.attribute_type_qualifiers)
            .map(|(name, qualifier)| format!("{}:{}", name, qualifier))
            .format(", ");
        writeln!(
            dest,
            "  {}({}) {:?} aux={}",
            relation.name, columns, relation.representation, relation.aux_arity
        )?;
    }
    writeln!(dest, " END DECLARATION")?;

    for (name, code) in &unit.subroutines {
        writeln!(dest, " SUBROUTINE {}", name)?;
        write_statement(dest, code, 2, &unit.symbols)?;
        writeln!(dest, " END SUBROUTINE")?;
    }

    writeln!(dest, " MAIN")?;
    write_statement(dest, &unit.main, 2, &unit.symbols)?;
    writeln!(dest, " END MAIN")?;

    writeln!(dest, "END PROGRAM")
}

pub fn program_to_string(unit: &TranslationUnit) -> String {
    let mut buffer = Vec::new();
    write_program(&mut buffer, unit).expect("writing to a Vec cannot fail");
    String::from_utf8(buffer).expect("rendered RAM is valid UTF-8")
}

fn write_statement(
    dest: &mut impl Write,
    stmt: &Statement,
    depth: usize,
    symbols: &SymbolTable,
) -> io::Result<()> {
    let pad = " ".repeat(depth);
    match stmt {
        Statement::Sequence(stmts) => {
            for stmt in stmts {
                write_statement(dest, stmt, depth, symbols)?;
            }
            Ok(())
        }
        Statement::Parallel(stmts) => {
            writeln!(dest, "{}PARALLEL", pad)?;
            for stmt in stmts {
                write_statement(dest, stmt, depth + 1, symbols)?;
            }
            writeln!(dest, "{}END PARALLEL", pad)
        }
        Statement::Loop(body) => {
            writeln!(dest, "{}LOOP", pad)?;
            write_statement(dest, body, depth + 1, symbols)?;
            writeln!(dest, "{}END LOOP", pad)
        }
        Statement::Exit(cond) => {
            writeln!(dest, "{}EXIT {}", pad, fmt_condition(cond, symbols))
        }
        Statement::Call(name) => writeln!(dest, "{}CALL {}", pad, name),
        Statement::Clear(relation) => writeln!(dest, "{}CLEAR {}", pad, relation),
        Statement::Swap(lhs, rhs) => writeln!(dest, "{}SWAP ({}, {})", pad, lhs, rhs),
        Statement::Extend { target, source } => {
            writeln!(dest, "{}EXTEND {} WITH {}", pad, target, source)
        }
        Statement::Io {
            relation,
            directives,
        } => {
            let params = directives
                .iter()
                .map(|(key, value)| format!("{}={}", key, value))
                .format(", ");
            writeln!(dest, "{}IO {} ({})", pad, relation, params)
        }
        Statement::Query(op) => {
            writeln!(dest, "{}QUERY", pad)?;
            write_operation(dest, op, depth + 1, symbols)
        }
        Statement::LogRelationTimer {
            inner,
            message,
            relation,
        } => {
            writeln!(dest, "{}START_TIMER ON {} \"{}\"", pad, relation, message)?;
            write_statement(dest, inner, depth + 1, symbols)?;
            writeln!(dest, "{}END_TIMER", pad)
        }
        Statement::LogTimer { inner, message } => {
            writeln!(dest, "{}START_TIMER \"{}\"", pad, message)?;
            write_statement(dest, inner, depth + 1, symbols)?;
            writeln!(dest, "{}END_TIMER", pad)
        }
        Statement::LogSize { relation, message } => {
            writeln!(dest, "{}LOGSIZE {} \"{}\"", pad, relation, message)
        }
        Statement::DebugInfo { inner, message } => {
            let flat = message.replace('\n', " ");
            writeln!(dest, "{}BEGIN_DEBUG \"{}\"", pad, flat)?;
            write_statement(dest, inner, depth + 1, symbols)?;
            writeln!(dest, "{}END_DEBUG", pad)
        }
    }
}

fn write_operation(
    dest: &mut impl Write,
    op: &Operation,
    depth: usize,
    symbols: &SymbolTable,
) -> io::Result<()> {
    let pad = " ".repeat(depth);
    match op {
        Operation::Scan {
            relation,
            level,
            inner,
        } => {
            writeln!(dest, "{}FOR t{} IN {}", pad, level, relation)?;
            write_operation(dest, inner, depth + 1, symbols)
        }
        Operation::IndexScan {
            relation,
            level,
            pattern,
            inner,
        } => {
            let pattern = pattern.iter().map(|e| fmt_expr(e, symbols)).format(", ");
            writeln!(
                dest,
                "{}FOR t{} IN {} ON INDEX ({})",
                pad, level, relation, pattern
            )?;
            write_operation(dest, inner, depth + 1, symbols)
        }
        Operation::UnpackRecord {
            level,
            source,
            arity,
            inner,
        } => {
            writeln!(
                dest,
                "{}UNPACK t{} ARITY {} FROM {}",
                pad,
                level,
                arity,
                fmt_expr(source, symbols)
            )?;
            write_operation(dest, inner, depth + 1, symbols)
        }
        Operation::Aggregate {
            op,
            relation,
            target,
            condition,
            level,
            inner,
        } => {
            writeln!(
                dest,
                "{}t{}.0 = {} {} FOR ALL t{} IN {} WHERE {}",
                pad,
                level,
                op,
                fmt_expr(target, symbols),
                level,
                relation,
                fmt_condition(condition, symbols)
            )?;
            write_operation(dest, inner, depth + 1, symbols)
        }
        Operation::NestedIntrinsic {
            op,
            args,
            level,
            inner,
        } => {
            let args = args.iter().map(|e| fmt_expr(e, symbols)).format(", ");
            writeln!(dest, "{}t{} = {}({})", pad, level, op.name(), args)?;
            write_operation(dest, inner, depth + 1, symbols)
        }
        Operation::Filter { condition, inner } => {
            writeln!(dest, "{}IF {}", pad, fmt_condition(condition, symbols))?;
            write_operation(dest, inner, depth + 1, symbols)
        }
        Operation::Break { condition, inner } => {
            writeln!(dest, "{}BREAK IF {}", pad, fmt_condition(condition, symbols))?;
            write_operation(dest, inner, depth + 1, symbols)
        }
        Operation::Insert { relation, values } => {
            let values = values.iter().map(|e| fmt_expr(e, symbols)).format(", ");
            writeln!(dest, "{}INSERT ({}) INTO {}", pad, values, relation)
        }
        Operation::GuardedInsert {
            relation,
            values,
            condition,
        } => {
            let values = values.iter().map(|e| fmt_expr(e, symbols)).format(", ");
            writeln!(
                dest,
                "{}INSERT ({}) INTO {} IF {}",
                pad,
                values,
                relation,
                fmt_condition(condition, symbols)
            )
        }
    }
}

fn fmt_condition(cond: &Condition, symbols: &SymbolTable) -> String {
    match cond {
        Condition::True => "true".to_owned(),
        Condition::Conjunction(lhs, rhs) => format!(
            "{} AND {}",
            fmt_condition(lhs, symbols),
            fmt_condition(rhs, symbols)
        ),
        Condition::Negation(inner) => format!("(NOT {})", fmt_condition(inner, symbols)),
        Condition::Constraint { op, lhs, rhs } => format!(
            "{} {} {}",
            fmt_expr(lhs, symbols),
            op,
            fmt_expr(rhs, symbols)
        ),
        Condition::EmptinessCheck(relation) => format!("ISEMPTY({})", relation),
        Condition::ExistenceCheck { relation, values } => {
            let values = values.iter().map(|e| fmt_expr(e, symbols)).format(", ");
            format!("({}) IN {}", values, relation)
        }
    }
}

fn fmt_expr(expr: &Expr, symbols: &SymbolTable) -> String {
    match expr {
        Expr::SignedConstant(value) => format!("number({})", value),
        Expr::UnsignedConstant(value) => format!("unsigned({})", value),
        Expr::FloatConstant(value) => format!("float({})", value),
        Expr::StringConstant(id) => format!("{:?}", symbols.resolve(*id)),
        Expr::TupleElement { level, column } => format!("t{}.{}", level, column),
        Expr::UndefValue => "UNDEF".to_owned(),
        Expr::Intrinsic { op, args } => {
            let args = args.iter().map(|e| fmt_expr(e, symbols)).format(", ");
            format!("{}({})", op, args)
        }
        Expr::UserDefined { name, args } => {
            let args = args.iter().map(|e| fmt_expr(e, symbols)).format(", ");
            format!("@{}({})", name, args)
        }
        Expr::PackRecord(args) => {
            let args = args.iter().map(|e| fmt_expr(e, symbols)).format(", ");
            format!("[{}]", args)
        }
        Expr::RelationSize(relation) => format!("size({})", relation),
    }
}
