//! Stamps every polymorphic object in the program with its resolved
//! monomorphic type or operator, so later passes never consult the resolver.
//!
//! Pure: consumes the program and returns the stamped copy. Objects the
//! resolver cannot resolve keep an empty stamp; translation reports those as
//! fatal when it reaches them.

use crate::analysis::polymorphism::PolymorphicResolver;
use crate::data::ast::{Aggregator, Argument, BinaryConstraint, Clause, Literal, Program};

pub fn finalize_types(program: Program, resolver: &dyn PolymorphicResolver) -> Program {
    let clauses = program
        .clauses
        .map(|_, clause| finalize_clause(clause, resolver));

    Program {
        relations: program.relations,
        clauses,
        directives: program.directives,
    }
}

fn finalize_clause(clause: Clause, resolver: &dyn PolymorphicResolver) -> Clause {
    let Clause {
        head,
        body,
        kind,
        execution_plan,
        src_loc,
    } = clause.map_arguments(&mut |arg| finalize_argument(arg, resolver));

    // Binary constraints live at the literal level, outside the argument
    // trees.
    Clause {
        head,
        body: body
            .into_iter()
            .map(|lit| finalize_literal(lit, resolver))
            .collect(),
        kind,
        execution_plan,
        src_loc,
    }
}

fn finalize_literal(lit: Literal, resolver: &dyn PolymorphicResolver) -> Literal {
    match lit {
        Literal::Constraint(bc) => {
            let final_op = resolver.constraint_op(&bc);
            Literal::Constraint(BinaryConstraint { final_op, ..bc })
        }
        other => other,
    }
}

fn finalize_argument(arg: Argument, resolver: &dyn PolymorphicResolver) -> Argument {
    match arg {
        Argument::Number(mut constant) => {
            constant.final_type = resolver.numeric_constant_type(&constant);
            Argument::Number(constant)
        }
        Argument::Intrinsic(mut functor) => {
            functor.final_op = resolver.functor_op(&functor);
            functor.final_return = resolver.functor_return_type(&functor);
            Argument::Intrinsic(functor)
        }
        Argument::UserDefined(mut functor) => {
            functor.final_return = resolver.user_defined_return_type(&functor);
            Argument::UserDefined(functor)
        }
        Argument::Aggregate(agg) => {
            let final_op = resolver.aggregate_op(&agg);
            let Aggregator {
                op, target, body, ..
            } = agg;
            Argument::Aggregate(Aggregator {
                op,
                final_op,
                target,
                body: body
                    .into_iter()
                    .map(|lit| finalize_literal(lit, resolver))
                    .collect(),
            })
        }
        other => other,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::analysis::polymorphism::DefaultResolver;
    use crate::data::ast::*;
    use crate::data::operators::NumericType;
    use id_collections::IdVec;

    fn one_clause_program(clause: Clause) -> Program {
        let mut clauses = IdVec::new();
        let _ = clauses.push(clause);
        Program {
            relations: IdVec::new(),
            clauses,
            directives: Vec::new(),
        }
    }

    #[test]
    fn stamps_numeric_constants() {
        let clause = Clause {
            head: Atom {
                name: QualifiedName::from("p"),
                args: vec![
                    Argument::Number(NumericConstant::unresolved("42")),
                    Argument::Number(NumericConstant::unresolved("2.5")),
                ],
            },
            body: Vec::new(),
            kind: ClauseKind::Plain,
            execution_plan: None,
            src_loc: SrcLoc::default(),
        };

        let program = finalize_types(one_clause_program(clause), &DefaultResolver);
        let head = &program.clauses[ClauseId(0)].head;
        match (&head.args[0], &head.args[1]) {
            (Argument::Number(int), Argument::Number(float)) => {
                assert_eq!(int.final_type, Some(NumericType::Signed));
                assert_eq!(float.final_type, Some(NumericType::Float));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn stamps_constraints_inside_aggregator_bodies() {
        use crate::data::operators::{AggregateOp, ConstraintOp};

        let inner_constraint = Literal::Constraint(BinaryConstraint {
            op: ConstraintOp::Lt,
            final_op: None,
            lhs: Box::new(Argument::Var("x".to_owned())),
            rhs: Box::new(Argument::Number(NumericConstant::unresolved("10"))),
        });
        let clause = Clause {
            head: Atom {
                name: QualifiedName::from("p"),
                args: vec![Argument::Var("n".to_owned())],
            },
            body: vec![Literal::Constraint(BinaryConstraint {
                op: ConstraintOp::Eq,
                final_op: None,
                lhs: Box::new(Argument::Var("n".to_owned())),
                rhs: Box::new(Argument::Aggregate(Aggregator {
                    op: AggregateOp::Count,
                    final_op: None,
                    target: None,
                    body: vec![
                        Literal::Atom(Atom {
                            name: QualifiedName::from("e"),
                            args: vec![Argument::Var("x".to_owned())],
                        }),
                        inner_constraint,
                    ],
                })),
            })],
            kind: ClauseKind::Plain,
            execution_plan: None,
            src_loc: SrcLoc::default(),
        };

        let program = finalize_types(one_clause_program(clause), &DefaultResolver);
        let Literal::Constraint(bc) = &program.clauses[ClauseId(0)].body[0] else {
            unreachable!()
        };
        assert_eq!(bc.final_op, Some(ConstraintOp::Eq));
        let Argument::Aggregate(agg) = bc.rhs.as_ref() else {
            unreachable!()
        };
        assert_eq!(agg.final_op, Some(AggregateOp::Count));
        let Literal::Constraint(inner) = &agg.body[1] else {
            unreachable!()
        };
        assert_eq!(inner.final_op, Some(ConstraintOp::Lt));
    }
}
