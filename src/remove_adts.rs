//! ADT lowering: eliminates every branch constructor before clause
//! translation.
//!
//! A constructor of an enum type (all branches nullary) becomes the integer
//! constant of its branch id; any other constructor becomes the record
//! `[branch_id, payload]`, where the payload is the single argument for
//! unary branches and a nested record otherwise. Branch ids are positions in
//! the type's lexicographically-sorted branch list.
//!
//! Pure and idempotent: a second run reports `changed = false` and returns
//! the program unmodified.

use crate::analysis::sum_type_branches::SumTypeBranches;
use crate::data::ast::{Argument, NumericConstant, Program, RecordInit};
use crate::Error;

pub fn remove_adts(
    program: Program,
    sum_types: &SumTypeBranches,
) -> Result<(Program, bool), Error> {
    let mut changed = false;
    let mut error = None;

    let clauses = program.clauses.map(|_, clause| {
        clause.map_arguments(&mut |arg| match arg {
            Argument::Branch(adt) => {
                let Some(branch_id) = sum_types.branch_id(&adt) else {
                    error.get_or_insert(Error::UnknownConstructor(adt.constructor.clone()));
                    return Argument::Branch(adt);
                };
                changed = true;

                let tag = Argument::Number(NumericConstant::signed(branch_id as i64));
                if sum_types.is_enum(&adt) {
                    return tag;
                }

                // [branch_id, payload]; the payload collapses to the single
                // argument for unary branches.
                let payload = if adt.args.len() == 1 {
                    adt.args.into_iter().next().unwrap()
                } else {
                    Argument::Record(RecordInit { args: adt.args })
                };
                Argument::Record(RecordInit {
                    args: vec![tag, payload],
                })
            }
            other => other,
        })
    });

    if let Some(error) = error {
        return Err(error);
    }

    Ok((
        Program {
            relations: program.relations,
            clauses,
            directives: program.directives,
        },
        changed,
    ))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::analysis::sum_type_branches::{Branch, SumType};
    use crate::data::ast::*;
    use crate::data::operators::NumericType;
    use id_collections::IdVec;

    fn option_types() -> SumTypeBranches {
        let mut sum_types = SumTypeBranches::default();
        sum_types.register(SumType::new(vec![
            Branch {
                name: "Some".to_owned(),
                arity: 1,
            },
            Branch {
                name: "None".to_owned(),
                arity: 0,
            },
        ]));
        sum_types
    }

    fn program_with_head_args(args: Vec<Argument>) -> Program {
        let mut clauses = IdVec::new();
        let _ = clauses.push(Clause {
            head: Atom {
                name: QualifiedName::from("p"),
                args,
            },
            body: Vec::new(),
            kind: ClauseKind::Plain,
            execution_plan: None,
            src_loc: SrcLoc::default(),
        });
        Program {
            relations: IdVec::new(),
            clauses,
            directives: Vec::new(),
        }
    }

    fn head_args(program: &Program) -> &[Argument] {
        &program.clauses[ClauseId(0)].head.args
    }

    #[test]
    fn unary_branch_becomes_tagged_record() {
        let program = program_with_head_args(vec![Argument::Branch(BranchInit {
            constructor: "Some".to_owned(),
            args: vec![Argument::Number(NumericConstant::signed(42))],
        })]);

        let (program, changed) = remove_adts(program, &option_types()).unwrap();
        assert!(changed);

        // "None" < "Some", so Some has branch id 1.
        let Argument::Record(rec) = &head_args(&program)[0] else {
            unreachable!()
        };
        assert_eq!(rec.args.len(), 2);
        match (&rec.args[0], &rec.args[1]) {
            (Argument::Number(tag), Argument::Number(payload)) => {
                assert_eq!(tag.text, "1");
                assert_eq!(tag.final_type, Some(NumericType::Signed));
                assert_eq!(payload.text, "42");
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn nullary_branch_of_non_enum_keeps_record_shape() {
        let program = program_with_head_args(vec![Argument::Branch(BranchInit {
            constructor: "None".to_owned(),
            args: Vec::new(),
        })]);

        let (program, changed) = remove_adts(program, &option_types()).unwrap();
        assert!(changed);

        let Argument::Record(rec) = &head_args(&program)[0] else {
            unreachable!()
        };
        match (&rec.args[0], &rec.args[1]) {
            (Argument::Number(tag), Argument::Record(payload)) => {
                assert_eq!(tag.text, "0");
                assert!(payload.args.is_empty());
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn enum_branch_becomes_integer() {
        let mut sum_types = SumTypeBranches::default();
        sum_types.register(SumType::new(vec![
            Branch {
                name: "Red".to_owned(),
                arity: 0,
            },
            Branch {
                name: "Green".to_owned(),
                arity: 0,
            },
            Branch {
                name: "Blue".to_owned(),
                arity: 0,
            },
        ]));

        let program = program_with_head_args(vec![Argument::Branch(BranchInit {
            constructor: "Green".to_owned(),
            args: Vec::new(),
        })]);

        let (program, changed) = remove_adts(program, &sum_types).unwrap();
        assert!(changed);
        match &head_args(&program)[0] {
            // Blue < Green < Red
            Argument::Number(tag) => assert_eq!(tag.text, "1"),
            _ => unreachable!(),
        }
    }

    #[test]
    fn lowering_is_idempotent() {
        let sum_types = option_types();
        let program = program_with_head_args(vec![
            Argument::Branch(BranchInit {
                constructor: "Some".to_owned(),
                args: vec![Argument::Branch(BranchInit {
                    constructor: "None".to_owned(),
                    args: Vec::new(),
                })],
            }),
            Argument::Var("x".to_owned()),
        ]);

        let (once, changed_once) = remove_adts(program, &sum_types).unwrap();
        assert!(changed_once);
        let first = format!("{:?}", once.clauses[ClauseId(0)]);

        let (twice, changed_twice) = remove_adts(once, &sum_types).unwrap();
        assert!(!changed_twice);
        let second = format!("{:?}", twice.clauses[ClauseId(0)]);
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_constructor_is_fatal() {
        let program = program_with_head_args(vec![Argument::Branch(BranchInit {
            constructor: "Mystery".to_owned(),
            args: Vec::new(),
        })]);
        assert!(remove_adts(program, &SumTypeBranches::default()).is_err());
    }
}
