//! Structural invariants of the emitted RAM.

use crate::data::ast::*;
use crate::data::ram::{Condition, Statement};
use crate::test::helpers::*;

fn doubly_recursive_path() -> Program {
    program(
        vec![relation("edge", 2), relation("path", 2)],
        vec![
            clause(
                atom("path", vec![var("x"), var("y")]),
                vec![pos(atom("edge", vec![var("x"), var("y")]))],
            ),
            clause(
                atom("path", vec![var("x"), var("z")]),
                vec![
                    pos(atom("path", vec![var("x"), var("y")])),
                    pos(atom("path", vec![var("y"), var("z")])),
                ],
            ),
        ],
        vec![directive(DirectiveKind::Output, "path")],
    )
}

#[test]
fn recursive_relations_get_exactly_one_delta_and_new_twin() {
    let lowered = lower_program(doubly_recursive_path()).unwrap();
    let relations = &lowered.unit.relations;

    for name in ["path", "@delta_path", "@new_path"] {
        assert_eq!(
            relations.iter().filter(|rel| rel.name == name).count(),
            1,
            "{} created exactly once",
            name
        );
    }
    assert_eq!(
        relations.iter().filter(|rel| rel.name.contains("edge")).count(),
        1,
        "non-recursive edge has no twins"
    );

    let concrete = relations.iter().find(|rel| rel.name == "path").unwrap();
    for twin in ["@delta_path", "@new_path"] {
        let twin = relations.iter().find(|rel| rel.name == twin).unwrap();
        assert_eq!(twin.arity, concrete.arity);
        assert_eq!(twin.aux_arity, concrete.aux_arity);
        assert_eq!(twin.attribute_names, concrete.attribute_names);
        assert_eq!(
            twin.attribute_type_qualifiers,
            concrete.attribute_type_qualifiers
        );
        assert_eq!(twin.representation, concrete.representation);
    }
}

#[test]
fn one_version_per_recursive_atom() {
    let lowered = lower_program(doubly_recursive_path()).unwrap();

    let loop_body = lowered
        .unit
        .subroutines
        .values()
        .flat_map(all_statements)
        .find_map(|stmt| match stmt {
            Statement::Loop(body) => Some(body.as_ref()),
            _ => None,
        })
        .expect("path's stratum loops");

    // Both queries write @new_path; the versions differ in which atom reads
    // the delta.
    let versions: Vec<_> = queries(loop_body)
        .into_iter()
        .filter(|op| insert_target(op) == Some("@new_path"))
        .collect();
    assert_eq!(versions.len(), 2);

    assert_eq!(
        scanned_relations(versions[0]),
        vec!["@delta_path".to_owned(), "path".to_owned()]
    );
    assert_eq!(
        scanned_relations(versions[1]),
        vec!["path".to_owned(), "@delta_path".to_owned()]
    );

    let delta_negations = |version| {
        all_conditions(version)
            .iter()
            .filter(|cond| {
                matches!(
                    cond,
                    Condition::ExistenceCheck { relation, .. } if relation == "@delta_path"
                )
            })
            .count()
    };
    // Version 0 excludes tuples the later version will cover; version 1 has
    // no later recursive atoms.
    assert_eq!(delta_negations(versions[0]), 1);
    assert_eq!(delta_negations(versions[1]), 0);

    // Both versions block tuples the concrete relation already holds.
    for version in &versions {
        assert!(all_conditions(version).iter().any(|cond| matches!(
            cond,
            Condition::ExistenceCheck { relation, .. } if relation == "path"
        )));
    }
}

#[test]
fn lowering_is_deterministic() {
    let first = lower_program(doubly_recursive_path()).unwrap();
    let second = lower_program(doubly_recursive_path()).unwrap();

    assert_eq!(
        format!("{:?}", first.unit.relations),
        format!("{:?}", second.unit.relations)
    );
    assert_eq!(
        format!("{:?}", first.unit.main),
        format!("{:?}", second.unit.main)
    );
    assert_eq!(
        format!("{:?}", first.unit.subroutines),
        format!("{:?}", second.unit.subroutines)
    );
}

#[test]
fn tuple_references_stay_in_scope() {
    for source in [
        doubly_recursive_path(),
        // Records and constants exercise unpack levels.
        program(
            vec![relation("flat", 2), relation("nested", 1)],
            vec![clause(
                atom("flat", vec![var("a"), var("b")]),
                vec![pos(atom(
                    "nested",
                    vec![Argument::Record(RecordInit {
                        args: vec![var("a"), var("b")],
                    })],
                ))],
            )],
            vec![],
        ),
    ] {
        let lowered = lower_program(source).unwrap();
        for subroutine in lowered.unit.subroutines.values() {
            for query in queries(subroutine) {
                assert_levels_scoped(query);
            }
        }
    }
}

#[test]
fn every_mentioned_relation_was_created() {
    use crate::data::ram::{Condition, Expr, Operation};
    use std::collections::BTreeSet;

    let lowered = lower_program(doubly_recursive_path()).unwrap();
    let created: BTreeSet<&str> = lowered
        .unit
        .relations
        .iter()
        .map(|rel| rel.name.as_str())
        .collect();

    fn note_condition(cond: &Condition, mentioned: &mut BTreeSet<String>) {
        let mut pending = vec![cond];
        while let Some(cond) = pending.pop() {
            match cond {
                Condition::Conjunction(lhs, rhs) => {
                    pending.push(lhs);
                    pending.push(rhs);
                }
                Condition::Negation(inner) => pending.push(inner),
                Condition::EmptinessCheck(relation)
                | Condition::ExistenceCheck { relation, .. } => {
                    mentioned.insert(relation.clone());
                }
                Condition::Constraint { lhs, rhs, .. } => {
                    for expr in [lhs, rhs] {
                        if let Expr::RelationSize(relation) = expr {
                            mentioned.insert(relation.clone());
                        }
                    }
                }
                Condition::True => {}
            }
        }
    }

    let mut mentioned: BTreeSet<String> = BTreeSet::new();

    for subroutine in lowered.unit.subroutines.values() {
        for stmt in all_statements(subroutine) {
            match stmt {
                Statement::Clear(relation) => {
                    mentioned.insert(relation.clone());
                }
                Statement::Swap(lhs, rhs) => {
                    mentioned.insert(lhs.clone());
                    mentioned.insert(rhs.clone());
                }
                Statement::Extend { target, source } => {
                    mentioned.insert(target.clone());
                    mentioned.insert(source.clone());
                }
                Statement::Io { relation, .. } => {
                    mentioned.insert(relation.clone());
                }
                Statement::Exit(cond) => note_condition(cond, &mut mentioned),
                Statement::Query(query) => {
                    for op in all_operations(query) {
                        match op {
                            Operation::Scan { relation, .. }
                            | Operation::IndexScan { relation, .. }
                            | Operation::Aggregate { relation, .. }
                            | Operation::Insert { relation, .. }
                            | Operation::GuardedInsert { relation, .. } => {
                                mentioned.insert(relation.clone());
                            }
                            _ => {}
                        }
                        match op {
                            Operation::Filter { condition, .. }
                            | Operation::Break { condition, .. }
                            | Operation::Aggregate {
                                condition, ..
                            }
                            | Operation::GuardedInsert { condition, .. } => {
                                note_condition(condition, &mut mentioned)
                            }
                            _ => {}
                        }
                    }
                }
                _ => {}
            }
        }
    }

    for relation in &mentioned {
        assert!(
            created.contains(relation.as_str()),
            "{} mentioned but never created",
            relation
        );
    }
}

#[test]
fn strata_are_called_in_dependency_order() {
    // a diamond: base feeds left and right, both feed top.
    let source = program(
        vec![
            relation("top", 1),
            relation("left", 1),
            relation("right", 1),
            relation("base", 1),
        ],
        vec![
            clause(
                atom("left", vec![var("x")]),
                vec![pos(atom("base", vec![var("x")]))],
            ),
            clause(
                atom("right", vec![var("x")]),
                vec![pos(atom("base", vec![var("x")]))],
            ),
            clause(
                atom("top", vec![var("x")]),
                vec![
                    pos(atom("left", vec![var("x")])),
                    pos(atom("right", vec![var("x")])),
                ],
            ),
        ],
        vec![],
    );

    let analyses = crate::analysis::Analyses::compute(&source);
    let order = analyses.scc_graph.topological_order();
    for (position, &scc) in order.iter().enumerate() {
        for &predecessor in analyses.scc_graph.predecessors(scc) {
            let predecessor_position = order
                .iter()
                .position(|&other| other == predecessor)
                .unwrap();
            assert!(
                predecessor_position < position,
                "stratum {} called before its dependency {}",
                position,
                predecessor_position
            );
        }
    }

    // The main sequence is exactly the calls in that order.
    let lowered = lower_program(source).unwrap();
    let calls: Vec<_> = all_statements(&lowered.unit.main)
        .into_iter()
        .filter_map(|stmt| match stmt {
            Statement::Call(name) => Some(name.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(
        calls,
        (0..4).map(|i| format!("stratum_{}", i)).collect::<Vec<_>>()
    );
}
