//! Cost-driven join ordering (Selinger-style dynamic programming over
//! left-deep plans), used when profile statistics are available.
//!
//! The DP table maps sorted atom-index sets to the best plan found for that
//! set. Growing a plan by one atom estimates the join's output as
//! `size / uniqueKeys` over the columns already grounded; fully-bound atoms
//! contribute a single expected tuple.

use crate::analysis::stats::AutoSchedulerStats;
use crate::data::ast::{Argument, Atom, Clause};
use crate::data::ram;
use crate::translate_value::translate_constant;
use crate::Error;
use std::collections::{BTreeMap, BTreeSet};

struct PlanTuplesCost {
    plan: Vec<usize>,
    tuples: f64,
    cost: f64,
}

/// Computes the least-cost atom ordering for `atoms`, returned as indices
/// into the source order. `atom_names` are the physical names the atoms read
/// under the current translation mode; `recursive_slots` marks atoms in the
/// current stratum, which query the recursive statistics.
pub fn schedule_atoms(
    clause: &Clause,
    atoms: &[&Atom],
    atom_names: &[String],
    recursive_slots: &BTreeSet<usize>,
    stats: &dyn AutoSchedulerStats,
) -> Result<Vec<usize>, Error> {
    let n = atoms.len();
    debug_assert!(n >= 2);

    // `v = c` binds the variable to the constant for costing purposes.
    let mut var_to_constant: BTreeMap<&str, &Argument> = BTreeMap::new();
    // `v = f(...vars...)` makes `v` groundable once `vars` are grounded.
    let mut var_to_other_vars: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
    // Inequality bounds per variable: (lower-bound vars, upper-bound vars).
    let mut ineq_bounds: BTreeMap<&str, (BTreeSet<String>, BTreeSet<String>)> = BTreeMap::new();

    for bc in clause.body_constraints() {
        if bc.op.is_inequality() {
            if let Argument::Var(name) = bc.lhs.as_ref() {
                let others = variables_of(&bc.rhs);
                let bounds = ineq_bounds.entry(name.as_str()).or_default();
                if bc.op.is_less() {
                    bounds.1 = others;
                } else if bc.op.is_greater() {
                    bounds.0 = others;
                }
            }
            if let Argument::Var(name) = bc.rhs.as_ref() {
                let others = variables_of(&bc.lhs);
                let bounds = ineq_bounds.entry(name.as_str()).or_default();
                if bc.op.is_less() {
                    bounds.0 = others;
                } else if bc.op.is_greater() {
                    bounds.1 = others;
                }
            }
        }

        if !bc.op.is_eq() {
            continue;
        }

        match (bc.lhs.as_ref(), bc.rhs.as_ref()) {
            (Argument::Var(name), constant) if constant.is_constant() => {
                var_to_constant.insert(name.as_str(), constant);
            }
            (constant, Argument::Var(name)) if constant.is_constant() => {
                var_to_constant.insert(name.as_str(), constant);
            }
            (Argument::Var(name), expr) => {
                var_to_other_vars.insert(name.as_str(), variables_of(expr));
            }
            (expr, Argument::Var(name)) => {
                var_to_other_vars.insert(name.as_str(), variables_of(expr));
            }
            _ => {}
        }
    }

    // A variable bounded below and above by the same grounding set behaves
    // like an equality, e.g. `lo <= v, v <= lo + width`.
    for (&name, (lower, upper)) in &ineq_bounds {
        if !lower.is_empty() && !upper.is_empty() && lower.is_subset(upper) {
            var_to_other_vars.insert(name, upper.clone());
        }
    }

    let grounded_vars_per_atom: Vec<BTreeSet<String>> = atoms
        .iter()
        .map(|atom| {
            let mut vars = BTreeSet::new();
            for arg in &atom.args {
                arg.for_each(&mut |arg| {
                    if let Argument::Var(name) = arg {
                        vars.insert(name.clone());
                    }
                });
            }
            vars
        })
        .collect();

    // Printable constants per atom column, after the `v = c` rewrite.
    let mut constants_per_atom: Vec<BTreeMap<usize, String>> = Vec::with_capacity(n);
    for atom in atoms {
        let mut constants = BTreeMap::new();
        for (col, arg) in atom.args.iter().enumerate() {
            let mut arg = arg;
            if let Argument::Var(name) = arg {
                if let Some(&constant) = var_to_constant.get(name.as_str()) {
                    arg = constant;
                }
            }
            if arg.is_constant() {
                constants.insert(col, printable_constant(arg)?);
            }
        }
        constants_per_atom.push(constants);
    }

    let mut cache: Vec<BTreeMap<Vec<usize>, PlanTuplesCost>> = (0..=n)
        .map(|_| BTreeMap::new())
        .collect();

    // Base: the access cost of each relation on its own.
    for i in 0..n {
        let tuples = relation_size(
            stats,
            recursive_slots.contains(&i),
            &atom_names[i],
            &BTreeSet::new(),
            &constants_per_atom[i],
        ) as f64;
        cache[1].insert(
            vec![i],
            PlanTuplesCost {
                plan: vec![i],
                tuples,
                cost: tuples * atoms[i].arity() as f64,
            },
        );
    }

    for k in 2..=n {
        for subset in subsets(n, k) {
            for position in 0..subset.len() {
                let atom_idx = subset[position];
                let mut smaller = subset.clone();
                smaller.remove(position);

                let prev = &cache[k - 1][&smaller];
                let (prev_plan, prev_tuples, prev_cost) =
                    (prev.plan.clone(), prev.tuples, prev.cost);

                let mut grounded: BTreeSet<&str> = BTreeSet::new();
                for &j in &smaller {
                    grounded.extend(grounded_vars_per_atom[j].iter().map(String::as_str));
                }

                let atom = atoms[atom_idx];
                let mut join_columns = BTreeSet::new();
                let mut num_bound = 0;
                for (col, arg) in atom.args.iter().enumerate() {
                    if constants_per_atom[atom_idx].contains_key(&col) {
                        num_bound += 1;
                        continue;
                    }
                    if matches!(arg, Argument::Unnamed) {
                        num_bound += 1;
                        continue;
                    }
                    if let Argument::Var(name) = arg {
                        let groundable = var_to_other_vars
                            .get(name.as_str())
                            .is_some_and(|deps| {
                                deps.iter().all(|dep| grounded.contains(dep.as_str()))
                            });
                        if groundable || grounded.contains(name.as_str()) {
                            join_columns.insert(col);
                            num_bound += 1;
                        }
                    }
                }

                let recursive = recursive_slots.contains(&atom_idx);
                let expected_tuples = if num_bound == atom.arity() {
                    1.0
                } else {
                    let size = relation_size(
                        stats,
                        recursive,
                        &atom_names[atom_idx],
                        &BTreeSet::new(),
                        &constants_per_atom[atom_idx],
                    ) as f64;
                    if join_columns.is_empty() {
                        size
                    } else {
                        let unique_keys = relation_size(
                            stats,
                            recursive,
                            &atom_names[atom_idx],
                            &join_columns,
                            &constants_per_atom[atom_idx],
                        );
                        size / if unique_keys > 0 { unique_keys as f64 } else { 1.0 }
                    }
                };

                let tuples = prev_tuples * expected_tuples;
                let cost = prev_cost + tuples * atom.arity() as f64;

                let mut plan = prev_plan;
                plan.push(atom_idx);

                let replace = cache[k]
                    .get(&subset)
                    .map_or(true, |existing| existing.cost >= cost);
                if replace {
                    cache[k].insert(subset.clone(), PlanTuplesCost { plan, tuples, cost });
                }
            }
        }
    }

    debug_assert_eq!(cache[n].len(), 1);
    let best = cache[n].values().next().unwrap();
    Ok(best.plan.clone())
}

fn relation_size(
    stats: &dyn AutoSchedulerStats,
    recursive: bool,
    relation: &str,
    join_columns: &BTreeSet<usize>,
    constants: &BTreeMap<usize, String>,
) -> usize {
    let mut key_columns = join_columns.clone();
    key_columns.extend(constants.keys().copied());

    if key_columns.is_empty() && !recursive {
        return stats.relation_size(relation);
    }
    if recursive {
        stats.recursive_unique_keys(relation, &key_columns, constants)
    } else {
        stats.non_recursive_unique_keys(relation, &key_columns, constants)
    }
}

fn variables_of(arg: &Argument) -> BTreeSet<String> {
    let mut vars = BTreeSet::new();
    arg.for_each(&mut |arg| {
        if let Argument::Var(name) = arg {
            vars.insert(name.clone());
        }
    });
    vars
}

/// Canonical spelling of a constant, as recorded in profile statistics.
fn printable_constant(arg: &Argument) -> Result<String, Error> {
    match arg {
        Argument::Number(constant) => Ok(match translate_constant(constant)? {
            ram::Expr::SignedConstant(value) => value.to_string(),
            ram::Expr::UnsignedConstant(value) => value.to_string(),
            ram::Expr::FloatConstant(value) => value.to_string(),
            _ => unreachable!("numeric constants translate to constants"),
        }),
        Argument::Str(text) => Ok(format!("{:?}", text)),
        Argument::Nil => Ok("0".to_owned()),
        _ => unreachable!("printable_constant on non-constant"),
    }
}

/// All k-element subsets of 0..n as sorted index vectors, in lexicographic
/// order.
fn subsets(n: usize, k: usize) -> Vec<Vec<usize>> {
    let mut result = Vec::new();
    let mut current: Vec<usize> = (0..k).collect();
    loop {
        result.push(current.clone());

        // Advance the rightmost index that can still move.
        let mut i = k;
        loop {
            if i == 0 {
                return result;
            }
            i -= 1;
            if current[i] != i + n - k {
                break;
            }
        }
        current[i] += 1;
        for j in i + 1..k {
            current[j] = current[j - 1] + 1;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::analysis::stats::ProfileStats;
    use crate::data::ast::{Atom, ClauseKind, Literal, QualifiedName, SrcLoc};

    fn var(name: &str) -> Argument {
        Argument::Var(name.to_owned())
    }

    fn atom(name: &str, args: Vec<Argument>) -> Atom {
        Atom {
            name: QualifiedName::from(name),
            args,
        }
    }

    fn clause_with_body(head: Atom, body: Vec<Literal>) -> Clause {
        Clause {
            head,
            body,
            kind: ClauseKind::Plain,
            execution_plan: None,
            src_loc: SrcLoc::default(),
        }
    }

    #[test]
    fn subset_enumeration() {
        assert_eq!(subsets(3, 2), vec![vec![0, 1], vec![0, 2], vec![1, 2]]);
        assert_eq!(subsets(4, 1).len(), 4);
        assert_eq!(subsets(5, 3).len(), 10);
    }

    #[test]
    fn smaller_relation_is_scanned_first() {
        // q(x,y), r(y,z) with |q| = 1000, |r| = 10; joining through y makes
        // starting from r cheaper.
        let q = atom("q", vec![var("x"), var("y")]);
        let r = atom("r", vec![var("y"), var("z")]);
        let clause = clause_with_body(
            atom("p", vec![var("x"), var("z")]),
            vec![Literal::Atom(q.clone()), Literal::Atom(r.clone())],
        );

        let mut stats = ProfileStats::default();
        stats.sizes.insert("q".to_owned(), 1000);
        stats.sizes.insert("r".to_owned(), 10);
        // Joining q on column 1 once y is grounded: 500 distinct keys.
        stats
            .non_recursive_keys
            .insert(("q".to_owned(), vec![1], vec![]), 500);
        stats
            .non_recursive_keys
            .insert(("q".to_owned(), vec![], vec![]), 1000);
        stats
            .non_recursive_keys
            .insert(("r".to_owned(), vec![0], vec![]), 10);
        stats
            .non_recursive_keys
            .insert(("r".to_owned(), vec![], vec![]), 10);

        let order = schedule_atoms(
            &clause,
            &[&q, &r],
            &["q".to_owned(), "r".to_owned()],
            &BTreeSet::new(),
            &stats,
        )
        .unwrap();
        assert_eq!(order, vec![1, 0]);
    }

    #[test]
    fn fully_bound_atoms_cost_one_tuple() {
        // big(x), small(x): whichever atom comes second is fully bound and
        // contributes one expected tuple, so the cheaper plan opens with the
        // smaller relation.
        let big = atom("big", vec![var("x")]);
        let small = atom("small", vec![var("x")]);
        let clause = clause_with_body(
            atom("p", vec![var("x")]),
            vec![Literal::Atom(big.clone()), Literal::Atom(small.clone())],
        );

        let mut stats = ProfileStats::default();
        stats.sizes.insert("big".to_owned(), 50);
        stats.sizes.insert("small".to_owned(), 40);

        let order = schedule_atoms(
            &clause,
            &[&big, &small],
            &["big".to_owned(), "small".to_owned()],
            &BTreeSet::new(),
            &stats,
        )
        .unwrap();

        // [small, big]: 40 + 40·1 = 80 beats [big, small]: 50 + 50·1 = 100.
        assert_eq!(order, vec![1, 0]);
    }
}
