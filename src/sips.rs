//! Sideways-information-passing strategies: the default join ordering used
//! when a clause has neither an explicit plan nor an auto-scheduled one.
//!
//! Each strategy repeatedly picks the next atom by a per-atom cost given the
//! variables already bound; ties break toward source order, so `all-bound`
//! leaves a clause without constant-bound atoms in source order.

use crate::data::ast::{Argument, Atom};
use std::collections::BTreeSet;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SipsMetric {
    /// Prefer atoms whose arguments are all bound.
    #[default]
    AllBound,
    /// Prefer atoms with the most bound arguments.
    MaxBound,
    /// Keep source order.
    Strict,
}

impl SipsMetric {
    pub fn from_name(name: &str) -> Option<SipsMetric> {
        match name {
            "all-bound" => Some(SipsMetric::AllBound),
            "max-bound" => Some(SipsMetric::MaxBound),
            "strict" => Some(SipsMetric::Strict),
            _ => None,
        }
    }

    /// Returns the chosen ordering as indices into `atoms`.
    pub fn reorder(self, atoms: &[&Atom]) -> Vec<usize> {
        if self == SipsMetric::Strict {
            return (0..atoms.len()).collect();
        }

        let mut bound_vars = BTreeSet::new();
        let mut remaining: Vec<usize> = (0..atoms.len()).collect();
        let mut order = Vec::with_capacity(atoms.len());

        while !remaining.is_empty() {
            let costs: Vec<u64> = remaining
                .iter()
                .map(|&idx| self.cost(atoms[idx], &bound_vars))
                .collect();
            let best = costs
                .iter()
                .enumerate()
                .min_by_key(|&(_, cost)| cost)
                .map(|(pos, _)| pos)
                .unwrap();
            let chosen = remaining.remove(best);
            order.push(chosen);
            for arg in &atoms[chosen].args {
                arg.for_each(&mut |arg| {
                    if let Argument::Var(name) = arg {
                        bound_vars.insert(name.clone());
                    }
                });
            }
        }

        order
    }

    fn cost(self, atom: &Atom, bound_vars: &BTreeSet<String>) -> u64 {
        let num_bound = atom
            .args
            .iter()
            .filter(|arg| is_bound(arg, bound_vars))
            .count();
        match self {
            SipsMetric::AllBound => {
                if num_bound == atom.arity() {
                    0
                } else {
                    1
                }
            }
            SipsMetric::MaxBound => (atom.arity() - num_bound) as u64,
            SipsMetric::Strict => 0,
        }
    }
}

fn is_bound(arg: &Argument, bound_vars: &BTreeSet<String>) -> bool {
    match arg {
        Argument::Var(name) => bound_vars.contains(name),
        Argument::Unnamed => true,
        arg if arg.is_constant() => true,
        _ => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::data::ast::{Atom, NumericConstant, QualifiedName};

    fn atom(name: &str, args: Vec<Argument>) -> Atom {
        Atom {
            name: QualifiedName::from(name),
            args,
        }
    }

    fn var(name: &str) -> Argument {
        Argument::Var(name.to_owned())
    }

    #[test]
    fn all_bound_preserves_source_order_without_constants() {
        let a = atom("a", vec![var("x"), var("y")]);
        let b = atom("b", vec![var("y"), var("z")]);
        let order = SipsMetric::AllBound.reorder(&[&a, &b]);
        assert_eq!(order, vec![0, 1]);
    }

    #[test]
    fn all_bound_prefers_fully_bound_atoms() {
        let free = atom("a", vec![var("x"), var("y")]);
        let ground = atom(
            "b",
            vec![Argument::Number(NumericConstant::signed(1)), Argument::Unnamed],
        );
        let order = SipsMetric::AllBound.reorder(&[&free, &ground]);
        assert_eq!(order, vec![1, 0]);
    }

    #[test]
    fn max_bound_counts_columns() {
        let one_bound = atom("a", vec![Argument::Number(NumericConstant::signed(1)), var("x")]);
        let unbound = atom("b", vec![var("y"), var("z")]);
        let order = SipsMetric::MaxBound.reorder(&[&unbound, &one_bound]);
        assert_eq!(order, vec![1, 0]);

        // After picking `a`, `x` is bound, which does not change b's cost
        // relative to source order.
        let order = SipsMetric::MaxBound.reorder(&[&one_bound, &unbound]);
        assert_eq!(order, vec![0, 1]);
    }

    #[test]
    fn metric_names() {
        assert_eq!(SipsMetric::from_name("all-bound"), Some(SipsMetric::AllBound));
        assert_eq!(SipsMetric::from_name("max-bound"), Some(SipsMetric::MaxBound));
        assert_eq!(SipsMetric::from_name("strict"), Some(SipsMetric::Strict));
        assert_eq!(SipsMetric::from_name("selinger"), None);
    }
}
