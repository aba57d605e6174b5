//! Sum type layout for ADT lowering: branch identifiers are positions in the
//! type's lexicographically-sorted branch list; a type whose branches are all
//! nullary is an enum and lowers to bare integers.

use crate::data::ast::BranchInit;
use std::collections::BTreeMap;

#[derive(Clone, Debug)]
pub struct Branch {
    pub name: String,
    pub arity: usize,
}

#[derive(Clone, Debug)]
pub struct SumType {
    // Sorted by branch name
    branches: Vec<Branch>,
}

impl SumType {
    pub fn new(mut branches: Vec<Branch>) -> Self {
        branches.sort_by(|a, b| a.name.cmp(&b.name));
        SumType { branches }
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub fn is_enum(&self) -> bool {
        self.branches.iter().all(|branch| branch.arity == 0)
    }

    pub fn branch_id(&self, constructor: &str) -> Option<usize> {
        self.branches
            .binary_search_by(|branch| branch.name.as_str().cmp(constructor))
            .ok()
    }
}

#[derive(Clone, Debug, Default)]
pub struct SumTypeBranches {
    types: Vec<SumType>,
    by_constructor: BTreeMap<String, usize>,
}

impl SumTypeBranches {
    pub fn register(&mut self, sum_type: SumType) {
        let index = self.types.len();
        for branch in sum_type.branches() {
            self.by_constructor.insert(branch.name.clone(), index);
        }
        self.types.push(sum_type);
    }

    pub fn type_of(&self, constructor: &str) -> Option<&SumType> {
        self.by_constructor
            .get(constructor)
            .map(|&index| &self.types[index])
    }

    pub fn is_enum(&self, adt: &BranchInit) -> bool {
        self.type_of(&adt.constructor)
            .is_some_and(|sum_type| sum_type.is_enum())
    }

    /// A branch is "simple" when it carries exactly one argument, so its
    /// payload sits directly next to the tag. Every other non-enum branch
    /// (including nullary ones) wraps its payload in a record.
    pub fn is_simple_branch(&self, adt: &BranchInit) -> bool {
        adt.args.len() == 1
    }

    pub fn branch_id(&self, adt: &BranchInit) -> Option<usize> {
        self.type_of(&adt.constructor)?.branch_id(&adt.constructor)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn branch_ids_follow_name_order() {
        let opt = SumType::new(vec![
            Branch {
                name: "Some".to_owned(),
                arity: 1,
            },
            Branch {
                name: "None".to_owned(),
                arity: 0,
            },
        ]);
        // "None" < "Some" lexicographically
        assert_eq!(opt.branch_id("None"), Some(0));
        assert_eq!(opt.branch_id("Some"), Some(1));
        assert!(!opt.is_enum());
    }

    #[test]
    fn enums_have_only_nullary_branches() {
        let color = SumType::new(vec![
            Branch {
                name: "Red".to_owned(),
                arity: 0,
            },
            Branch {
                name: "Green".to_owned(),
                arity: 0,
            },
        ]);
        assert!(color.is_enum());
        assert_eq!(color.branch_id("Green"), Some(0));
        assert_eq!(color.branch_id("Red"), Some(1));
    }
}
