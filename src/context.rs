//! Shared translator state: the program under translation, the analysis
//! facade, the configuration, and the symbol table being accumulated.

use crate::analysis::{evaluation_arity, Analyses};
use crate::data::ast::{Atom, Clause, ClauseId, DirectiveKind, Program, QualifiedName, Relation, RelationId};
use crate::symbol_table::SymbolTable;
use crate::config::Config;
use crate::Error;
use std::collections::BTreeMap;

pub struct Context<'a> {
    pub program: &'a Program,
    pub analyses: &'a Analyses,
    pub config: &'a Config,
    pub symbols: &'a SymbolTable,
}

impl<'a> Context<'a> {
    pub fn relation(&self, name: &QualifiedName) -> Result<RelationId, Error> {
        self.analyses
            .relation_details
            .relation(name)
            .ok_or_else(|| Error::UnknownRelation(name.to_string()))
    }

    pub fn relation_decl(&self, id: RelationId) -> &'a Relation {
        &self.program.relations[id]
    }

    pub fn clause(&self, id: ClauseId) -> &'a Clause {
        &self.program.clauses[id]
    }

    pub fn clauses_of(&self, relation: RelationId) -> &[ClauseId] {
        self.analyses.relation_details.clauses(relation)
    }

    pub fn is_recursive_clause(&self, id: ClauseId) -> bool {
        self.analyses.recursive_clauses.recursive(id)
    }

    /// Arity the atom evaluates with, including hidden auxiliary columns;
    /// zero for info relations.
    pub fn evaluation_arity(&self, atom: &Atom) -> usize {
        evaluation_arity(
            atom,
            &self.analyses.relation_details,
            &self.analyses.aux_arity,
        )
    }

    pub fn input_directives(&self, relation: RelationId) -> Vec<BTreeMap<String, String>> {
        self.directives(relation, |kind| kind == DirectiveKind::Input)
    }

    pub fn output_directives(&self, relation: RelationId) -> Vec<BTreeMap<String, String>> {
        self.directives(relation, |kind| {
            matches!(kind, DirectiveKind::Output | DirectiveKind::PrintSize)
        })
    }

    fn directives(
        &self,
        relation: RelationId,
        matches: impl Fn(DirectiveKind) -> bool,
    ) -> Vec<BTreeMap<String, String>> {
        let name = &self.relation_decl(relation).name;
        let mut found: Vec<BTreeMap<String, String>> = self
            .program
            .directives
            .iter()
            .filter(|directive| &directive.relation == name && matches(directive.kind))
            .map(|directive| directive.params.clone())
            .collect();

        // A relation with no directives of the requested kind still gets one
        // IO statement with default parameters.
        if found.is_empty() {
            found.push(BTreeMap::new());
        }
        found
    }
}
