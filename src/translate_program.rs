//! Program-level lowering: relation creation, per-stratum compilation with
//! semi-naive fixpoint loops, and assembly of the topologically ordered main
//! sequence.

use crate::analysis::scc_graph::SccId;
use crate::context::Context;
use crate::data::ast::{Argument, Clause, ClauseKind, Representation, RelationId};
use crate::data::operators::ConstraintOp;
use crate::data::ram::{
    Condition, Expr, Operation, RelationDescriptor, Statement,
};
use crate::log_statement;
use crate::names;
use crate::translate_clause::{translate_clause, translate_recursive_clause, TranslationMode};
use crate::Error;
use std::collections::{BTreeMap, BTreeSet};

/// Lowers the whole program. Returns the relation descriptors, the main
/// statement, and the per-stratum subroutines.
pub fn translate_program(
    ctx: &Context,
) -> Result<(Vec<RelationDescriptor>, Statement, BTreeMap<String, Statement>), Error> {
    let mut translator = ProgramTranslator {
        ctx,
        relations: Vec::new(),
        relation_names: BTreeSet::new(),
        subroutines: BTreeMap::new(),
    };

    if ctx.analyses.scc_graph.num_sccs() == 0 {
        return Ok((Vec::new(), Statement::Sequence(Vec::new()), BTreeMap::new()));
    }

    let order = ctx.analyses.scc_graph.topological_order();

    for &scc in &order {
        translator.create_ram_relations(scc)?;
    }

    for (index, &scc) in order.iter().enumerate() {
        let code = translator.translate_scc(scc, index)?;
        translator.add_subroutine(format!("stratum_{}", index), code)?;
    }

    let mut main: Vec<Statement> = (0..order.len())
        .map(|index| Statement::Call(format!("stratum_{}", index)))
        .collect();

    if !main.is_empty() && ctx.config.profile {
        main = vec![Statement::LogTimer {
            inner: Box::new(Statement::Sequence(main)),
            message: log_statement::runtime(),
        }];
    }

    Ok((
        translator.relations,
        Statement::Sequence(main),
        translator.subroutines,
    ))
}

struct ProgramTranslator<'a> {
    ctx: &'a Context<'a>,
    relations: Vec<RelationDescriptor>,
    relation_names: BTreeSet<String>,
    subroutines: BTreeMap<String, Statement>,
}

impl<'a> ProgramTranslator<'a> {
    // --- Relation factory --------------------------------------------------

    fn create_ram_relations(&mut self, scc: SccId) -> Result<(), Error> {
        let recursive = self.ctx.analyses.scc_graph.is_recursive(scc);
        for &relation in self.ctx.analyses.scc_graph.internal_relations(scc) {
            let decl = self.ctx.relation_decl(relation);

            let attribute_names = decl
                .attributes
                .iter()
                .map(|attribute| attribute.name.clone())
                .collect::<Vec<_>>();
            let attribute_type_qualifiers = decl
                .attributes
                .iter()
                .map(|attribute| self.ctx.analyses.type_env.qualifier(&attribute.type_name))
                .collect::<Vec<_>>();

            let descriptor = RelationDescriptor {
                name: names::concrete_name(&decl.name),
                arity: decl.arity(),
                aux_arity: self.ctx.analyses.aux_arity.arity(relation),
                attribute_names,
                attribute_type_qualifiers,
                representation: decl.representation,
            };

            self.add_relation(descriptor.clone())?;

            // Recursive relations evaluate through @delta_/@new_ twins with
            // the same signature.
            if recursive {
                for name in [names::delta_name(&decl.name), names::new_name(&decl.name)] {
                    let twin = RelationDescriptor {
                        name,
                        ..descriptor.clone()
                    };
                    self.add_relation(twin)?;
                }
            }
        }
        Ok(())
    }

    fn add_relation(&mut self, descriptor: RelationDescriptor) -> Result<(), Error> {
        if !self.relation_names.insert(descriptor.name.clone()) {
            return Err(Error::DuplicateRelation(descriptor.name));
        }
        self.relations.push(descriptor);
        Ok(())
    }

    fn add_subroutine(&mut self, name: String, code: Statement) -> Result<(), Error> {
        if self.subroutines.contains_key(&name) {
            return Err(Error::DuplicateSubroutine(name));
        }
        self.subroutines.insert(name, code);
        Ok(())
    }

    // --- Stratum compilation -----------------------------------------------

    fn translate_scc(&self, scc: SccId, index: usize) -> Result<Statement, Error> {
        let graph = &self.ctx.analyses.scc_graph;
        let mut current = Vec::new();

        // Load internal input relations.
        for &relation in graph.internal_input_relations(scc) {
            self.make_ram_load(&mut current, relation);
        }

        // Compute the relations themselves.
        let body = if graph.is_recursive(scc) {
            self.translate_recursive_relation(scc)?
        } else {
            let &relation = graph
                .internal_relations(scc)
                .iter()
                .next()
                .expect("every stratum holds at least one relation");
            self.translate_non_recursive_relation(relation)?
        };
        current.push(body);

        // Store internal output relations.
        for &relation in graph.internal_output_relations(scc) {
            self.make_ram_store(&mut current, relation);
        }

        // Clear relations whose last use was this stratum.
        for &relation in self.ctx.analyses.relation_schedule.step(index).expired() {
            let name = names::concrete_name(&self.ctx.relation_decl(relation).name);
            current.push(Statement::Clear(name));
        }

        Ok(Statement::Sequence(current))
    }

    fn translate_non_recursive_relation(&self, relation: RelationId) -> Result<Statement, Error> {
        let decl = self.ctx.relation_decl(relation);
        let relation_name = names::concrete_name(&decl.name);
        let mut result = Vec::new();

        for &clause_id in self.ctx.clauses_of(relation) {
            if self.ctx.is_recursive_clause(clause_id) {
                continue;
            }
            let clause = self.ctx.clause(clause_id);
            if clause.kind != ClauseKind::Plain {
                continue;
            }

            let mut rule = translate_clause(self.ctx, clause, TranslationMode::Default)?;

            if self.ctx.config.profile {
                let clause_text = log_statement::stringify(&clause.to_string());
                rule = Statement::LogRelationTimer {
                    inner: Box::new(rule),
                    message: log_statement::t_nonrecursive_rule(
                        &decl.name.to_string(),
                        &clause.src_loc,
                        &clause_text,
                    ),
                    relation: relation_name.clone(),
                };
            }

            rule = Statement::DebugInfo {
                inner: Box::new(rule),
                message: format!("{}\nin file {}", clause, clause.src_loc),
            };

            result.push(rule);
        }

        if self.ctx.config.profile {
            if result.is_empty() {
                result.push(Statement::LogSize {
                    relation: relation_name,
                    message: log_statement::n_nonrecursive_relation(
                        &decl.name.to_string(),
                        &decl.src_loc,
                    ),
                });
            } else {
                result = vec![Statement::LogRelationTimer {
                    inner: Box::new(Statement::Sequence(result)),
                    message: log_statement::t_nonrecursive_relation(
                        &decl.name.to_string(),
                        &decl.src_loc,
                    ),
                    relation: relation_name,
                }];
            }
        }

        Ok(Statement::Sequence(result))
    }

    /// Scans `src` and projects every tuple into `dest`. `EQREL` relations
    /// additionally extend `dest` with `src`'s equivalence classes first.
    fn merge_relations(&self, relation: RelationId, dest: String, src: String) -> Statement {
        let decl = self.ctx.relation_decl(relation);

        if decl.arity() == 0 {
            return Statement::Query(Operation::filtered(
                Condition::EmptinessCheck(src).negate(),
                Operation::Insert {
                    relation: dest,
                    values: Vec::new(),
                },
            ));
        }

        let values = (0..decl.arity()).map(|i| Expr::tuple_element(0, i)).collect();
        let stmt = Statement::Query(Operation::Scan {
            relation: src.clone(),
            level: 0,
            inner: Box::new(Operation::Insert {
                relation: dest.clone(),
                values,
            }),
        });

        if decl.representation == Representation::EqRel {
            return Statement::Sequence(vec![
                Statement::Extend {
                    target: dest,
                    source: src,
                },
                stmt,
            ]);
        }
        stmt
    }

    fn translate_recursive_relation(&self, scc: SccId) -> Result<Statement, Error> {
        let preamble = self.generate_stratum_preamble(scc)?;
        let loop_body = self.generate_stratum_main_loop(scc)?;
        let exits = self.generate_stratum_exit_conditions(scc);
        let updates = self.generate_stratum_table_updates(scc);
        let postamble = self.generate_stratum_postamble(scc);

        let mut result = Vec::new();

        if !preamble.is_empty() {
            result.push(Statement::Sequence(preamble));
        }

        if !loop_body.is_empty() && !exits.is_empty() && !updates.is_empty() {
            result.push(Statement::Loop(Box::new(Statement::Sequence(vec![
                Statement::Parallel(loop_body),
                Statement::Sequence(exits),
                Statement::Sequence(updates),
            ]))));
        }

        if !postamble.is_empty() {
            result.push(Statement::Sequence(postamble));
        }

        Ok(Statement::Sequence(result))
    }

    fn generate_stratum_preamble(&self, scc: SccId) -> Result<Vec<Statement>, Error> {
        let mut preamble = Vec::new();
        for &relation in self.ctx.analyses.scc_graph.internal_relations(scc) {
            let name = &self.ctx.relation_decl(relation).name;

            // Compute the non-recursive part, then seed the delta with it.
            preamble.push(self.translate_non_recursive_relation(relation)?);
            preamble.push(self.merge_relations(
                relation,
                names::delta_name(name),
                names::concrete_name(name),
            ));
        }
        Ok(preamble)
    }

    fn generate_stratum_main_loop(&self, scc: SccId) -> Result<Vec<Statement>, Error> {
        let mut loop_body = Vec::new();
        for &relation in self.ctx.analyses.scc_graph.internal_relations(scc) {
            let mut versions = self.create_recursive_clause_versions(scc, relation)?;
            if versions.is_empty() {
                continue;
            }

            if self.ctx.config.profile {
                let decl = self.ctx.relation_decl(relation);
                versions = vec![Statement::LogRelationTimer {
                    inner: Box::new(Statement::Sequence(versions)),
                    message: log_statement::t_recursive_relation(
                        &decl.name.to_string(),
                        &decl.src_loc,
                    ),
                    relation: names::new_name(&decl.name),
                }];
            }

            loop_body.push(Statement::Sequence(versions));
        }
        Ok(loop_body)
    }

    fn create_recursive_clause_versions(
        &self,
        scc: SccId,
        relation: RelationId,
    ) -> Result<Vec<Statement>, Error> {
        let scc_relations = self.ctx.analyses.scc_graph.internal_relations(scc);
        let mut result = Vec::new();

        for &clause_id in self.ctx.clauses_of(relation) {
            if !self.ctx.is_recursive_clause(clause_id) {
                continue;
            }
            let clause = self.ctx.clause(clause_id);
            if clause.kind != ClauseKind::Plain {
                continue;
            }

            // One version per body atom inside the stratum.
            let version_count = clause
                .body_atoms()
                .iter()
                .filter(|atom| {
                    self.ctx
                        .analyses
                        .relation_details
                        .relation(&atom.name)
                        .is_some_and(|rel| scc_relations.contains(&rel))
                })
                .count();

            // Wildcards get names so scans do not degenerate into existence
            // checks.
            let renamed = name_unnamed_variables(clause.clone());

            for version in 0..version_count {
                result.push(translate_recursive_clause(
                    self.ctx,
                    &renamed,
                    scc_relations,
                    version,
                    TranslationMode::Default,
                )?);
            }

            // A user plan naming versions that were never generated means
            // the plan and the rule no longer agree.
            if let Some(plan) = &clause.execution_plan {
                if let Some(&named) = plan.orders.keys().max() {
                    if named >= version_count {
                        return Err(Error::MissingPlanVersions {
                            clause: clause.to_string(),
                            named,
                            generated: version_count,
                        });
                    }
                }
            }
        }

        Ok(result)
    }

    fn generate_stratum_exit_conditions(&self, scc: SccId) -> Vec<Statement> {
        let mut exits = Vec::new();

        // Exit once no relation derived anything new.
        let mut emptiness: Option<Condition> = None;
        for &relation in self.ctx.analyses.scc_graph.internal_relations(scc) {
            let name = names::new_name(&self.ctx.relation_decl(relation).name);
            emptiness = Some(Condition::conjoin(
                emptiness,
                Condition::EmptinessCheck(name),
            ));
        }
        if let Some(emptiness) = emptiness {
            exits.push(Statement::Exit(emptiness));
        }

        // Exit once any limitsize relation reached its cap.
        for &relation in self.ctx.analyses.scc_graph.internal_relations(scc) {
            if let Some(limit) = self.ctx.analyses.io_types.limit_size(relation) {
                let name = names::concrete_name(&self.ctx.relation_decl(relation).name);
                exits.push(Statement::Exit(Condition::Constraint {
                    op: ConstraintOp::Ge,
                    lhs: Expr::RelationSize(name),
                    rhs: Expr::SignedConstant(limit),
                }));
            }
        }

        exits
    }

    fn generate_stratum_table_updates(&self, scc: SccId) -> Vec<Statement> {
        let mut updates = Vec::new();
        for &relation in self.ctx.analyses.scc_graph.internal_relations(scc) {
            let decl = self.ctx.relation_decl(relation);
            let name = &decl.name;

            let mut update = Statement::Sequence(vec![
                self.merge_relations(
                    relation,
                    names::concrete_name(name),
                    names::new_name(name),
                ),
                Statement::Swap(names::delta_name(name), names::new_name(name)),
                Statement::Clear(names::new_name(name)),
            ]);

            if self.ctx.config.profile {
                update = Statement::LogRelationTimer {
                    inner: Box::new(update),
                    message: log_statement::c_recursive_relation(
                        &name.to_string(),
                        &decl.src_loc,
                    ),
                    relation: names::new_name(name),
                };
            }

            updates.push(update);
        }
        updates
    }

    fn generate_stratum_postamble(&self, scc: SccId) -> Vec<Statement> {
        let mut postamble = Vec::new();
        for &relation in self.ctx.analyses.scc_graph.internal_relations(scc) {
            let name = &self.ctx.relation_decl(relation).name;
            postamble.push(Statement::Clear(names::delta_name(name)));
            postamble.push(Statement::Clear(names::new_name(name)));
        }
        postamble
    }

    // --- IO ----------------------------------------------------------------

    fn make_ram_load(&self, current: &mut Vec<Statement>, relation: RelationId) {
        let decl = self.ctx.relation_decl(relation);
        for directives in self.ctx.input_directives(relation) {
            let mut statement = Statement::Io {
                relation: names::concrete_name(&decl.name),
                directives,
            };
            if self.ctx.config.profile {
                statement = Statement::LogRelationTimer {
                    inner: Box::new(statement),
                    message: log_statement::t_relation_load_time(
                        &decl.name.to_string(),
                        &decl.src_loc,
                    ),
                    relation: names::concrete_name(&decl.name),
                };
            }
            current.push(statement);
        }
    }

    fn make_ram_store(&self, current: &mut Vec<Statement>, relation: RelationId) {
        let decl = self.ctx.relation_decl(relation);
        for directives in self.ctx.output_directives(relation) {
            let mut statement = Statement::Io {
                relation: names::concrete_name(&decl.name),
                directives,
            };
            if self.ctx.config.profile {
                statement = Statement::LogRelationTimer {
                    inner: Box::new(statement),
                    message: log_statement::t_relation_save_time(
                        &decl.name.to_string(),
                        &decl.src_loc,
                    ),
                    relation: names::concrete_name(&decl.name),
                };
            }
            current.push(statement);
        }
    }
}

fn name_unnamed_variables(clause: Clause) -> Clause {
    let mut counter = 0;
    clause.map_arguments(&mut |arg| match arg {
        Argument::Unnamed => {
            counter += 1;
            Argument::Var(format!("_unnamed_var{}", counter))
        }
        other => other,
    })
}
