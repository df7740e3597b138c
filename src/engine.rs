//! The synchronous query evaluator.
//!
//! One call evaluates every top-level member of a query body into a fresh
//! [`EvaluationContext`], combines the member tables into the raw result
//! and then shapes that result according to the query kind.

use tracing::{debug, info};

use crate::combine::combine_tables;
use crate::config::EngineConfig;
use crate::describe::{assemble_description, describe_probes};
use crate::error::Result;
use crate::group::{evaluate_group_on, merge_federated};
use crate::matcher::evaluate_pattern;
use crate::modifier::apply_modifiers;
use crate::query::{
    silenced, AskQuery, AskResult, ConstructQuery, DescribeQuery, EvaluationContext, GraphResult,
    MemberId, QueryBody, QueryMember, SelectQuery, SelectResult, UpdateOperation,
};
use crate::source::DataSource;
use crate::table::BindingTable;
use crate::template::materialize_templates;
use crate::term::Term;

#[derive(Clone, Debug, Default)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn evaluate_select(&self, query: &SelectQuery, source: &DataSource) -> Result<SelectResult> {
        let outcome = self.select_table(query, source);
        let table = silenced(query.body.silent, outcome, BindingTable::new)?;
        info!(rows = table.row_count(), columns = table.column_count(), "select evaluated");
        Ok(SelectResult { table })
    }

    pub fn evaluate_ask(&self, query: &AskQuery, source: &DataSource) -> Result<AskResult> {
        let outcome = self.evaluate_body(&query.body, source);
        let raw = silenced(query.body.silent, outcome, BindingTable::new)?;
        Ok(AskResult { value: raw.row_count() > 0 })
    }

    pub fn evaluate_construct(&self, query: &ConstructQuery, source: &DataSource) -> Result<GraphResult> {
        let outcome = self.evaluate_body(&query.body, source).map(|raw| {
            construct(query, &raw, &self.config.default_context())
        });
        let result = silenced(query.body.silent, outcome, || GraphResult::empty(false))?;
        info!(facts = result.len(), "construct evaluated");
        Ok(result)
    }

    pub fn evaluate_describe(&self, query: &DescribeQuery, source: &DataSource) -> Result<GraphResult> {
        let quads = source.has_contexts();
        let outcome = self.evaluate_body(&query.body, source).and_then(|raw| {
            let probes = describe_probes(query, &raw, quads);
            debug!(probes = probes.len(), "describing");
            let mut tables = Vec::with_capacity(probes.len());
            for probe in &probes {
                tables.push(evaluate_pattern(probe, source)?);
            }
            Ok(assemble_description(query, &probes, tables, quads, &self.config.default_context()))
        });
        let result = silenced(query.body.silent, outcome, || GraphResult::empty(quads))?;
        info!(facts = result.len(), "describe evaluated");
        Ok(result)
    }

    /// The quads an INSERT ... WHERE would add. Apply them with
    /// [`crate::source::Store::insert_facts`].
    pub fn evaluate_insert(&self, operation: &UpdateOperation, source: &DataSource) -> Result<GraphResult> {
        self.evaluate_update(operation, source, "insert")
    }

    /// The quads a DELETE ... WHERE would remove. Apply them with
    /// [`crate::source::Store::delete_facts`].
    pub fn evaluate_delete(&self, operation: &UpdateOperation, source: &DataSource) -> Result<GraphResult> {
        self.evaluate_update(operation, source, "delete")
    }

    fn evaluate_update(
        &self,
        operation: &UpdateOperation,
        source: &DataSource,
        kind: &'static str,
    ) -> Result<GraphResult> {
        let outcome = self.evaluate_body(&operation.body, source).map(|raw| {
            update(operation, &raw, &self.config.default_context())
        });
        let result = silenced(operation.body.silent, outcome, || GraphResult::empty(true))?;
        info!(operation = kind, facts = result.len(), "update evaluated");
        Ok(result)
    }

    fn select_table(&self, query: &SelectQuery, source: &DataSource) -> Result<BindingTable> {
        let raw = self.evaluate_body(&query.body, source)?;
        apply_modifiers(raw, &query.modifiers)
    }

    fn evaluate_body(&self, body: &QueryBody, source: &DataSource) -> Result<BindingTable> {
        let ids = MemberId::assign(&body.members);
        let mut context = EvaluationContext::new();
        for (id, member) in ids.iter().zip(&body.members) {
            let table = match member {
                QueryMember::Group(group) => {
                    for leaf in source.leaves() {
                        context.record_intermediate(*id, evaluate_group_on(group, leaf)?);
                    }
                    merge_federated(group, context.take_intermediates(*id))
                }
                QueryMember::SubQuery(query) => {
                    let mut table = self.select_table(query, source)?;
                    query.tag(&mut table);
                    table
                }
            };
            debug!(member = ?id, rows = table.row_count(), "member evaluated");
            context.record(*id, table);
        }
        let raw = combine_tables(context.collect(&ids)?);
        debug!(members = ids.len(), rows = raw.row_count(), "raw result combined");
        Ok(raw)
    }
}

pub(crate) fn construct(
    query: &ConstructQuery,
    raw: &BindingTable,
    default_context: &Term,
) -> GraphResult {
    let mut table = materialize_templates(&query.templates, raw, false, default_context);
    table.distinct();
    if let Some(offset) = query.offset {
        table.skip(offset);
    }
    if let Some(limit) = query.limit {
        table.truncate(limit);
    }
    GraphResult { table }
}

pub(crate) fn update(
    operation: &UpdateOperation,
    raw: &BindingTable,
    default_context: &Term,
) -> GraphResult {
    GraphResult { table: materialize_templates(&operation.templates, raw, true, default_context) }
}
