//! The same evaluation as [`crate::engine::Engine`], with every pattern,
//! property path, EXISTS probe, sub-query and federation member turned into
//! an independently awaitable unit.
//!
//! Units are joined with `try_join_all`, which hands results back in
//! declaration order, so the order in which they complete never shows up in
//! a result. Only remote members actually suspend; in-memory sources are
//! matched inline.

use futures_util::future::{try_join_all, BoxFuture, FutureExt};
use tracing::{debug, info};

use crate::combine::combine_tables;
use crate::config::EngineConfig;
use crate::describe::{assemble_description, describe_probes};
use crate::engine::{construct, update};
use crate::error::{MirellaError, Result};
use crate::group::{assemble_group, merge_federated, Filter, GroupInputs, GroupMember, PatternGroup};
use crate::matcher::{match_facts, merge_members};
use crate::modifier::apply_modifiers;
use crate::path::{expand_path, finish_path};
use crate::pattern::{Pattern, PropertyPath};
use crate::query::{
    silenced, AskQuery, AskResult, ConstructQuery, DescribeQuery, EvaluationContext, GraphResult,
    MemberId, QueryBody, QueryMember, SelectQuery, SelectResult, UpdateOperation,
};
use crate::remote::{select_star, settle, RemoteMember};
use crate::source::DataSource;
use crate::table::BindingTable;

async fn query_remote(member: &RemoteMember, pattern: &Pattern) -> Result<BindingTable> {
    let query = select_star(pattern);
    let address = member.endpoint.address();
    debug!(endpoint = address, %query, "querying remote member");
    let call = member.endpoint.query_async(&query, member.options.method, member.options.timeout);
    let outcome = match member.options.timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(outcome) => outcome,
            Err(_) => Err(MirellaError::remote(address, &format!("no answer within {limit:?}"))),
        },
        None => call.await,
    };
    settle(member, pattern, outcome)
}

pub fn evaluate_pattern_async<'a>(
    pattern: &'a Pattern,
    source: &'a DataSource,
) -> BoxFuture<'a, Result<BindingTable>> {
    async move {
        match source {
            DataSource::Graph(facts) | DataSource::Store(facts) => match_facts(pattern, facts.as_ref()),
            DataSource::Remote(member) => query_remote(member, pattern).await,
            DataSource::Federation(federation) => {
                let tables = try_join_all(
                    federation.members().iter().map(|member| evaluate_pattern_async(pattern, member)),
                )
                .await?;
                Ok(merge_members(pattern, tables))
            }
        }
    }
    .boxed()
}

pub async fn evaluate_path_async(path: &PropertyPath, source: &DataSource) -> Result<BindingTable> {
    let patterns = expand_path(path)?;
    let tables = try_join_all(patterns.iter().map(|pattern| evaluate_pattern_async(pattern, source))).await?;
    Ok(finish_path(tables))
}

async fn fetch_member(member: &GroupMember, source: &DataSource) -> Result<Option<BindingTable>> {
    Ok(match member {
        GroupMember::Pattern(pattern) => Some(evaluate_pattern_async(pattern, source).await?),
        GroupMember::PropertyPath(path) => Some(evaluate_path_async(path, source).await?),
        GroupMember::Values(values) => Some(values.table()?),
        GroupMember::Bind(_) => None,
    })
}

async fn fetch_exists(filter: &Filter, source: &DataSource) -> Result<Option<BindingTable>> {
    Ok(match filter {
        Filter::Exists { pattern, .. } => Some(evaluate_pattern_async(pattern, source).await?),
        Filter::Expression(_) => None,
    })
}

pub async fn evaluate_group_on_async(group: &PatternGroup, source: &DataSource) -> Result<BindingTable> {
    let (tables, exists) = futures_util::try_join!(
        try_join_all(group.members.iter().map(|member| fetch_member(member, source))),
        try_join_all(group.filters.iter().map(|filter| fetch_exists(filter, source))),
    )?;
    assemble_group(group, GroupInputs { tables, exists })
}

#[derive(Clone, Debug, Default)]
pub struct AsyncEngine {
    config: EngineConfig,
}

impl AsyncEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn evaluate_select(&self, query: &SelectQuery, source: &DataSource) -> Result<SelectResult> {
        let outcome = self.select_table(query, source).await;
        let table = silenced(query.body.silent, outcome, BindingTable::new)?;
        info!(rows = table.row_count(), columns = table.column_count(), "select evaluated");
        Ok(SelectResult { table })
    }

    pub async fn evaluate_ask(&self, query: &AskQuery, source: &DataSource) -> Result<AskResult> {
        let outcome = self.evaluate_body(&query.body, source).await;
        let raw = silenced(query.body.silent, outcome, BindingTable::new)?;
        Ok(AskResult { value: raw.row_count() > 0 })
    }

    pub async fn evaluate_construct(&self, query: &ConstructQuery, source: &DataSource) -> Result<GraphResult> {
        let outcome = self.evaluate_body(&query.body, source).await;
        let outcome = outcome.map(|raw| construct(query, &raw, &self.config.default_context()));
        let result = silenced(query.body.silent, outcome, || GraphResult::empty(false))?;
        info!(facts = result.len(), "construct evaluated");
        Ok(result)
    }

    pub async fn evaluate_describe(&self, query: &DescribeQuery, source: &DataSource) -> Result<GraphResult> {
        let quads = source.has_contexts();
        let outcome = async {
            let raw = self.evaluate_body(&query.body, source).await?;
            let probes = describe_probes(query, &raw, quads);
            debug!(probes = probes.len(), "describing");
            let tables = try_join_all(probes.iter().map(|probe| evaluate_pattern_async(probe, source))).await?;
            let result = assemble_description(query, &probes, tables, quads, &self.config.default_context());
            Ok::<_, MirellaError>(result)
        }
        .await;
        let result = silenced(query.body.silent, outcome, || GraphResult::empty(quads))?;
        info!(facts = result.len(), "describe evaluated");
        Ok(result)
    }

    pub async fn evaluate_insert(&self, operation: &UpdateOperation, source: &DataSource) -> Result<GraphResult> {
        self.evaluate_update(operation, source, "insert").await
    }

    pub async fn evaluate_delete(&self, operation: &UpdateOperation, source: &DataSource) -> Result<GraphResult> {
        self.evaluate_update(operation, source, "delete").await
    }

    async fn evaluate_update(
        &self,
        operation: &UpdateOperation,
        source: &DataSource,
        kind: &'static str,
    ) -> Result<GraphResult> {
        let outcome = self.evaluate_body(&operation.body, source).await;
        let outcome = outcome.map(|raw| update(operation, &raw, &self.config.default_context()));
        let result = silenced(operation.body.silent, outcome, || GraphResult::empty(true))?;
        info!(operation = kind, facts = result.len(), "update evaluated");
        Ok(result)
    }

    fn select_table<'a>(
        &'a self,
        query: &'a SelectQuery,
        source: &'a DataSource,
    ) -> BoxFuture<'a, Result<BindingTable>> {
        async move {
            let raw = self.evaluate_body(&query.body, source).await?;
            apply_modifiers(raw, &query.modifiers)
        }
        .boxed()
    }

    async fn evaluate_member(&self, member: &QueryMember, source: &DataSource) -> Result<Vec<BindingTable>> {
        match member {
            QueryMember::Group(group) => {
                try_join_all(source.leaves().into_iter().map(|leaf| evaluate_group_on_async(group, leaf))).await
            }
            QueryMember::SubQuery(query) => {
                let mut table = self.select_table(query, source).await?;
                query.tag(&mut table);
                Ok(vec![table])
            }
        }
    }

    async fn evaluate_body(&self, body: &QueryBody, source: &DataSource) -> Result<BindingTable> {
        let ids = MemberId::assign(&body.members);
        let evaluated = try_join_all(body.members.iter().map(|member| self.evaluate_member(member, source))).await?;
        let mut context = EvaluationContext::new();
        for ((id, member), tables) in ids.iter().zip(&body.members).zip(evaluated) {
            let table = match member {
                QueryMember::Group(group) => {
                    for table in tables {
                        context.record_intermediate(*id, table);
                    }
                    merge_federated(group, context.take_intermediates(*id))
                }
                QueryMember::SubQuery(_) => combine_tables(tables),
            };
            debug!(member = ?id, rows = table.row_count(), "member evaluated");
            context.record(*id, table);
        }
        let raw = combine_tables(context.collect(&ids)?);
        debug!(members = ids.len(), rows = raw.row_count(), "raw result combined");
        Ok(raw)
    }
}
