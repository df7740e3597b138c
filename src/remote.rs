//! Remote SPARQL endpoints as federation members.
//!
//! The transport itself lives outside the engine: implementors of
//! [`RemoteEndpoint`] receive a serialized query plus the HTTP method and
//! hand back an already parsed [`BindingTable`]. The engine only builds the
//! trivial `SELECT *` wrapper around a single pattern and applies the
//! silent/timeout policy of the member.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::Deserialize;
use tracing::warn;

use crate::config::EngineConfig;
use crate::error::{MirellaError, Result};
use crate::pattern::Pattern;
use crate::table::BindingTable;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

pub trait RemoteEndpoint: Send + Sync {
    fn address(&self) -> &str;
    /// Sends the query and returns the parsed solutions. Implementations
    /// should honour the timeout and report transport failures through
    /// [`MirellaError::remote`].
    fn query(&self, query: &str, method: HttpMethod, timeout: Option<Duration>) -> Result<BindingTable>;
    /// Awaitable variant used by the async engine.
    fn query_async<'a>(
        &'a self,
        query: &'a str,
        method: HttpMethod,
        timeout: Option<Duration>,
    ) -> BoxFuture<'a, Result<BindingTable>> {
        Box::pin(async move { self.query(query, method, timeout) })
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RemoteOptions {
    pub method: HttpMethod,
    pub timeout: Option<Duration>,
    /// Failures of a silent member evaluate to an empty table.
    pub silent: bool,
}

impl RemoteOptions {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            method: config.remote_method,
            timeout: config.remote_timeout(),
            silent: false,
        }
    }
}

#[derive(Clone)]
pub struct RemoteMember {
    pub endpoint: Arc<dyn RemoteEndpoint>,
    pub options: RemoteOptions,
}

impl RemoteMember {
    pub fn new(endpoint: Arc<dyn RemoteEndpoint>, options: RemoteOptions) -> Self {
        Self { endpoint, options }
    }
}

/// `SELECT * WHERE { ... }` around one pattern.
pub fn select_star(pattern: &Pattern) -> String {
    let triple = format!("{} {} {} .", pattern.subject, pattern.predicate, pattern.object);
    match &pattern.context {
        Some(context) => format!("SELECT * WHERE {{ GRAPH {context} {{ {triple} }} }}"),
        None => format!("SELECT * WHERE {{ {triple} }}"),
    }
}

/// Turns the outcome of a remote call into the pattern's table: columns are
/// aligned with the pattern's variables, and failures are either wrapped
/// with the endpoint address or, for silent members, swallowed.
pub(crate) fn settle(
    member: &RemoteMember,
    pattern: &Pattern,
    outcome: Result<BindingTable>,
) -> Result<BindingTable> {
    let variables = pattern.variables();
    match outcome {
        Ok(answer) => {
            let mut table = if variables.is_empty() {
                if answer.is_empty() { BindingTable::new() } else { BindingTable::unit() }
            } else {
                answer.project(&variables)
            };
            table.flags = pattern.flags.table_flags();
            Ok(table)
        }
        Err(e) if member.options.silent => {
            warn!(endpoint = member.endpoint.address(), error = %e, "silent remote member failed");
            let mut table = BindingTable::with_columns(variables);
            table.flags = pattern.flags.table_flags();
            Ok(table)
        }
        Err(e) if e.is_remote() => Err(e),
        Err(e) => Err(MirellaError::remote(member.endpoint.address(), &e.to_string())),
    }
}
