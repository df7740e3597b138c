//! Mirella – an evaluation engine for the SPARQL query algebra.
//!
//! Mirella takes already parsed query objects and evaluates them against a
//! [`source::DataSource`]: an in-memory graph of triples, a store of quads,
//! a federation of such sources, or remote SPARQL endpoints reached through
//! a caller supplied transport.
//!
//! Evaluation works on *binding tables* ([`table::BindingTable`]): named
//! variable columns and rows of optional terms. Every member of a query
//! produces one table, tagged with flags that tell the combiner how to fold
//! it into its neighbours (join, OPTIONAL left join, UNION or MINUS).
//!
//! ## Modules
//! * [`term`] – Variables, IRIs, blank nodes and literals.
//! * [`source`] – The [`source::FactSource`] seam plus in-memory graphs, stores and federations.
//! * [`pattern`] – Triple/quad patterns and property paths.
//! * [`table`] – Binding tables.
//! * [`matcher`] – Matching one pattern against a source.
//! * [`path`] – Property path expansion.
//! * [`combine`] – The combiner and the inner, outer and difference joins.
//! * [`group`] – Pattern groups with VALUES, BIND and FILTER [NOT] EXISTS.
//! * [`modifier`] – GROUP BY, ORDER BY, projection, DISTINCT, OFFSET and LIMIT.
//! * [`template`] – Materializing triple/quad templates.
//! * [`query`] – Query objects, the evaluation context and results.
//! * [`engine`] / [`asynchronous`] – Synchronous and tokio based entry points.
//! * [`remote`] – Remote endpoints as federation members.
//! * [`config`] – Engine configuration from files and `MIRELLA_*` variables.
//!
//! ## Quick Start
//! ```
//! use mirella::{DataSource, Engine, Graph, Pattern, PatternGroup, SelectQuery, Term};
//! let graph: Graph = [
//!     (Term::iri("ex:a"), Term::iri("ex:knows"), Term::iri("ex:b")),
//!     (Term::iri("ex:b"), Term::iri("ex:knows"), Term::iri("ex:c")),
//! ]
//! .into_iter()
//! .collect();
//! let query = SelectQuery::new().group(
//!     PatternGroup::new().pattern(Pattern::new(Term::var("x"), Term::iri("ex:knows"), Term::var("y"))),
//! );
//! let result = Engine::default().evaluate_select(&query, &DataSource::graph(graph)).unwrap();
//! assert_eq!(result.table.row_count(), 2);
//! ```
//!
//! Logging goes through `tracing`; call [`init_tracing`] (or install your
//! own subscriber) to see it.

pub mod asynchronous;
pub mod combine;
pub mod config;
mod describe;
pub mod engine;
pub mod error;
pub mod expression;
pub mod group;
pub mod matcher;
pub mod modifier;
pub mod path;
pub mod pattern;
pub mod query;
pub mod remote;
pub mod source;
pub mod table;
pub mod template;
pub mod term;

pub use asynchronous::AsyncEngine;
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{MirellaError, Result};
pub use group::PatternGroup;
pub use pattern::{Pattern, PropertyPath};
pub use query::{AskQuery, ConstructQuery, DescribeQuery, SelectQuery, UpdateOperation};
pub use source::{DataSource, Federation, Graph, Quad, Store};
pub use table::BindingTable;
pub use term::{Term, Variable};

/// Installs a formatting subscriber filtered by `RUST_LOG`. Calling it again,
/// or after another subscriber was installed, does nothing.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
