//! Property paths are rewritten into chains of plain patterns.
//!
//! Hop `i` runs from the path start (or the synthetic variable `#i`) to the
//! path end (or `#i+1`). Alternative hops yield one pattern per edge, all
//! but the last flagged to union with their successor, so the combiner
//! OR-merges them. Synthetic columns are dropped once the chain is joined.

use tracing::debug;

use crate::combine::combine_tables;
use crate::error::{MirellaError, Result};
use crate::matcher::evaluate_pattern;
use crate::pattern::{PathEdge, PathStep, Pattern, PropertyPath};
use crate::source::DataSource;
use crate::table::BindingTable;
use crate::term::{Term, Variable};

const PATH_NAMESPACE: &str = "path";

fn edge_pattern(subject: &Term, edge: &PathEdge, object: &Term) -> Pattern {
    if edge.inverse {
        Pattern::new(object.clone(), edge.property.clone(), subject.clone())
    } else {
        Pattern::new(subject.clone(), edge.property.clone(), object.clone())
    }
}

pub fn expand_path(path: &PropertyPath) -> Result<Vec<Pattern>> {
    let hops = path.steps.len();
    if hops == 0 {
        return Err(MirellaError::Configuration(format!("property path {path} has no steps")));
    }
    let link = |ordinal: usize| Term::Variable(Variable::synthetic(PATH_NAMESPACE, ordinal));
    let mut patterns = Vec::with_capacity(hops);
    for (i, step) in path.steps.iter().enumerate() {
        let subject = if i == 0 { path.start.clone() } else { link(i) };
        let object = if i + 1 == hops { path.end.clone() } else { link(i + 1) };
        match step {
            PathStep::Sequence(edge) => patterns.push(edge_pattern(&subject, edge, &object)),
            PathStep::Alternative(edges) => {
                if edges.is_empty() {
                    return Err(MirellaError::Configuration(format!(
                        "property path {path} has an empty alternative"
                    )));
                }
                let last = edges.len() - 1;
                for (j, edge) in edges.iter().enumerate() {
                    let pattern = edge_pattern(&subject, edge, &object);
                    patterns.push(if j < last { pattern.union_with_next() } else { pattern });
                }
            }
        }
    }
    Ok(patterns)
}

/// Joins the tables of an expanded path and strips the synthetic columns.
pub(crate) fn finish_path(tables: Vec<BindingTable>) -> BindingTable {
    combine_tables(tables).drop_columns(Variable::is_synthetic)
}

pub fn evaluate_path(path: &PropertyPath, source: &DataSource) -> Result<BindingTable> {
    let patterns = expand_path(path)?;
    debug!(%path, patterns = patterns.len(), "evaluating property path");
    let mut tables = Vec::with_capacity(patterns.len());
    for pattern in &patterns {
        tables.push(evaluate_pattern(pattern, source)?);
    }
    Ok(finish_path(tables))
}
