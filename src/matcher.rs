//! Matching a single triple/quad pattern against a data source.
//!
//! The pattern's *hole signature* (which positions hold variables) decides
//! the columns of the produced table; bound positions become the selector
//! handed to the source. A variable occurring in several positions keeps
//! only the facts whose terms agree in all of them.

use tracing::{debug, trace};

use crate::error::Result;
use crate::pattern::{Pattern, Position};
use crate::remote::{select_star, settle};
use crate::source::{DataSource, FactSource, Quad, Selector};
use crate::table::{BindingTable, Row};
use crate::term::{Term, Variable};

pub fn evaluate_pattern(pattern: &Pattern, source: &DataSource) -> Result<BindingTable> {
    let table = match source {
        DataSource::Graph(facts) | DataSource::Store(facts) => match_facts(pattern, facts.as_ref())?,
        DataSource::Federation(federation) => {
            let mut tables = Vec::with_capacity(federation.len());
            for member in federation.members() {
                tables.push(evaluate_pattern(pattern, member)?);
            }
            merge_members(pattern, tables)
        }
        DataSource::Remote(member) => {
            let query = select_star(pattern);
            debug!(endpoint = member.endpoint.address(), %query, "querying remote member");
            let outcome = member.endpoint.query(&query, member.options.method, member.options.timeout);
            settle(member, pattern, outcome)?
        }
    };
    trace!(%pattern, source = source.kind(), rows = table.row_count(), "pattern evaluated");
    Ok(table)
}

/// Unions the tables a federation's members produced for one pattern.
pub(crate) fn merge_members(pattern: &Pattern, tables: Vec<BindingTable>) -> BindingTable {
    let variables = pattern.variables();
    let mut merged = BindingTable::with_columns(variables.iter().cloned());
    for table in tables {
        merged.merge(table);
    }
    if variables.is_empty() && !merged.is_empty() {
        merged = BindingTable::unit();
    }
    merged.flags = pattern.flags.table_flags();
    merged
}

/// Literals can only ever occupy the object position.
pub(crate) fn admits(position: Position, term: &Term) -> bool {
    position == Position::Object || !term.is_literal()
}

fn term_at(quad: &Quad, position: Position) -> Option<&Term> {
    match position {
        Position::Context => quad.context.as_ref(),
        Position::Subject => Some(&quad.subject),
        Position::Predicate => Some(&quad.predicate),
        Position::Object => Some(&quad.object),
    }
}

pub fn match_facts(pattern: &Pattern, source: &dyn FactSource) -> Result<BindingTable> {
    let positions = pattern.positions();
    let mut table = BindingTable::with_columns(pattern.variables());
    table.flags = pattern.flags.table_flags();

    if let Some((position, term)) = positions
        .iter()
        .find(|(position, term)| !term.is_variable() && !admits(*position, term))
    {
        debug!(%pattern, ?position, %term, "literal in a resource-only position, no matches");
        return Ok(table);
    }

    let bound = |wanted: Position| {
        positions
            .iter()
            .find(|(position, term)| *position == wanted && !term.is_variable())
            .map(|(_, term)| *term)
    };
    let selector = Selector {
        context: bound(Position::Context),
        subject: bound(Position::Subject),
        predicate: bound(Position::Predicate),
        object: bound(Position::Object),
    };
    let facts = source.select(&selector)?;

    // every column lists the positions its variable occupies
    let holes: Vec<(Variable, Vec<Position>)> = table
        .columns()
        .iter()
        .map(|variable| {
            let occupied = positions
                .iter()
                .filter(|(_, term)| term.as_variable() == Some(variable))
                .map(|(position, _)| *position)
                .collect();
            (variable.clone(), occupied)
        })
        .collect();

    if holes.is_empty() {
        if !facts.is_empty() {
            table.push_row(Vec::new());
        }
        return Ok(table);
    }

    'facts: for fact in &facts {
        let mut row: Row = Vec::with_capacity(holes.len());
        for (variable, occupied) in &holes {
            let mut value: Option<&Term> = None;
            for position in occupied {
                let Some(term) = term_at(fact, *position) else {
                    continue 'facts;
                };
                if !admits(*position, term) {
                    trace!(%variable, %term, ?position, "skipping structurally invalid binding");
                    continue 'facts;
                }
                match value {
                    Some(seen) if seen != term => continue 'facts,
                    _ => value = Some(term),
                }
            }
            row.push(value.cloned());
        }
        table.push_row(row);
    }
    Ok(table)
}
