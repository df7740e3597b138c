//! DESCRIBE: every described term turns into a handful of probe patterns
//! whose matches are materialized as facts about the term.
//!
//! Resources are probed in subject, predicate and object position (and, on
//! sources with contexts, as a context). Blank nodes only in subject and
//! object position, literals only as objects. Variables are resolved
//! through the values the raw result binds them to.

use std::collections::HashSet;

use crate::pattern::Pattern;
use crate::query::{DescribeQuery, GraphResult};
use crate::table::{BindingTable, ColumnHasher};
use crate::template::{materialize_templates, CONTEXT, OBJECT, PREDICATE, SUBJECT};
use crate::term::{Term, Variable};

/// The probe patterns for every term the query describes. Each probe is
/// also the template its own matches are materialized through.
pub(crate) fn describe_probes(query: &DescribeQuery, raw: &BindingTable, quads: bool) -> Vec<Pattern> {
    let terms: Vec<Term> = if query.terms.is_empty() {
        raw.columns().iter().cloned().map(Term::Variable).collect()
    } else {
        query.terms.clone()
    };
    let mut described = HashSet::<Term, ColumnHasher>::default();
    let mut probes = Vec::new();
    for term in terms {
        let values = match &term {
            Term::Variable(variable) => raw.column_values(variable),
            _ => vec![term],
        };
        for value in values {
            if described.insert(value.clone()) {
                probes.extend(probes_for(&value, quads));
            }
        }
    }
    probes
}

fn probes_for(term: &Term, quads: bool) -> Vec<Pattern> {
    let [s, p, o, c] = [SUBJECT, PREDICATE, OBJECT, CONTEXT].map(|name| Term::Variable(Variable::new(name)));
    let in_context = |pattern: Pattern| match quads {
        true => Pattern { context: Some(c.clone()), ..pattern },
        false => pattern,
    };
    let mut probes = Vec::with_capacity(4);
    match term {
        Term::Variable(_) => {}
        Term::PlainLiteral { .. } | Term::TypedLiteral { .. } => {
            probes.push(in_context(Pattern::new(s.clone(), p.clone(), term.clone())));
        }
        Term::Resource { blank: true, .. } => {
            probes.push(in_context(Pattern::new(term.clone(), p.clone(), o.clone())));
            probes.push(in_context(Pattern::new(s.clone(), p.clone(), term.clone())));
        }
        Term::Resource { blank: false, .. } => {
            probes.push(in_context(Pattern::new(term.clone(), p.clone(), o.clone())));
            probes.push(in_context(Pattern::new(s.clone(), term.clone(), o.clone())));
            probes.push(in_context(Pattern::new(s.clone(), p.clone(), term.clone())));
            if quads {
                probes.push(Pattern::quad(term.clone(), s, p, o));
            }
        }
    }
    probes
}

/// Materializes the probe matches into one deduplicated fact table.
pub(crate) fn assemble_description(
    query: &DescribeQuery,
    probes: &[Pattern],
    tables: Vec<BindingTable>,
    quads: bool,
    default_context: &Term,
) -> GraphResult {
    let mut result = GraphResult::empty(quads);
    for (probe, table) in probes.iter().zip(tables) {
        result.table.merge(materialize_templates(std::slice::from_ref(probe), &table, quads, default_context));
    }
    result.table.distinct();
    if let Some(offset) = query.offset {
        result.table.skip(offset);
    }
    if let Some(limit) = query.limit {
        result.table.truncate(limit);
    }
    result
}
