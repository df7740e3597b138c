//! Filling triple/quad templates from a solution table (CONSTRUCT, DESCRIBE,
//! INSERT/DELETE).

use tracing::trace;

use crate::pattern::{Pattern, Position};
use crate::source::Quad;
use crate::table::{BindingTable, Row, RowView};
use crate::term::{Term, Variable};

pub const CONTEXT: &str = "CONTEXT";
pub const SUBJECT: &str = "SUBJECT";
pub const PREDICATE: &str = "PREDICATE";
pub const OBJECT: &str = "OBJECT";

pub(crate) fn fact_columns(needs_context: bool) -> Vec<Variable> {
    let mut columns = Vec::with_capacity(4);
    if needs_context {
        columns.push(Variable::new(CONTEXT));
    }
    columns.extend([SUBJECT, PREDICATE, OBJECT].map(Variable::new));
    columns
}

/// Whether a resolved term may stand in the given position of a fact.
fn fits(position: Position, term: &Term) -> bool {
    match position {
        Position::Context | Position::Subject => !term.is_literal() && !term.is_variable(),
        Position::Predicate => term.is_resource() && !term.is_blank(),
        Position::Object => !term.is_variable(),
    }
}

/// Resolves one template against one row; `None` when the row cannot
/// produce a well-formed fact.
fn instantiate(
    template: &Pattern,
    row: Option<&RowView<'_>>,
    needs_context: bool,
    default_context: &Term,
) -> Option<Row> {
    let resolve = |position: Position, term: &Term| -> Option<Term> {
        let resolved = match (term.as_variable(), row) {
            (Some(variable), Some(row)) => row.get(variable)?.clone(),
            (Some(_), None) => return None,
            (None, _) => term.clone(),
        };
        fits(position, &resolved).then_some(resolved)
    };
    let mut fact = Vec::with_capacity(4);
    if needs_context {
        let context = match &template.context {
            Some(context) => resolve(Position::Context, context)?,
            None => default_context.clone(),
        };
        fact.push(Some(context));
    }
    fact.push(Some(resolve(Position::Subject, &template.subject)?));
    fact.push(Some(resolve(Position::Predicate, &template.predicate)?));
    fact.push(Some(resolve(Position::Object, &template.object)?));
    Some(fact)
}

pub fn materialize_templates(
    templates: &[Pattern],
    table: &BindingTable,
    needs_context: bool,
    default_context: &Term,
) -> BindingTable {
    let mut facts = BindingTable::with_columns(fact_columns(needs_context));
    for template in templates {
        // the context of a template only matters when quads are produced
        let variables: Vec<&Variable> = template
            .positions()
            .into_iter()
            .filter(|(position, _)| needs_context || *position != Position::Context)
            .filter_map(|(_, term)| term.as_variable())
            .collect();
        if variables.is_empty() {
            if let Some(fact) = instantiate(template, None, needs_context, default_context) {
                facts.push_row(fact);
            }
            continue;
        }
        if let Some(missing) = variables.iter().find(|v| !table.has_column(v)) {
            trace!(%template, %missing, "template variable is not a column, skipping template");
            continue;
        }
        for row in table.views() {
            if let Some(fact) = instantiate(template, Some(&row), needs_context, default_context) {
                facts.push_row(fact);
            }
        }
    }
    facts
}

impl BindingTable {
    /// Reads a materialized `[?CONTEXT,] ?SUBJECT ?PREDICATE ?OBJECT` table
    /// back as facts. Rows with an unbound position are ignored.
    pub fn facts(&self) -> Vec<Quad> {
        let context = Variable::new(CONTEXT);
        let [subject, predicate, object] = [SUBJECT, PREDICATE, OBJECT].map(Variable::new);
        self.views()
            .filter_map(|row| {
                Some(Quad {
                    context: row.get(&context).cloned(),
                    subject: row.get(&subject)?.clone(),
                    predicate: row.get(&predicate)?.clone(),
                    object: row.get(&object)?.clone(),
                })
            })
            .collect()
    }
}
