//! Evaluation of one conjunctive pattern group.
//!
//! Members are visited in declaration order. Patterns, property paths and
//! inline VALUES each contribute a table to an accumulation; a BIND member
//! is a barrier: everything accumulated so far is combined, extended with
//! the bound column, and becomes the sole accumulated table. EXISTS filters
//! match their own pattern into a per-evaluation side output instead of
//! contributing a table.
//!
//! Evaluation is split in two so the synchronous and asynchronous engines
//! share the algebra: [`GroupInputs`] gathers every table that needs the
//! data source, and [`assemble_group`] does the rest in memory.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::combine::{combine_tables, has_compatible};
use crate::error::{MirellaError, Result};
use crate::expression::{Expression, RowFilter};
use crate::matcher::evaluate_pattern;
use crate::path::evaluate_path;
use crate::pattern::{MemberFlags, Pattern, PropertyPath};
use crate::source::DataSource;
use crate::table::{BindingTable, Row};
use crate::term::Variable;

/// Inline `VALUES` data.
#[derive(Clone, Debug, Default)]
pub struct Values {
    pub variables: Vec<Variable>,
    pub rows: Vec<Row>,
}

impl Values {
    pub fn new(variables: Vec<Variable>) -> Self {
        Self { variables, rows: Vec::new() }
    }
    #[must_use]
    pub fn row(mut self, row: Row) -> Self {
        self.rows.push(row);
        self
    }
    pub fn table(&self) -> Result<BindingTable> {
        let mut table = BindingTable::with_columns(self.variables.iter().cloned());
        if table.column_count() != self.variables.len() {
            return Err(MirellaError::Configuration("VALUES repeats a variable".to_string()));
        }
        for row in &self.rows {
            if row.len() != self.variables.len() {
                return Err(MirellaError::Configuration(format!(
                    "VALUES row has {} cells for {} variables",
                    row.len(),
                    self.variables.len()
                )));
            }
            table.push_row(row.clone());
        }
        Ok(table)
    }
}

#[derive(Clone)]
pub struct Bind {
    pub variable: Variable,
    pub expression: Arc<dyn Expression>,
}

#[derive(Clone)]
pub enum GroupMember {
    Pattern(Pattern),
    PropertyPath(PropertyPath),
    Values(Values),
    Bind(Bind),
}

#[derive(Clone)]
pub enum Filter {
    Expression(Arc<dyn RowFilter>),
    Exists { pattern: Pattern, negated: bool },
}

#[derive(Clone, Default)]
pub struct PatternGroup {
    pub members: Vec<GroupMember>,
    pub filters: Vec<Filter>,
    pub flags: MemberFlags,
}

impl PatternGroup {
    pub fn new() -> Self {
        Self::default()
    }
    #[must_use]
    pub fn pattern(mut self, pattern: Pattern) -> Self {
        self.members.push(GroupMember::Pattern(pattern));
        self
    }
    #[must_use]
    pub fn path(mut self, path: PropertyPath) -> Self {
        self.members.push(GroupMember::PropertyPath(path));
        self
    }
    #[must_use]
    pub fn values(mut self, values: Values) -> Self {
        self.members.push(GroupMember::Values(values));
        self
    }
    #[must_use]
    pub fn bind<E: Expression + 'static>(mut self, variable: Variable, expression: E) -> Self {
        self.members.push(GroupMember::Bind(Bind { variable, expression: Arc::new(expression) }));
        self
    }
    #[must_use]
    pub fn filter<F: RowFilter + 'static>(mut self, filter: F) -> Self {
        self.filters.push(Filter::Expression(Arc::new(filter)));
        self
    }
    #[must_use]
    pub fn exists(mut self, pattern: Pattern) -> Self {
        self.filters.push(Filter::Exists { pattern, negated: false });
        self
    }
    #[must_use]
    pub fn not_exists(mut self, pattern: Pattern) -> Self {
        self.filters.push(Filter::Exists { pattern, negated: true });
        self
    }
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.flags.optional = true;
        self
    }
    #[must_use]
    pub fn union_with_next(mut self) -> Self {
        self.flags.join_as_union = true;
        self
    }
    #[must_use]
    pub fn minus_with_next(mut self) -> Self {
        self.flags.join_as_minus = true;
        self
    }
}

/// Everything a group evaluation reads from its data source: one table per
/// non-BIND member (BIND slots stay `None`) and the EXISTS matches, one slot
/// per filter. A fresh value is built for every evaluation, so no match
/// table ever leaks from one group, or one federation member, to the next.
pub struct GroupInputs {
    pub(crate) tables: Vec<Option<BindingTable>>,
    pub(crate) exists: Vec<Option<BindingTable>>,
}

impl GroupInputs {
    pub fn fetch(group: &PatternGroup, source: &DataSource) -> Result<Self> {
        let mut tables = Vec::with_capacity(group.members.len());
        for member in &group.members {
            tables.push(match member {
                GroupMember::Pattern(pattern) => Some(evaluate_pattern(pattern, source)?),
                GroupMember::PropertyPath(path) => Some(evaluate_path(path, source)?),
                GroupMember::Values(values) => Some(values.table()?),
                GroupMember::Bind(_) => None,
            });
        }
        let mut exists = Vec::with_capacity(group.filters.len());
        for filter in &group.filters {
            exists.push(match filter {
                Filter::Exists { pattern, .. } => Some(evaluate_pattern(pattern, source)?),
                Filter::Expression(_) => None,
            });
        }
        Ok(Self { tables, exists })
    }
}

fn extend(table: &mut BindingTable, bind: &Bind) -> Result<()> {
    if table.has_column(&bind.variable) {
        return Err(MirellaError::Configuration(format!(
            "BIND target {} is already in scope",
            bind.variable
        )));
    }
    let values: Vec<_> = table.views().map(|row| bind.expression.evaluate(&row)).collect();
    let position = table.add_column(bind.variable.clone());
    for (row, value) in values.into_iter().enumerate() {
        table.set(row, position, value);
    }
    Ok(())
}

fn tag(group: &PatternGroup, table: &mut BindingTable) {
    table.flags.optional |= group.flags.optional;
    table.flags.join_as_union = group.flags.join_as_union;
    table.flags.join_as_minus = group.flags.join_as_minus;
}

/// Every filter must accept a row for it to survive.
fn apply_filters(group: &PatternGroup, table: BindingTable, exists: &[Option<BindingTable>]) -> BindingTable {
    if group.filters.is_empty() {
        return table;
    }
    let mut survivors = table.empty_like();
    for row in table.views() {
        let accepted = group.filters.iter().zip(exists).all(|(filter, matches)| match filter {
            Filter::Expression(filter) => filter.accepts(&row),
            Filter::Exists { negated, .. } => {
                let found = matches
                    .as_ref()
                    .is_some_and(|matches| has_compatible(row.columns(), row.values(), matches));
                found != *negated
            }
        });
        if accepted {
            survivors.push_row(row.values().clone());
        }
    }
    trace!(before = table.row_count(), after = survivors.row_count(), "filters applied");
    survivors
}

pub fn assemble_group(group: &PatternGroup, inputs: GroupInputs) -> Result<BindingTable> {
    let GroupInputs { tables, exists } = inputs;
    let mut accumulated: Vec<BindingTable> = Vec::with_capacity(tables.len());
    for (member, table) in group.members.iter().zip(tables) {
        match (member, table) {
            (GroupMember::Bind(bind), _) => {
                let mut combined = combine_tables(std::mem::take(&mut accumulated));
                extend(&mut combined, bind)?;
                accumulated.push(combined);
            }
            (_, Some(table)) => accumulated.push(table),
            (_, None) => {}
        }
    }
    let mut table = combine_tables(accumulated);
    tag(group, &mut table);
    Ok(apply_filters(group, table, &exists))
}

/// Unions the per-member tables of a federated evaluation, then attaches
/// the group's flags. An optional mark on any member table survives.
pub fn merge_federated(group: &PatternGroup, tables: Vec<BindingTable>) -> BindingTable {
    let mut tables = tables;
    if tables.len() == 1 {
        return tables.pop().unwrap_or_default();
    }
    let mut merged = BindingTable::new();
    for table in tables {
        merged.flags.optional |= table.flags.optional;
        merged.merge(table);
    }
    tag(group, &mut merged);
    merged
}

/// Evaluates the group against a single non-federated source.
pub fn evaluate_group_on(group: &PatternGroup, source: &DataSource) -> Result<BindingTable> {
    let inputs = GroupInputs::fetch(group, source)?;
    assemble_group(group, inputs)
}

pub fn evaluate_group(group: &PatternGroup, source: &DataSource) -> Result<BindingTable> {
    let leaves = source.leaves();
    let mut tables = Vec::with_capacity(leaves.len());
    for leaf in leaves {
        tables.push(evaluate_group_on(group, leaf)?);
    }
    let table = merge_federated(group, tables);
    debug!(members = group.members.len(), rows = table.row_count(), "group evaluated");
    Ok(table)
}
