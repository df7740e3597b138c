//! The SELECT modifier pipeline: GROUP BY with aggregates, computed
//! projections, ORDER BY, projection, DISTINCT, OFFSET and LIMIT, in that
//! order. ORDER BY runs before columns are pruned so that sort keys may use
//! variables the query does not return.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use crate::error::{MirellaError, Result};
use crate::expression::{Aggregator, Expression};
use crate::table::{BindingTable, ColumnHasher, Row};
use crate::term::{order_cmp, Term, Variable};

#[derive(Clone)]
pub struct Projection {
    pub variable: Variable,
    pub expression: Option<Arc<dyn Expression>>,
}

impl Projection {
    pub fn variable(variable: Variable) -> Self {
        Self { variable, expression: None }
    }
    pub fn computed<E: Expression + 'static>(variable: Variable, expression: E) -> Self {
        Self { variable, expression: Some(Arc::new(expression)) }
    }
}

#[derive(Clone)]
pub enum OrderKey {
    Variable(Variable),
    Expression(Arc<dyn Expression>),
}

#[derive(Clone)]
pub struct OrderCondition {
    pub key: OrderKey,
    pub descending: bool,
}

impl OrderCondition {
    pub fn ascending(variable: Variable) -> Self {
        Self { key: OrderKey::Variable(variable), descending: false }
    }
    pub fn descending(variable: Variable) -> Self {
        Self { key: OrderKey::Variable(variable), descending: true }
    }
}

#[derive(Clone)]
pub struct AggregateBinding {
    pub variable: Variable,
    pub aggregator: Arc<dyn Aggregator>,
}

#[derive(Clone, Default)]
pub struct GroupBy {
    pub partition: Vec<Variable>,
    pub aggregates: Vec<AggregateBinding>,
}

impl GroupBy {
    pub fn new(partition: Vec<Variable>) -> Self {
        Self { partition, aggregates: Vec::new() }
    }
    #[must_use]
    pub fn aggregate<A: Aggregator + 'static>(mut self, variable: Variable, aggregator: A) -> Self {
        self.aggregates.push(AggregateBinding { variable, aggregator: Arc::new(aggregator) });
        self
    }
}

#[derive(Clone, Default)]
pub struct Modifiers {
    pub group_by: Option<GroupBy>,
    /// Empty means every column (`SELECT *`).
    pub projection: Vec<Projection>,
    pub order_by: Vec<OrderCondition>,
    pub distinct: bool,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

pub fn apply_modifiers(table: BindingTable, modifiers: &Modifiers) -> Result<BindingTable> {
    let mut table = table;
    let mut projection: Cow<'_, [Projection]> = Cow::Borrowed(&modifiers.projection);
    if let Some(group_by) = &modifiers.group_by {
        table = partition(&table, group_by)?;
        projection = Cow::Owned(
            table.columns().iter().cloned().map(Projection::variable).collect(),
        );
    }
    for projected in projection.iter() {
        if let Some(expression) = &projected.expression {
            compute(&mut table, &projected.variable, expression.as_ref())?;
        }
    }
    order(&mut table, &modifiers.order_by);
    if !projection.is_empty() {
        let columns: Vec<Variable> = projection.iter().map(|p| p.variable.clone()).collect();
        table = table.project(&columns);
    }
    if modifiers.distinct {
        table.distinct();
    }
    if let Some(offset) = modifiers.offset {
        table.skip(offset);
    }
    if let Some(limit) = modifiers.limit {
        table.truncate(limit);
    }
    trace!(rows = table.row_count(), columns = table.column_count(), "modifiers applied");
    Ok(table)
}

fn compute(table: &mut BindingTable, variable: &Variable, expression: &dyn Expression) -> Result<()> {
    if table.has_column(variable) {
        return Err(MirellaError::Configuration(format!(
            "projection expression target {variable} is already in scope"
        )));
    }
    let values: Vec<Option<Term>> = table.views().map(|row| expression.evaluate(&row)).collect();
    let position = table.add_column(variable.clone());
    for (row, value) in values.into_iter().enumerate() {
        table.set(row, position, value);
    }
    Ok(())
}

fn partition(table: &BindingTable, group_by: &GroupBy) -> Result<BindingTable> {
    let mut columns = group_by.partition.clone();
    for aggregate in &group_by.aggregates {
        if columns.contains(&aggregate.variable) {
            return Err(MirellaError::Configuration(format!(
                "aggregate target {} collides with another grouped column",
                aggregate.variable
            )));
        }
        columns.push(aggregate.variable.clone());
    }

    let positions: Vec<Option<usize>> =
        group_by.partition.iter().map(|v| table.column_index(v)).collect();
    let mut order: Vec<Row> = Vec::new();
    let mut members: HashMap<Row, Vec<usize>, ColumnHasher> = HashMap::default();
    for (id, row) in table.rows().iter().enumerate() {
        let key: Row = positions.iter().map(|p| p.and_then(|p| row[p].clone())).collect();
        members
            .entry(key)
            .or_insert_with_key(|key| {
                order.push(key.clone());
                Vec::new()
            })
            .push(id);
    }
    // aggregating an empty solution sequence without keys yields one row
    if order.is_empty() && group_by.partition.is_empty() {
        order.push(Vec::new());
        members.insert(Vec::new(), Vec::new());
    }

    let mut grouped = BindingTable::with_columns(columns);
    grouped.flags = table.flags;
    for key in order {
        let ids = members.remove(&key).unwrap_or_default();
        let views: Vec<_> = ids.iter().filter_map(|id| table.row(*id)).collect();
        let mut row = key;
        row.extend(group_by.aggregates.iter().map(|a| a.aggregator.aggregate(&views)));
        grouped.push_row(row);
    }
    Ok(grouped)
}

fn order(table: &mut BindingTable, conditions: &[OrderCondition]) {
    if conditions.is_empty() || table.row_count() < 2 {
        return;
    }
    let keys: Vec<Vec<Option<Term>>> = table
        .views()
        .map(|row| {
            conditions
                .iter()
                .map(|condition| match &condition.key {
                    OrderKey::Variable(variable) => row.get(variable).cloned(),
                    OrderKey::Expression(expression) => expression.evaluate(&row),
                })
                .collect()
        })
        .collect();
    let mut ranking: Vec<usize> = (0..keys.len()).collect();
    ranking.sort_by(|a, b| {
        for (i, condition) in conditions.iter().enumerate() {
            let ordering = order_cmp(keys[*a][i].as_ref(), keys[*b][i].as_ref());
            let ordering = if condition.descending { ordering.reverse() } else { ordering };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    let mut rows: Vec<Option<Row>> = std::mem::take(table.rows_mut()).into_iter().map(Some).collect();
    *table.rows_mut() = ranking.into_iter().filter_map(|i| rows[i].take()).collect();
}
