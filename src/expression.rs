//! Plug-in seams for filters, computed expressions and aggregates.
//!
//! The engine never interprets SPARQL functions itself: it hands rows to a
//! [`RowFilter`] (keep or drop), an [`Expression`] (compute a term or leave
//! the cell unbound) or an [`Aggregator`] (fold a partition into one term).
//! Plain closures implement the first two.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::table::{ColumnHasher, RowView};
use crate::term::{order_cmp, Term, Variable};

pub trait RowFilter: Send + Sync {
    fn accepts(&self, row: &RowView<'_>) -> bool;
}

impl<F> RowFilter for F
where
    F: Fn(&RowView<'_>) -> bool + Send + Sync,
{
    fn accepts(&self, row: &RowView<'_>) -> bool {
        self(row)
    }
}

/// `None` leaves the target cell unbound.
pub trait Expression: Send + Sync {
    fn evaluate(&self, row: &RowView<'_>) -> Option<Term>;
}

impl<F> Expression for F
where
    F: Fn(&RowView<'_>) -> Option<Term> + Send + Sync,
{
    fn evaluate(&self, row: &RowView<'_>) -> Option<Term> {
        self(row)
    }
}

/// Pins a closure to the higher-ranked signature a [`RowFilter`] needs.
pub fn row_filter<F>(filter: F) -> F
where
    F: Fn(&RowView<'_>) -> bool + Send + Sync,
{
    filter
}

/// Pins a closure to the higher-ranked signature an [`Expression`] needs.
pub fn expression<F>(expression: F) -> F
where
    F: Fn(&RowView<'_>) -> Option<Term> + Send + Sync,
{
    expression
}

pub trait Aggregator: Send + Sync {
    fn aggregate(&self, partition: &[RowView<'_>]) -> Option<Term>;
}

fn arguments<'a>(
    partition: &'a [RowView<'a>],
    argument: &'a Variable,
    distinct: bool,
) -> impl Iterator<Item = &'a Term> + 'a {
    let mut seen = HashSet::<&Term, ColumnHasher>::default();
    partition
        .iter()
        .filter_map(move |row| row.get(argument))
        .filter(move |term| !distinct || seen.insert(*term))
}

/// COUNT(*) without an argument, COUNT([DISTINCT] ?x) with one.
#[derive(Clone, Debug, Default)]
pub struct Count {
    pub argument: Option<Variable>,
    pub distinct: bool,
}

impl Aggregator for Count {
    fn aggregate(&self, partition: &[RowView<'_>]) -> Option<Term> {
        let count = match &self.argument {
            Some(argument) => arguments(partition, argument, self.distinct).count(),
            None if self.distinct => {
                let mut seen = HashSet::<_, ColumnHasher>::default();
                partition.iter().filter(|row| seen.insert(row.values())).count()
            }
            None => partition.len(),
        };
        Some(Term::integer(count as i64))
    }
}

/// MIN/MAX in solution order.
#[derive(Clone, Debug)]
pub struct Extremum {
    pub argument: Variable,
    pub maximum: bool,
}

impl Aggregator for Extremum {
    fn aggregate(&self, partition: &[RowView<'_>]) -> Option<Term> {
        let wanted = if self.maximum { Ordering::Greater } else { Ordering::Less };
        arguments(partition, &self.argument, false)
            .fold(None, |best: Option<&Term>, term| match best {
                Some(best) if order_cmp(Some(term), Some(best)) != wanted => Some(best),
                _ => Some(term),
            })
            .cloned()
    }
}

/// Any one bound value of the argument.
#[derive(Clone, Debug)]
pub struct Sample {
    pub argument: Variable,
}

impl Aggregator for Sample {
    fn aggregate(&self, partition: &[RowView<'_>]) -> Option<Term> {
        arguments(partition, &self.argument, false).next().cloned()
    }
}
