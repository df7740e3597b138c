//! Binding tables: the solution sequences every evaluation step produces
//! and consumes.
//!
//! A [`BindingTable`] holds an ordered, duplicate-free list of column
//! [`Variable`]s and positional rows of `Option<Term>`, where `None` marks an
//! unbound cell. Columns are resolved to positions once per operation
//! through a seahash-keyed index, so joins and filters work on positions
//! rather than repeated name lookups.
//!
//! Every table also carries [`TableFlags`], the markers the combiner reads
//! to decide how a table folds into its right-hand neighbour.

use core::hash::BuildHasherDefault;
use std::collections::{HashMap, HashSet};

use seahash::SeaHasher;
use serde::Serialize;

use crate::term::{Term, Variable};

pub type ColumnHasher = BuildHasherDefault<SeaHasher>;
pub type Row = Vec<Option<Term>>;

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct TableFlags {
    pub optional: bool,
    pub join_as_union: bool,
    pub join_as_minus: bool,
    pub deleted: bool,
}

#[derive(Clone, Default, Debug, Serialize)]
pub struct BindingTable {
    columns: Vec<Variable>,
    #[serde(skip)]
    index: HashMap<Variable, usize, ColumnHasher>,
    rows: Vec<Row>,
    #[serde(skip)]
    pub flags: TableFlags,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_columns<I: IntoIterator<Item = Variable>>(columns: I) -> Self {
        let mut table = Self::new();
        for column in columns {
            table.add_column(column);
        }
        table
    }
    /// The join identity: no columns and exactly one row.
    pub fn unit() -> Self {
        let mut table = Self::new();
        table.rows.push(Vec::new());
        table
    }

    pub fn columns(&self) -> &[Variable] {
        &self.columns
    }
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
    pub fn column_index(&self, column: &Variable) -> Option<usize> {
        self.index.get(column).copied()
    }
    pub fn has_column(&self, column: &Variable) -> bool {
        self.index.contains_key(column)
    }

    /// Adds a column unless it is already present, padding existing rows
    /// with unbound cells. Returns the column position either way.
    pub fn add_column(&mut self, column: Variable) -> usize {
        if let Some(position) = self.index.get(&column) {
            return *position;
        }
        let position = self.columns.len();
        self.index.insert(column.clone(), position);
        self.columns.push(column);
        for row in &mut self.rows {
            row.push(None);
        }
        position
    }

    /// Rows must be laid out in column order.
    pub fn push_row(&mut self, mut row: Row) {
        debug_assert!(row.len() <= self.columns.len(), "row wider than table");
        row.resize(self.columns.len(), None);
        self.rows.push(row);
    }

    /// Appends a row given as variable/term pairs, growing the schema for
    /// any variable that is not a column yet.
    pub fn push_bindings<I>(&mut self, bindings: I)
    where
        I: IntoIterator<Item = (Variable, Term)>,
    {
        let mut row: Row = vec![None; self.columns.len()];
        for (variable, term) in bindings {
            let position = self.add_column(variable);
            if position >= row.len() {
                row.resize(position + 1, None);
            }
            row[position] = Some(term);
        }
        self.push_row(row);
    }

    pub fn value(&self, row: usize, column: &Variable) -> Option<&Term> {
        let position = self.column_index(column)?;
        self.rows.get(row)?.get(position)?.as_ref()
    }
    pub fn row(&self, row: usize) -> Option<RowView<'_>> {
        self.rows.get(row).map(|values| RowView { table: self, values })
    }
    pub fn views(&self) -> impl Iterator<Item = RowView<'_>> {
        self.rows.iter().map(move |values| RowView { table: self, values })
    }

    /// Distinct values bound in a column, in first-seen order.
    pub fn column_values(&self, column: &Variable) -> Vec<Term> {
        let Some(position) = self.column_index(column) else {
            return Vec::new();
        };
        let mut seen = HashSet::<&Term, ColumnHasher>::default();
        self.rows
            .iter()
            .filter_map(|row| row[position].as_ref())
            .filter(|term| seen.insert(*term))
            .cloned()
            .collect()
    }

    /// Schema-safe union: the other table's columns are added as needed and
    /// its rows appended. Flags of `self` are kept.
    pub fn merge(&mut self, other: BindingTable) {
        let positions: Vec<usize> = other
            .columns
            .iter()
            .map(|column| self.add_column(column.clone()))
            .collect();
        let width = self.columns.len();
        self.rows.reserve(other.rows.len());
        for row in other.rows {
            let mut merged: Row = vec![None; width];
            for (value, position) in row.into_iter().zip(&positions) {
                merged[*position] = value;
            }
            self.rows.push(merged);
        }
    }

    /// Keeps the listed columns, in the listed order. Unknown columns are
    /// added unbound.
    pub fn project(&self, columns: &[Variable]) -> BindingTable {
        let positions: Vec<Option<usize>> =
            columns.iter().map(|column| self.column_index(column)).collect();
        let mut projected = BindingTable::with_columns(columns.iter().cloned());
        projected.flags = self.flags;
        for row in &self.rows {
            projected.rows.push(
                positions.iter().map(|p| p.and_then(|p| row[p].clone())).collect(),
            );
        }
        projected
    }

    /// Drops every column the predicate selects.
    pub fn drop_columns<F: Fn(&Variable) -> bool>(&self, drop: F) -> BindingTable {
        let kept: Vec<Variable> = self.columns.iter().filter(|c| !drop(c)).cloned().collect();
        self.project(&kept)
    }

    /// A fresh table with the same schema and flags but no rows.
    pub fn empty_like(&self) -> BindingTable {
        let mut table = BindingTable::with_columns(self.columns.iter().cloned());
        table.flags = self.flags;
        table
    }

    pub fn retain_rows<F: FnMut(RowView<'_>) -> bool>(&mut self, mut keep: F) {
        let rows = std::mem::take(&mut self.rows);
        let kept = rows
            .into_iter()
            .filter(|values| keep(RowView { table: self, values }))
            .collect();
        self.rows = kept;
    }

    /// Removes duplicate rows, keeping first occurrences.
    pub fn distinct(&mut self) {
        let mut seen = HashSet::<Row, ColumnHasher>::default();
        self.rows.retain(|row| seen.insert(row.clone()));
    }

    pub fn skip(&mut self, offset: usize) {
        if offset >= self.rows.len() {
            self.rows.clear();
        } else {
            self.rows.drain(..offset);
        }
    }
    pub fn truncate(&mut self, limit: usize) {
        self.rows.truncate(limit);
    }

    pub(crate) fn rows_mut(&mut self) -> &mut Vec<Row> {
        &mut self.rows
    }
    /// Sets a cell; the column must exist.
    pub(crate) fn set(&mut self, row: usize, position: usize, value: Option<Term>) {
        self.rows[row][position] = value;
    }
}

/// Borrowed view of a single row, addressable by variable.
#[derive(Clone, Copy)]
pub struct RowView<'a> {
    table: &'a BindingTable,
    values: &'a Row,
}

impl<'a> RowView<'a> {
    pub fn get(&self, column: &Variable) -> Option<&'a Term> {
        let position = self.table.column_index(column)?;
        self.values.get(position)?.as_ref()
    }
    pub fn is_bound(&self, column: &Variable) -> bool {
        self.get(column).is_some()
    }
    pub fn columns(&self) -> &'a [Variable] {
        self.table.columns()
    }
    pub fn values(&self) -> &'a Row {
        self.values
    }
}
