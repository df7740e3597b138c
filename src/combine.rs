//! The table combiner: folds an ordered list of binding tables into one.
//!
//! Three passes run in order over the list:
//! 1. *union fold*: a table flagged `join_as_union` is merged into its right
//!    neighbour (column union, row union) and disappears;
//! 2. *minus fold*: a table flagged `join_as_minus` replaces its right
//!    neighbour with `diff_join(self, neighbour)` and disappears;
//! 3. *join fold*: a left-to-right reduction with inner joins, switching to
//!    outer joins for good once a union happened or an optional table shows
//!    up.
//!
//! Flags only ever relate a table to the one declared immediately after it,
//! so the fold is binary and left-biased rather than set-wide.
//!
//! All joins treat an unbound cell as a wildcard: it is compatible with
//! anything and does not need to equal itself. Compatible rows are found
//! through per-column bitset indexes over the right-hand table.

use std::collections::HashMap;

// rows are things in themselves, so bitsets of row ids can be intersected to "join" them
use roaring::RoaringTreemap;
use tracing::trace;

use crate::table::{BindingTable, ColumnHasher, Row, TableFlags};
use crate::term::{Term, Variable};

pub fn combine_tables(mut tables: Vec<BindingTable>) -> BindingTable {
    if tables.len() <= 1 {
        return tables.pop().unwrap_or_default();
    }
    let unions = fold_unions(&mut tables);
    let minuses = fold_minuses(&mut tables);
    trace!(unions, minuses, remaining = tables.len(), "combining tables");
    fold_joins(tables, unions > 0)
}

fn sweep(tables: &mut Vec<BindingTable>) {
    tables.retain(|table| !table.flags.deleted);
}

fn fold_unions(tables: &mut Vec<BindingTable>) -> usize {
    let mut folded = 0;
    for i in 0..tables.len().saturating_sub(1) {
        if !tables[i].flags.join_as_union {
            continue;
        }
        let (head, tail) = tables.split_at_mut(i + 1);
        let (left, right) = (&mut head[i], &mut tail[0]);
        let flags = right.flags;
        let mut merged = std::mem::take(left);
        merged.merge(std::mem::take(right));
        merged.flags = flags;
        *right = merged;
        left.flags.deleted = true;
        folded += 1;
    }
    sweep(tables);
    folded
}

fn fold_minuses(tables: &mut Vec<BindingTable>) -> usize {
    let mut folded = 0;
    for i in 0..tables.len().saturating_sub(1) {
        if !tables[i].flags.join_as_minus {
            continue;
        }
        let mut difference = diff_join(&tables[i], &tables[i + 1]);
        difference.flags = TableFlags {
            optional: tables[i].flags.optional,
            join_as_minus: tables[i + 1].flags.join_as_minus,
            ..TableFlags::default()
        };
        tables[i + 1] = difference;
        tables[i].flags.deleted = true;
        folded += 1;
    }
    sweep(tables);
    folded
}

fn fold_joins(tables: Vec<BindingTable>, mut outer_mode: bool) -> BindingTable {
    let mut tables = tables.into_iter();
    let Some(mut combined) = tables.next() else {
        return BindingTable::new();
    };
    let head_flags = combined.flags;
    for next in tables {
        outer_mode |= next.flags.optional;
        combined = if outer_mode {
            outer_join(&combined, &next)
        } else {
            inner_join(&combined, &next)
        };
    }
    combined.flags = head_flags;
    combined
}

// ------------- Join machinery -------------
struct JoinLayout {
    // (left position, right position) of every shared column
    common: Vec<(usize, usize)>,
    right_only: Vec<usize>,
    columns: Vec<Variable>,
}

impl JoinLayout {
    fn new(left: &BindingTable, right: &BindingTable) -> Self {
        let mut common = Vec::new();
        let mut right_only = Vec::new();
        let mut columns = left.columns().to_vec();
        for (position, column) in right.columns().iter().enumerate() {
            match left.column_index(column) {
                Some(left_position) => common.push((left_position, position)),
                None => {
                    right_only.push(position);
                    columns.push(column.clone());
                }
            }
        }
        Self { common, right_only, columns }
    }

    /// Shared columns take the left value when bound and the right one
    /// otherwise; right-only columns pass through.
    fn merge(&self, left: &Row, right: Option<&Row>) -> Row {
        let mut row = left.clone();
        match right {
            Some(right) => {
                for (l, r) in &self.common {
                    if row[*l].is_none() {
                        row[*l] = right[*r].clone();
                    }
                }
                row.extend(self.right_only.iter().map(|r| right[*r].clone()));
            }
            None => row.resize(left.len() + self.right_only.len(), None),
        }
        row
    }
}

/// Bitset indexes over the shared columns of the right-hand table.
struct Candidates<'t> {
    rows: u64,
    columns: Vec<ColumnIndex<'t>>,
}

struct ColumnIndex<'t> {
    left_position: usize,
    bound: HashMap<&'t Term, RoaringTreemap, ColumnHasher>,
    unbound: RoaringTreemap,
}

impl<'t> Candidates<'t> {
    fn build(right: &'t BindingTable, layout: &JoinLayout) -> Self {
        let mut columns: Vec<ColumnIndex<'t>> = layout
            .common
            .iter()
            .map(|(left_position, _)| ColumnIndex {
                left_position: *left_position,
                bound: HashMap::default(),
                unbound: RoaringTreemap::new(),
            })
            .collect();
        for (id, row) in right.rows().iter().enumerate() {
            for (index, (_, right_position)) in columns.iter_mut().zip(&layout.common) {
                match &row[*right_position] {
                    Some(term) => {
                        index.bound.entry(term).or_default().insert(id as u64);
                    }
                    None => {
                        index.unbound.insert(id as u64);
                    }
                }
            }
        }
        Self { rows: right.row_count() as u64, columns }
    }

    /// Right rows compatible with the given left row.
    fn compatible(&self, left: &Row) -> RoaringTreemap {
        let mut hits: Option<RoaringTreemap> = None;
        for index in &self.columns {
            let Some(term) = &left[index.left_position] else {
                continue;
            };
            let mut matching = index.unbound.clone();
            if let Some(rows) = index.bound.get(term) {
                matching |= rows;
            }
            let narrowed = match hits {
                Some(hits) => hits & matching,
                None => matching,
            };
            if narrowed.is_empty() {
                return narrowed;
            }
            hits = Some(narrowed);
        }
        hits.unwrap_or_else(|| {
            let mut all = RoaringTreemap::new();
            all.insert_range(0..self.rows);
            all
        })
    }
}

/// Equi-join on all shared columns; a cartesian product when there are none.
pub fn inner_join(left: &BindingTable, right: &BindingTable) -> BindingTable {
    let layout = JoinLayout::new(left, right);
    let candidates = Candidates::build(right, &layout);
    let mut joined = BindingTable::with_columns(layout.columns.iter().cloned());
    for row in left.rows() {
        for id in candidates.compatible(row) {
            joined.push_row(layout.merge(row, Some(&right.rows()[id as usize])));
        }
    }
    joined.flags = left.flags;
    joined
}

/// Like the inner join, except that a left row without any compatible right
/// row survives (with the right-only columns unbound) when the right table
/// is optional.
pub fn outer_join(left: &BindingTable, right: &BindingTable) -> BindingTable {
    let layout = JoinLayout::new(left, right);
    let candidates = Candidates::build(right, &layout);
    let mut joined = BindingTable::with_columns(layout.columns.iter().cloned());
    for row in left.rows() {
        let hits = candidates.compatible(row);
        if hits.is_empty() {
            if right.flags.optional {
                joined.push_row(layout.merge(row, None));
            }
            continue;
        }
        for id in hits {
            joined.push_row(layout.merge(row, Some(&right.rows()[id as usize])));
        }
    }
    joined.flags = left.flags;
    joined
}

/// Left rows that have no compatible right row. Without shared columns
/// every left row is kept.
pub fn diff_join(left: &BindingTable, right: &BindingTable) -> BindingTable {
    let layout = JoinLayout::new(left, right);
    if layout.common.is_empty() {
        return left.clone();
    }
    let candidates = Candidates::build(right, &layout);
    let mut difference = left.empty_like();
    for row in left.rows() {
        if candidates.compatible(row).is_empty() {
            difference.push_row(row.clone());
        }
    }
    difference
}

/// Whether the row has a compatible row in `other`; used by EXISTS filters.
pub(crate) fn has_compatible(
    columns: &[Variable],
    row: &Row,
    other: &BindingTable,
) -> bool {
    let shared: Vec<(usize, usize)> = columns
        .iter()
        .enumerate()
        .filter_map(|(l, column)| other.column_index(column).map(|r| (l, r)))
        .collect();
    other.rows().iter().any(|candidate| {
        shared.iter().all(|(l, r)| match (&row[*l], &candidate[*r]) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        })
    })
}
