//! Parsed query/operation objects, the per-call evaluation context and the
//! typed results the engines return.
//!
//! Query text parsing is not part of this crate: callers build these
//! objects directly (or through their own parser). Every query kind holds a
//! [`QueryBody`], the ordered list of top-level members (pattern groups or
//! nested sub-queries) plus the `silent` switch that turns remote endpoint
//! failures into empty results.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::error::{MirellaError, Result};
use crate::group::PatternGroup;
use crate::modifier::{GroupBy, Modifiers, OrderCondition, Projection};
use crate::pattern::{MemberFlags, Pattern};
use crate::source::Quad;
use crate::table::{BindingTable, ColumnHasher};
use crate::template::fact_columns;
use crate::term::{Term, Variable};

#[derive(Clone)]
pub enum QueryMember {
    Group(PatternGroup),
    SubQuery(Box<SelectQuery>),
}

#[derive(Clone, Default)]
pub struct QueryBody {
    pub members: Vec<QueryMember>,
    pub silent: bool,
}

// The member-building methods every query kind shares.
macro_rules! query_body_builders {
    ($($query:ty),+) => {$(
        impl $query {
            #[must_use]
            pub fn group(mut self, group: PatternGroup) -> Self {
                self.body.members.push(QueryMember::Group(group));
                self
            }
            #[must_use]
            pub fn subquery(mut self, query: SelectQuery) -> Self {
                self.body.members.push(QueryMember::SubQuery(Box::new(query)));
                self
            }
            #[must_use]
            pub fn silent(mut self) -> Self {
                self.body.silent = true;
                self
            }
        }
    )+};
}

#[derive(Clone, Default)]
pub struct SelectQuery {
    pub body: QueryBody,
    pub modifiers: Modifiers,
    /// Only consulted when the query is nested as a sub-query; MINUS never
    /// propagates out of a sub-query.
    pub flags: MemberFlags,
}

impl SelectQuery {
    pub fn new() -> Self {
        Self::default()
    }
    #[must_use]
    pub fn project(mut self, variable: Variable) -> Self {
        self.modifiers.projection.push(Projection::variable(variable));
        self
    }
    #[must_use]
    pub fn project_expression(mut self, projection: Projection) -> Self {
        self.modifiers.projection.push(projection);
        self
    }
    #[must_use]
    pub fn group_by(mut self, group_by: GroupBy) -> Self {
        self.modifiers.group_by = Some(group_by);
        self
    }
    #[must_use]
    pub fn order_by(mut self, condition: OrderCondition) -> Self {
        self.modifiers.order_by.push(condition);
        self
    }
    #[must_use]
    pub fn distinct(mut self) -> Self {
        self.modifiers.distinct = true;
        self
    }
    #[must_use]
    pub fn offset(mut self, offset: usize) -> Self {
        self.modifiers.offset = Some(offset);
        self
    }
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.modifiers.limit = Some(limit);
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

    /// Tags a sub-query's result for the enclosing combiner.
    pub(crate) fn tag(&self, table: &mut BindingTable) {
        table.flags.optional = self.flags.optional;
        table.flags.join_as_union = self.flags.join_as_union;
        table.flags.join_as_minus = false;
    }
}

#[derive(Clone, Default)]
pub struct AskQuery {
    pub body: QueryBody,
}

impl AskQuery {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Clone, Default)]
pub struct ConstructQuery {
    pub body: QueryBody,
    pub templates: Vec<Pattern>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl ConstructQuery {
    pub fn new() -> Self {
        Self::default()
    }
    #[must_use]
    pub fn template(mut self, template: Pattern) -> Self {
        self.templates.push(template);
        self
    }
    #[must_use]
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Clone, Default)]
pub struct DescribeQuery {
    pub body: QueryBody,
    /// Empty means every variable of the raw result (`DESCRIBE *`).
    pub terms: Vec<Term>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl DescribeQuery {
    pub fn new() -> Self {
        Self::default()
    }
    #[must_use]
    pub fn describe(mut self, term: Term) -> Self {
        self.terms.push(term);
        self
    }
    #[must_use]
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// INSERT/DELETE ... WHERE. Templates are quad templates; those without a
/// context land in the configured default context.
#[derive(Clone, Default)]
pub struct UpdateOperation {
    pub body: QueryBody,
    pub templates: Vec<Pattern>,
}

impl UpdateOperation {
    pub fn new() -> Self {
        Self::default()
    }
    #[must_use]
    pub fn template(mut self, template: Pattern) -> Self {
        self.templates.push(template);
        self
    }
}

query_body_builders!(SelectQuery, AskQuery, ConstructQuery, DescribeQuery, UpdateOperation);

// ------------- Evaluation Context -------------
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct MemberId(u32);

impl MemberId {
    pub(crate) fn assign(members: &[QueryMember]) -> Vec<MemberId> {
        (0..members.len() as u32).map(MemberId).collect()
    }
}

/// Member tables of one evaluation call. Created when the call starts and
/// dropped when it returns; never shared between calls.
#[derive(Default)]
pub struct EvaluationContext {
    tables: BTreeMap<MemberId, BindingTable>,
    intermediates: HashMap<MemberId, Vec<BindingTable>, ColumnHasher>,
}

impl EvaluationContext {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn record(&mut self, id: MemberId, table: BindingTable) {
        self.tables.insert(id, table);
    }
    /// Keeps the table one federation member produced for a member.
    pub fn record_intermediate(&mut self, id: MemberId, table: BindingTable) {
        self.intermediates.entry(id).or_default().push(table);
    }
    pub fn take_intermediates(&mut self, id: MemberId) -> Vec<BindingTable> {
        self.intermediates.remove(&id).unwrap_or_default()
    }
    /// The recorded tables in the order of `ids`.
    pub fn collect(&mut self, ids: &[MemberId]) -> Result<Vec<BindingTable>> {
        ids.iter()
            .map(|id| {
                self.tables.remove(id).ok_or_else(|| {
                    MirellaError::Configuration(format!("query member {id:?} was never evaluated"))
                })
            })
            .collect()
    }
}

// ------------- Results -------------
#[derive(Clone, Debug, Default, Serialize)]
pub struct SelectResult {
    pub table: BindingTable,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AskResult {
    pub value: bool,
}

/// Facts produced by CONSTRUCT, DESCRIBE, INSERT or DELETE, as a
/// `[?CONTEXT,] ?SUBJECT ?PREDICATE ?OBJECT` table.
#[derive(Clone, Debug, Default, Serialize)]
pub struct GraphResult {
    pub table: BindingTable,
}

impl GraphResult {
    pub(crate) fn empty(needs_context: bool) -> Self {
        Self { table: BindingTable::with_columns(fact_columns(needs_context)) }
    }
    pub fn facts(&self) -> Vec<Quad> {
        self.table.facts()
    }
    pub fn len(&self) -> usize {
        self.table.row_count()
    }
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

pub type ConstructResult = GraphResult;
pub type DescribeResult = GraphResult;
pub type UpdateResult = GraphResult;

/// Swallows remote endpoint failures of silent operations.
pub(crate) fn silenced<T>(silent: bool, outcome: Result<T>, empty: impl FnOnce() -> T) -> Result<T> {
    match outcome {
        Err(e) if silent && e.is_remote() => {
            tracing::warn!(error = %e, "silent operation swallowed a remote failure");
            Ok(empty())
        }
        other => other,
    }
}
