// used to print out readable forms of patterns and paths
use std::fmt;

use crate::table::TableFlags;
use crate::term::{Term, Variable};

/// How a member's table folds into the one declared after it.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct MemberFlags {
    pub optional: bool,
    pub join_as_union: bool,
    pub join_as_minus: bool,
}

impl MemberFlags {
    pub fn table_flags(self) -> TableFlags {
        TableFlags {
            optional: self.optional,
            join_as_union: self.join_as_union,
            join_as_minus: self.join_as_minus,
            deleted: false,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Position {
    Context,
    Subject,
    Predicate,
    Object,
}

// ------------- Pattern -------------
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Pattern {
    pub context: Option<Term>,
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
    pub flags: MemberFlags,
}

impl Pattern {
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        Self { context: None, subject, predicate, object, flags: MemberFlags::default() }
    }
    pub fn quad(context: Term, subject: Term, predicate: Term, object: Term) -> Self {
        Self { context: Some(context), ..Self::new(subject, predicate, object) }
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

    /// Terms in evaluation order: context (when present), subject,
    /// predicate, object.
    pub fn positions(&self) -> Vec<(Position, &Term)> {
        let mut positions = Vec::with_capacity(4);
        if let Some(context) = &self.context {
            positions.push((Position::Context, context));
        }
        positions.push((Position::Subject, &self.subject));
        positions.push((Position::Predicate, &self.predicate));
        positions.push((Position::Object, &self.object));
        positions
    }

    /// Distinct variables in position order.
    pub fn variables(&self) -> Vec<Variable> {
        let mut variables: Vec<Variable> = Vec::new();
        for (_, term) in self.positions() {
            if let Some(variable) = term.as_variable() {
                if !variables.contains(variable) {
                    variables.push(variable.clone());
                }
            }
        }
        variables
    }

    pub fn is_ground(&self) -> bool {
        self.positions().iter().all(|(_, term)| !term.is_variable())
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.context {
            Some(context) => write!(f, "GRAPH {} {{ {} {} {} }}", context, self.subject, self.predicate, self.object),
            None => write!(f, "{} {} {}", self.subject, self.predicate, self.object),
        }
    }
}

// ------------- Property Path -------------
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PathEdge {
    pub property: Term,
    pub inverse: bool,
}

impl PathEdge {
    pub fn new(property: Term) -> Self {
        Self { property, inverse: false }
    }
    pub fn inverse(property: Term) -> Self {
        Self { property, inverse: true }
    }
}

/// One hop of a path: a single edge, or a set of edges any of which may be
/// taken.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum PathStep {
    Sequence(PathEdge),
    Alternative(Vec<PathEdge>),
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PropertyPath {
    pub start: Term,
    pub end: Term,
    pub steps: Vec<PathStep>,
}

impl PropertyPath {
    pub fn new(start: Term, end: Term) -> Self {
        Self { start, end, steps: Vec::new() }
    }
    #[must_use]
    pub fn then(mut self, edge: PathEdge) -> Self {
        self.steps.push(PathStep::Sequence(edge));
        self
    }
    #[must_use]
    pub fn either(mut self, edges: Vec<PathEdge>) -> Self {
        self.steps.push(PathStep::Alternative(edges));
        self
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fn edge(e: &PathEdge) -> String {
            if e.inverse { format!("^{}", e.property) } else { e.property.to_string() }
        }
        let steps: Vec<String> = self
            .steps
            .iter()
            .map(|step| match step {
                PathStep::Sequence(e) => edge(e),
                PathStep::Alternative(edges) => {
                    format!("({})", edges.iter().map(edge).collect::<Vec<_>>().join("|"))
                }
            })
            .collect();
        write!(f, "{} {} {}", self.start, steps.join("/"), self.end)
    }
}
