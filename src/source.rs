//! Data sources the engine evaluates patterns against.
//!
//! The engine itself only needs position-indexed selection, captured by the
//! [`FactSource`] trait. In-memory [`Graph`] (triples under one context) and
//! [`Store`] (quads) implementations are provided; both keep facts in a
//! keeper with one bitset lookup per position so that any combination of
//! bound positions resolves to an intersection of row-id sets.
//!
//! A [`DataSource`] is what queries run against: a graph, a store, a
//! (nestable) [`Federation`] of heterogeneous sources, or a remote SPARQL
//! endpoint.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

// every fact is identified by its position so that lookups can be "joined" as bitsets
use roaring::RoaringTreemap;

use crate::error::Result;
use crate::remote::RemoteMember;
use crate::table::ColumnHasher;
use crate::term::Term;

// ------------- Quad -------------
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Quad {
    pub context: Option<Term>,
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

impl Quad {
    pub fn triple(subject: Term, predicate: Term, object: Term) -> Self {
        Self { context: None, subject, predicate, object }
    }
    pub fn new(context: Term, subject: Term, predicate: Term, object: Term) -> Self {
        Self { context: Some(context), subject, predicate, object }
    }
}
impl fmt::Display for Quad {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.context {
            Some(context) => write!(f, "{} {} {} {} .", self.subject, self.predicate, self.object, context),
            None => write!(f, "{} {} {} .", self.subject, self.predicate, self.object),
        }
    }
}

/// Bound positions of a lookup; `None` means "any".
#[derive(Clone, Copy, Default, Debug)]
pub struct Selector<'a> {
    pub context: Option<&'a Term>,
    pub subject: Option<&'a Term>,
    pub predicate: Option<&'a Term>,
    pub object: Option<&'a Term>,
}

/// Position-indexed selection over facts. Implementations must tolerate
/// concurrent reads; the engine never locks them.
pub trait FactSource: Send + Sync {
    fn select(&self, selector: &Selector<'_>) -> Result<Vec<Quad>>;
}

// ------------- Lookups -------------
#[derive(Clone, Debug, Default)]
struct Lookup {
    index: HashMap<Term, RoaringTreemap, ColumnHasher>,
}
impl Lookup {
    fn insert(&mut self, key: &Term, fact: u64) {
        self.index.entry(key.clone()).or_default().insert(fact);
    }
    fn remove(&mut self, key: &Term, fact: u64) {
        if let Some(facts) = self.index.get_mut(key) {
            facts.remove(fact);
            if facts.is_empty() {
                self.index.remove(key);
            }
        }
    }
    fn lookup(&self, key: &Term) -> RoaringTreemap {
        self.index.get(key).cloned().unwrap_or_default()
    }
}

// ------------- Keeper -------------
// Owns the facts and guarantees their uniqueness.
#[derive(Clone, Debug, Default)]
struct FactKeeper {
    kept: Vec<Option<Quad>>,
    positions: HashMap<Quad, u64, ColumnHasher>,
    live: RoaringTreemap,
    contexts: Lookup,
    subjects: Lookup,
    predicates: Lookup,
    objects: Lookup,
}
impl FactKeeper {
    fn keep(&mut self, fact: Quad) -> bool {
        if self.positions.contains_key(&fact) {
            return false;
        }
        let id = self.kept.len() as u64;
        if let Some(context) = &fact.context {
            self.contexts.insert(context, id);
        }
        self.subjects.insert(&fact.subject, id);
        self.predicates.insert(&fact.predicate, id);
        self.objects.insert(&fact.object, id);
        self.live.insert(id);
        self.positions.insert(fact.clone(), id);
        self.kept.push(Some(fact));
        true
    }
    fn release(&mut self, fact: &Quad) -> bool {
        let Some(id) = self.positions.remove(fact) else {
            return false;
        };
        if let Some(context) = &fact.context {
            self.contexts.remove(context, id);
        }
        self.subjects.remove(&fact.subject, id);
        self.predicates.remove(&fact.predicate, id);
        self.objects.remove(&fact.object, id);
        self.live.remove(id);
        self.kept[id as usize] = None;
        true
    }
    fn select(&self, selector: &Selector<'_>) -> Vec<Quad> {
        let mut hits = self.live.clone();
        let probes = [
            (selector.context, &self.contexts),
            (selector.subject, &self.subjects),
            (selector.predicate, &self.predicates),
            (selector.object, &self.objects),
        ];
        for (term, lookup) in probes {
            if let Some(term) = term {
                hits &= lookup.lookup(term);
            }
        }
        hits.iter()
            .filter_map(|id| self.kept[id as usize].clone())
            .collect()
    }
    fn len(&self) -> usize {
        self.positions.len()
    }
    fn iter(&self) -> impl Iterator<Item = &Quad> {
        self.kept.iter().flatten()
    }
}

// ------------- Graph -------------
/// A set of triples named by a context IRI.
#[derive(Clone, Debug)]
pub struct Graph {
    context: Term,
    keeper: FactKeeper,
}

impl Graph {
    pub fn new(context: Term) -> Self {
        Self { context, keeper: FactKeeper::default() }
    }
    pub fn context(&self) -> &Term {
        &self.context
    }
    /// Returns false when the triple was already kept.
    pub fn insert(&mut self, subject: Term, predicate: Term, object: Term) -> bool {
        self.keeper.keep(Quad::triple(subject, predicate, object))
    }
    pub fn remove(&mut self, subject: Term, predicate: Term, object: Term) -> bool {
        self.keeper.release(&Quad::triple(subject, predicate, object))
    }
    pub fn len(&self) -> usize {
        self.keeper.len()
    }
    pub fn is_empty(&self) -> bool {
        self.keeper.len() == 0
    }
    pub fn triples(&self) -> impl Iterator<Item = &Quad> {
        self.keeper.iter()
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new(Term::default_context())
    }
}

impl FromIterator<(Term, Term, Term)> for Graph {
    fn from_iter<I: IntoIterator<Item = (Term, Term, Term)>>(triples: I) -> Self {
        let mut graph = Graph::default();
        for (subject, predicate, object) in triples {
            graph.insert(subject, predicate, object);
        }
        graph
    }
}

impl FactSource for Graph {
    fn select(&self, selector: &Selector<'_>) -> Result<Vec<Quad>> {
        if selector.context.is_some_and(|context| *context != self.context) {
            return Ok(Vec::new());
        }
        let triples = self.keeper.select(&Selector { context: None, ..*selector });
        Ok(triples
            .into_iter()
            .map(|triple| Quad { context: Some(self.context.clone()), ..triple })
            .collect())
    }
}

// ------------- Store -------------
/// A set of quads spanning any number of contexts.
#[derive(Clone, Debug, Default)]
pub struct Store {
    keeper: FactKeeper,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }
    /// Quads without a context land in the default context.
    pub fn insert(&mut self, quad: Quad) -> bool {
        self.keeper.keep(Self::contextualize(quad))
    }
    pub fn remove(&mut self, quad: &Quad) -> bool {
        self.keeper.release(&Self::contextualize(quad.clone()))
    }
    /// Returns how many quads were new.
    pub fn insert_facts<I: IntoIterator<Item = Quad>>(&mut self, facts: I) -> usize {
        facts.into_iter().filter(|quad| self.insert(quad.clone())).count()
    }
    /// Returns how many quads were present and removed.
    pub fn delete_facts<'q, I: IntoIterator<Item = &'q Quad>>(&mut self, facts: I) -> usize {
        facts.into_iter().filter(|quad| self.remove(quad)).count()
    }
    pub fn len(&self) -> usize {
        self.keeper.len()
    }
    pub fn is_empty(&self) -> bool {
        self.keeper.len() == 0
    }
    pub fn quads(&self) -> impl Iterator<Item = &Quad> {
        self.keeper.iter()
    }
    pub fn contexts(&self) -> HashSet<&Term> {
        self.keeper.iter().filter_map(|quad| quad.context.as_ref()).collect()
    }
    fn contextualize(mut quad: Quad) -> Quad {
        if quad.context.is_none() {
            quad.context = Some(Term::default_context());
        }
        quad
    }
}

impl FromIterator<Quad> for Store {
    fn from_iter<I: IntoIterator<Item = Quad>>(quads: I) -> Self {
        let mut store = Store::new();
        store.insert_facts(quads);
        store
    }
}

impl FactSource for Store {
    fn select(&self, selector: &Selector<'_>) -> Result<Vec<Quad>> {
        Ok(self.keeper.select(selector))
    }
}

// ------------- Federation -------------
/// An ordered, nestable collection of heterogeneous data sources that are
/// queried independently and merged.
#[derive(Clone, Default)]
pub struct Federation {
    members: Vec<DataSource>,
}

impl Federation {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with(mut self, member: DataSource) -> Self {
        self.members.push(member);
        self
    }
    pub fn push(&mut self, member: DataSource) {
        self.members.push(member);
    }
    pub fn members(&self) -> &[DataSource] {
        &self.members
    }
    pub fn len(&self) -> usize {
        self.members.len()
    }
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

// ------------- DataSource -------------
#[derive(Clone)]
pub enum DataSource {
    Graph(Arc<dyn FactSource>),
    Store(Arc<dyn FactSource>),
    Federation(Federation),
    Remote(RemoteMember),
}

impl DataSource {
    pub fn graph(graph: Graph) -> Self {
        Self::Graph(Arc::new(graph))
    }
    pub fn store(store: Store) -> Self {
        Self::Store(Arc::new(store))
    }
    pub fn federation(federation: Federation) -> Self {
        Self::Federation(federation)
    }
    pub fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }
    /// Whether facts read from this source carry a context worth keeping.
    pub fn has_contexts(&self) -> bool {
        match self {
            Self::Store(_) => true,
            Self::Federation(federation) => federation.members().iter().any(DataSource::has_contexts),
            Self::Graph(_) | Self::Remote(_) => false,
        }
    }
    /// The non-federation sources reachable from this one, in declaration
    /// order, nested federations flattened.
    pub fn leaves(&self) -> Vec<&DataSource> {
        match self {
            Self::Federation(federation) => {
                federation.members().iter().flat_map(DataSource::leaves).collect()
            }
            other => vec![other],
        }
    }
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Graph(_) => "graph",
            Self::Store(_) => "store",
            Self::Federation(_) => "federation",
            Self::Remote(_) => "remote",
        }
    }
}

impl fmt::Debug for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Federation(federation) => f.debug_list().entries(federation.members()).finish(),
            Self::Remote(member) => write!(f, "remote({})", member.endpoint.address()),
            other => write!(f, "{}", other.kind()),
        }
    }
}
