use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use mirella::expression::{expression, row_filter};
use mirella::group::{evaluate_group, Values};
use mirella::remote::{HttpMethod, RemoteEndpoint, RemoteMember, RemoteOptions};
use mirella::table::BindingTable;
use mirella::term::{Term, Variable};
use mirella::{
    AskQuery, ConstructQuery, DataSource, Engine, Federation, Graph, MirellaError, Pattern, PatternGroup,
    Result, SelectQuery,
};

fn iri(name: &str) -> Term {
    Term::iri(format!("ex:{name}"))
}

fn v(name: &str) -> Variable {
    Variable::new(name)
}

fn knows() -> DataSource {
    let graph: Graph = [
        (iri("alice"), iri("knows"), iri("bob")),
        (iri("bob"), iri("knows"), iri("carol")),
        (iri("alice"), iri("name"), Term::literal("Alice")),
        (iri("carol"), iri("name"), Term::literal("Carol")),
    ]
    .into_iter()
    .collect();
    DataSource::graph(graph)
}

#[test]
fn union_of_both_directions() {
    let group = PatternGroup::new()
        .pattern(Pattern::new(Term::var("x"), iri("knows"), Term::var("y")).union_with_next())
        .pattern(Pattern::new(Term::var("y"), iri("knows"), Term::var("x")));
    let result = Engine::default().evaluate_select(&SelectQuery::new().group(group), &knows()).unwrap();
    assert_eq!(result.table.row_count(), 4);
    assert_eq!(result.table.columns(), &[v("x"), v("y")]);
}

#[test]
fn construct_types_every_subject() {
    let values = Values::new(vec![v("s")]).row(vec![Some(iri("a"))]).row(vec![Some(iri("b"))]);
    let query = ConstructQuery::new()
        .group(PatternGroup::new().values(values))
        .template(Pattern::new(Term::var("s"), Term::rdf_type(), iri("Person")));
    let result = Engine::default().evaluate_construct(&query, &knows()).unwrap();
    assert_eq!(result.len(), 2);
    let facts = result.facts();
    assert_eq!(facts[0].subject, iri("a"));
    assert_eq!(facts[1].predicate, Term::rdf_type());
    assert!(facts.iter().all(|fact| fact.context.is_none()));
}

#[test]
fn federated_members_both_answer() {
    let g1: Graph = [(iri("a"), iri("p"), iri("b"))].into_iter().collect();
    let g2: Graph = [(iri("a"), iri("p"), iri("c"))].into_iter().collect();
    let source = DataSource::federation(
        Federation::new().with(DataSource::graph(g1)).with(DataSource::graph(g2)),
    );
    let query = SelectQuery::new()
        .group(PatternGroup::new().pattern(Pattern::new(iri("a"), iri("p"), Term::var("o"))));
    let result = Engine::default().evaluate_select(&query, &source).unwrap();
    assert_eq!(result.table.column_values(&v("o")), vec![iri("b"), iri("c")]);
}

#[test]
fn groups_evaluate_once_per_federation_member() {
    let g1: Graph = [(iri("a"), iri("p"), iri("b")), (iri("b"), iri("q"), iri("c"))].into_iter().collect();
    let g2: Graph = [(iri("a"), iri("p"), iri("d")), (iri("b"), iri("q"), iri("e"))].into_iter().collect();
    let source = DataSource::federation(
        Federation::new().with(DataSource::graph(g1)).with(DataSource::graph(g2)),
    );
    let group = PatternGroup::new()
        .pattern(Pattern::new(iri("a"), iri("p"), Term::var("x")))
        .pattern(Pattern::new(iri("b"), iri("q"), Term::var("y")))
        .optional();
    let table = evaluate_group(&group, &source).unwrap();
    // each member joins its own facts, nothing crosses members
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.value(0, &v("y")), Some(&iri("c")));
    assert_eq!(table.value(1, &v("y")), Some(&iri("e")));
    assert!(table.flags.optional);
}

#[test]
fn ask_reports_whether_anything_matched() {
    let engine = Engine::default();
    let hit = AskQuery::new()
        .group(PatternGroup::new().pattern(Pattern::new(iri("alice"), iri("knows"), Term::var("who"))));
    assert!(engine.evaluate_ask(&hit, &knows()).unwrap().value);
    let miss = AskQuery::new()
        .group(PatternGroup::new().pattern(Pattern::new(iri("carol"), iri("knows"), Term::var("who"))));
    assert!(!engine.evaluate_ask(&miss, &knows()).unwrap().value);
}

#[test]
fn optional_group_keeps_unnamed_people() {
    let query = SelectQuery::new()
        .group(PatternGroup::new().pattern(Pattern::new(Term::var("x"), iri("knows"), Term::var("y"))))
        .group(
            PatternGroup::new()
                .pattern(Pattern::new(Term::var("y"), iri("name"), Term::var("n")))
                .optional(),
        );
    let result = Engine::default().evaluate_select(&query, &knows()).unwrap();
    assert_eq!(result.table.row_count(), 2);
    let named: Vec<_> = result.table.views().filter(|row| row.is_bound(&v("n"))).collect();
    assert_eq!(named.len(), 1);
    assert_eq!(named[0].get(&v("y")), Some(&iri("carol")));
}

#[test]
fn optional_pattern_survives_federation() {
    let query = SelectQuery::new()
        .group(PatternGroup::new().pattern(Pattern::new(Term::var("x"), iri("knows"), Term::var("y"))))
        .group(PatternGroup::new().pattern(Pattern::new(Term::var("y"), iri("name"), Term::var("n")).optional()));
    let engine = Engine::default();
    let single = engine.evaluate_select(&query, &knows()).unwrap();
    let federated = DataSource::federation(
        Federation::new().with(knows()).with(DataSource::graph(Graph::default())),
    );
    let merged = engine.evaluate_select(&query, &federated).unwrap();
    assert_eq!(single.table.row_count(), 2);
    assert_eq!(merged.table.rows(), single.table.rows());
}

#[test]
fn subquery_never_propagates_minus() {
    let mut inner = SelectQuery::new()
        .group(PatternGroup::new().pattern(Pattern::new(Term::var("x"), iri("name"), Term::var("n"))))
        .project(v("x"));
    inner.flags.join_as_minus = true;
    let query = SelectQuery::new()
        .subquery(inner)
        .group(PatternGroup::new().pattern(Pattern::new(Term::var("x"), iri("knows"), Term::var("y"))));
    let result = Engine::default().evaluate_select(&query, &knows()).unwrap();
    // joined, not subtracted: only alice both has a name and knows someone
    assert_eq!(result.table.column_values(&v("x")), vec![iri("alice")]);
    assert_eq!(result.table.value(0, &v("y")), Some(&iri("bob")));
}

#[test]
fn minus_group_drops_compatible_rows() {
    let query = SelectQuery::new()
        .group(
            PatternGroup::new()
                .pattern(Pattern::new(Term::var("x"), iri("knows"), Term::var("y")))
                .minus_with_next(),
        )
        .group(PatternGroup::new().pattern(Pattern::new(Term::var("x"), iri("name"), Term::var("n"))));
    let result = Engine::default().evaluate_select(&query, &knows()).unwrap();
    assert_eq!(result.table.column_values(&v("x")), vec![iri("bob")]);
}

#[test]
fn filters_and_binds_shape_a_group() {
    let group = PatternGroup::new()
        .pattern(Pattern::new(Term::var("x"), iri("knows"), Term::var("y")))
        .bind(v("greeting"), expression(|row| row.get(&v("x")).map(|x| Term::literal(format!("hi {}", x.lexical())))))
        .filter(row_filter(|row| row.get(&v("y")) != Some(&iri("bob"))));
    let result = Engine::default().evaluate_select(&SelectQuery::new().group(group), &knows()).unwrap();
    assert_eq!(result.table.row_count(), 1);
    assert_eq!(result.table.value(0, &v("greeting")), Some(&Term::literal("hi ex:bob")));
}

#[test]
fn bind_onto_an_existing_column_is_rejected() {
    let group = PatternGroup::new()
        .pattern(Pattern::new(Term::var("x"), iri("knows"), Term::var("y")))
        .bind(v("y"), expression(|_| None));
    let outcome = Engine::default().evaluate_select(&SelectQuery::new().group(group), &knows());
    assert!(matches!(outcome, Err(MirellaError::Configuration(_))));
}

#[test]
fn exists_filters_probe_their_own_pattern() {
    let named = Pattern::new(Term::var("y"), iri("name"), Term::var("n"));
    let base = || PatternGroup::new().pattern(Pattern::new(Term::var("x"), iri("knows"), Term::var("y")));
    let engine = Engine::default();

    let with = SelectQuery::new().group(base().exists(named.clone()));
    let result = engine.evaluate_select(&with, &knows()).unwrap();
    assert_eq!(result.table.column_values(&v("y")), vec![iri("carol")]);
    assert!(!result.table.has_column(&v("n")));

    let without = SelectQuery::new().group(base().not_exists(named));
    let result = engine.evaluate_select(&without, &knows()).unwrap();
    assert_eq!(result.table.column_values(&v("y")), vec![iri("bob")]);
}

#[test]
fn subquery_results_join_with_groups() {
    let inner = SelectQuery::new()
        .group(PatternGroup::new().pattern(Pattern::new(Term::var("x"), iri("name"), Term::var("n"))))
        .project(v("x"))
        .limit(1);
    let query = SelectQuery::new()
        .group(PatternGroup::new().pattern(Pattern::new(Term::var("x"), iri("knows"), Term::var("y"))))
        .subquery(inner);
    let result = Engine::default().evaluate_select(&query, &knows()).unwrap();
    assert_eq!(result.table.row_count(), 1);
    assert_eq!(result.table.value(0, &v("x")), Some(&iri("alice")));
    assert!(!result.table.has_column(&v("n")));
}

#[test]
fn malformed_values_are_a_configuration_error() {
    let values = Values::new(vec![v("a"), v("b")]).row(vec![Some(iri("x"))]);
    let query = SelectQuery::new().group(PatternGroup::new().values(values));
    let outcome = Engine::default().evaluate_select(&query, &knows());
    assert!(matches!(outcome, Err(MirellaError::Configuration(_))));
}

// ------------- Remote members -------------
struct Canned {
    answer: Option<BindingTable>,
    calls: AtomicUsize,
}

impl RemoteEndpoint for Canned {
    fn address(&self) -> &str {
        "http://remote.example/sparql"
    }
    fn query(&self, query: &str, method: HttpMethod, _timeout: Option<Duration>) -> Result<BindingTable> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(query.starts_with("SELECT * WHERE {"));
        assert_eq!(method, HttpMethod::Post);
        self.answer
            .clone()
            .ok_or_else(|| MirellaError::remote(self.address(), "503 Service Unavailable"))
    }
}

fn remote(answer: Option<BindingTable>, silent: bool) -> (Arc<Canned>, DataSource) {
    let endpoint = Arc::new(Canned { answer, calls: AtomicUsize::new(0) });
    let options = RemoteOptions { method: HttpMethod::Post, timeout: None, silent };
    let member = DataSource::Remote(RemoteMember::new(endpoint.clone(), options));
    (endpoint, DataSource::federation(Federation::new().with(knows()).with(member)))
}

fn who_alice_knows() -> SelectQuery {
    SelectQuery::new()
        .group(PatternGroup::new().pattern(Pattern::new(iri("alice"), iri("knows"), Term::var("o"))))
}

#[test]
fn remote_answers_are_aligned_with_the_pattern() {
    let mut answer = BindingTable::new();
    answer.push_bindings([(v("extra"), iri("noise")), (v("o"), iri("dave"))]);
    let (endpoint, source) = remote(Some(answer), false);
    let result = Engine::default().evaluate_select(&who_alice_knows(), &source).unwrap();
    assert_eq!(result.table.columns(), &[v("o")]);
    assert_eq!(result.table.column_values(&v("o")), vec![iri("bob"), iri("dave")]);
    assert_eq!(endpoint.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn failing_remote_member_fails_the_query() {
    let (_, source) = remote(None, false);
    let outcome = Engine::default().evaluate_select(&who_alice_knows(), &source);
    match outcome {
        Err(MirellaError::RemoteEndpoint { endpoint, excerpt }) => {
            assert_eq!(endpoint, "http://remote.example/sparql");
            assert!(excerpt.contains("503"));
        }
        other => panic!("expected a remote failure, got {other:?}"),
    }
}

#[test]
fn silent_member_contributes_nothing_on_failure() {
    let (_, source) = remote(None, true);
    let result = Engine::default().evaluate_select(&who_alice_knows(), &source).unwrap();
    assert_eq!(result.table.column_values(&v("o")), vec![iri("bob")]);
}

#[test]
fn silent_query_turns_remote_failure_into_empty_result() {
    let (_, source) = remote(None, false);
    let result = Engine::default().evaluate_select(&who_alice_knows().silent(), &source).unwrap();
    assert!(result.table.is_empty());
}

#[test]
fn remote_excerpts_are_truncated() {
    let error = MirellaError::remote("http://remote.example/sparql", &"x".repeat(1000));
    match error {
        MirellaError::RemoteEndpoint { excerpt, .. } => assert!(excerpt.len() < 300),
        _ => unreachable!(),
    }
}
