use mirella::source::{Quad, Store};
use mirella::term::{Term, Variable};
use mirella::{DataSource, DescribeQuery, Engine, Graph, Pattern, PatternGroup};

fn iri(name: &str) -> Term {
    Term::iri(format!("ex:{name}"))
}

fn library() -> Graph {
    [
        (iri("dune"), iri("author"), iri("herbert")),
        (iri("dune"), iri("title"), Term::literal("Dune")),
        (iri("herbert"), iri("wrote"), iri("dune")),
        (iri("herbert"), iri("born"), Term::integer(1920)),
        (Term::blank("review"), iri("about"), iri("dune")),
        (Term::blank("review"), iri("stars"), Term::integer(5)),
    ]
    .into_iter()
    .collect()
}

#[test]
fn resource_is_described_in_every_position() {
    let query = DescribeQuery::new().describe(iri("dune"));
    let result = Engine::default().evaluate_describe(&query, &DataSource::graph(library())).unwrap();
    // as subject twice, as object twice, never as predicate
    assert_eq!(result.len(), 4);
    assert!(result.facts().iter().all(|fact| fact.subject == iri("dune") || fact.object == iri("dune")));
}

#[test]
fn resource_used_as_predicate_is_described_too() {
    let query = DescribeQuery::new().describe(iri("author"));
    let result = Engine::default().evaluate_describe(&query, &DataSource::graph(library())).unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result.facts()[0].subject, iri("dune"));
}

#[test]
fn literal_is_described_as_object_only() {
    let query = DescribeQuery::new().describe(Term::literal("Dune"));
    let result = Engine::default().evaluate_describe(&query, &DataSource::graph(library())).unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result.facts()[0].predicate, iri("title"));
}

#[test]
fn blank_node_is_described_as_subject_and_object() {
    let query = DescribeQuery::new().describe(Term::blank("review"));
    let result = Engine::default().evaluate_describe(&query, &DataSource::graph(library())).unwrap();
    assert_eq!(result.len(), 2);
}

#[test]
fn variables_describe_every_bound_value_once() {
    let query = DescribeQuery::new()
        .group(PatternGroup::new().pattern(Pattern::new(Term::var("book"), iri("author"), Term::var("who"))))
        .describe(Term::var("who"))
        .describe(iri("herbert"));
    let result = Engine::default().evaluate_describe(&query, &DataSource::graph(library())).unwrap();
    // herbert: two facts as subject, one as object
    assert_eq!(result.len(), 3);
}

#[test]
fn describe_star_covers_every_column() {
    let query = DescribeQuery::new()
        .group(PatternGroup::new().pattern(Pattern::new(Term::var("book"), iri("author"), Term::var("who"))));
    let all = Engine::default().evaluate_describe(&query, &DataSource::graph(library())).unwrap();
    // dune (4) and herbert (3) share two facts
    assert_eq!(all.len(), 5);

    let limited = Engine::default()
        .evaluate_describe(&query.clone().offset(1).limit(2), &DataSource::graph(library()))
        .unwrap();
    assert_eq!(limited.len(), 2);
}

#[test]
fn stores_describe_with_contexts() {
    let store: Store = [
        Quad::new(iri("shelf"), iri("dune"), iri("author"), iri("herbert")),
        Quad::new(iri("attic"), iri("shelf"), iri("holds"), iri("dune")),
    ]
    .into_iter()
    .collect();
    let query = DescribeQuery::new().describe(iri("shelf"));
    let result = Engine::default().evaluate_describe(&query, &DataSource::store(store)).unwrap();
    assert!(result.table.has_column(&Variable::new("CONTEXT")));
    // the quad in context shelf, plus shelf as a subject in the attic
    assert_eq!(result.len(), 2);
    let facts = result.facts();
    assert!(facts.iter().any(|fact| fact.context == Some(iri("shelf"))));
    assert!(facts.iter().any(|fact| fact.context == Some(iri("attic"))));
}
