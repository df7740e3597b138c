use mirella::path::{evaluate_path, expand_path};
use mirella::pattern::PathEdge;
use mirella::source::{DataSource, Graph};
use mirella::term::{Term, Variable};
use mirella::{Engine, PatternGroup, PropertyPath, SelectQuery};

fn iri(name: &str) -> Term {
    Term::iri(format!("ex:{name}"))
}

fn family() -> DataSource {
    let graph: Graph = [
        (iri("ann"), iri("parent"), iri("bob")),
        (iri("bob"), iri("parent"), iri("cid")),
        (iri("bob"), iri("guardian"), iri("dan")),
        (iri("eve"), iri("friend"), iri("ann")),
    ]
    .into_iter()
    .collect();
    DataSource::graph(graph)
}

#[test]
fn sequence_chains_through_synthetic_links() {
    let path = PropertyPath::new(Term::var("x"), Term::var("y"))
        .then(PathEdge::new(iri("parent")))
        .then(PathEdge::new(iri("parent")));
    let patterns = expand_path(&path).unwrap();
    assert_eq!(patterns.len(), 2);
    assert_eq!(patterns[0].object, patterns[1].subject);

    let table = evaluate_path(&path, &family()).unwrap();
    assert_eq!(table.columns(), &[Variable::new("x"), Variable::new("y")]);
    assert_eq!(table.row_count(), 1);
    assert_eq!(table.value(0, &Variable::new("x")), Some(&iri("ann")));
    assert_eq!(table.value(0, &Variable::new("y")), Some(&iri("cid")));
}

#[test]
fn alternatives_are_unioned() {
    let path = PropertyPath::new(iri("bob"), Term::var("y"))
        .either(vec![PathEdge::new(iri("parent")), PathEdge::new(iri("guardian"))]);
    let patterns = expand_path(&path).unwrap();
    assert!(patterns[0].flags.join_as_union);
    assert!(!patterns[1].flags.join_as_union);

    let table = evaluate_path(&path, &family()).unwrap();
    assert_eq!(table.column_values(&Variable::new("y")), vec![iri("cid"), iri("dan")]);
}

#[test]
fn inverse_edges_swap_direction() {
    let path = PropertyPath::new(iri("bob"), Term::var("p"))
        .then(PathEdge::inverse(iri("parent")))
        .then(PathEdge::inverse(iri("friend")));
    let table = evaluate_path(&path, &family()).unwrap();
    assert_eq!(table.column_values(&Variable::new("p")), vec![iri("eve")]);
}

#[test]
fn paths_without_steps_are_rejected() {
    let path = PropertyPath::new(Term::var("x"), Term::var("y"));
    assert!(expand_path(&path).is_err());
    let empty_choice = PropertyPath::new(Term::var("x"), Term::var("y")).either(Vec::new());
    assert!(expand_path(&empty_choice).is_err());
}

#[test]
fn path_members_join_with_patterns() {
    let path = PropertyPath::new(Term::var("x"), Term::var("z"))
        .then(PathEdge::new(iri("parent")))
        .then(PathEdge::new(iri("parent")));
    let query = SelectQuery::new().group(
        PatternGroup::new()
            .pattern(mirella::Pattern::new(Term::var("f"), iri("friend"), Term::var("x")))
            .path(path),
    );
    let result = Engine::default().evaluate_select(&query, &family()).unwrap();
    assert_eq!(result.table.row_count(), 1);
    assert!(result.table.columns().iter().all(|c| !c.is_synthetic()));
    assert_eq!(result.table.value(0, &Variable::new("f")), Some(&iri("eve")));
}

#[test]
fn hash_in_a_user_variable_is_not_a_path_link() {
    let start = Term::Variable(Variable::new("a#b"));
    let path = PropertyPath::new(start, Term::var("y"))
        .then(PathEdge::new(iri("parent")))
        .then(PathEdge::new(iri("parent")));
    let table = evaluate_path(&path, &family()).unwrap();
    assert_eq!(table.columns(), &[Variable::new("a#b"), Variable::new("y")]);
    assert_eq!(table.value(0, &Variable::new("a#b")), Some(&iri("ann")));
    assert!(!Variable::new("path#1").is_synthetic());
    assert_ne!(Variable::new("path#1"), Variable::synthetic("path", 1));
}
