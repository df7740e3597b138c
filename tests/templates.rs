use mirella::source::{Quad, Store};
use mirella::table::BindingTable;
use mirella::template::{materialize_templates, OBJECT, PREDICATE, SUBJECT};
use mirella::term::{Term, Variable};
use mirella::{DataSource, Engine, EngineConfig, Pattern, PatternGroup, UpdateOperation};

fn v(name: &str) -> Variable {
    Variable::new(name)
}

fn iri(name: &str) -> Term {
    Term::iri(format!("ex:{name}"))
}

fn spo(rows: &[[Term; 3]]) -> BindingTable {
    let mut table = BindingTable::with_columns([v("s"), v("p"), v("o")]);
    for row in rows {
        table.push_row(row.iter().cloned().map(Some).collect());
    }
    table
}

fn everything() -> Vec<Pattern> {
    vec![Pattern::new(Term::var("s"), Term::var("p"), Term::var("o"))]
}

#[test]
fn literal_predicate_produces_nothing() {
    let table = spo(&[[iri("a"), Term::literal("nope"), iri("b")]]);
    let facts = materialize_templates(&everything(), &table, false, &Term::default_context());
    assert!(facts.is_empty());
    assert_eq!(facts.columns(), &[v(SUBJECT), v(PREDICATE), v(OBJECT)]);
}

#[test]
fn literal_subject_and_blank_predicate_are_skipped() {
    let table = spo(&[
        [Term::literal("x"), iri("p"), iri("b")],
        [iri("a"), Term::blank("b0"), iri("b")],
        [Term::blank("b1"), iri("p"), Term::literal("ok")],
    ]);
    let facts = materialize_templates(&everything(), &table, false, &Term::default_context());
    assert_eq!(facts.row_count(), 1);
    assert_eq!(facts.value(0, &v(SUBJECT)), Some(&Term::blank("b1")));
}

#[test]
fn unbound_cells_skip_the_row() {
    let mut table = spo(&[[iri("a"), iri("p"), iri("b")]]);
    table.push_row(vec![Some(iri("c")), Some(iri("p")), None]);
    let facts = materialize_templates(&everything(), &table, false, &Term::default_context());
    assert_eq!(facts.row_count(), 1);
}

#[test]
fn ground_template_emits_one_fact() {
    let ground = vec![Pattern::new(iri("a"), iri("p"), iri("b"))];
    let facts = materialize_templates(&ground, &BindingTable::new(), false, &Term::default_context());
    assert_eq!(facts.row_count(), 1);
    let many = spo(&[
        [iri("x"), iri("y"), iri("z")],
        [iri("x"), iri("y"), iri("w")],
    ]);
    let facts = materialize_templates(&ground, &many, false, &Term::default_context());
    assert_eq!(facts.row_count(), 1);
}

#[test]
fn template_with_unknown_variables_is_ignored() {
    let table = spo(&[[iri("a"), iri("p"), iri("b")]]);
    let templates = vec![Pattern::new(Term::var("s"), iri("q"), Term::var("missing"))];
    assert!(materialize_templates(&templates, &table, false, &Term::default_context()).is_empty());
}

#[test]
fn quads_fall_back_to_the_default_context() {
    let table = spo(&[[iri("a"), iri("p"), iri("b")]]);
    let templates = vec![
        Pattern::new(Term::var("s"), Term::var("p"), Term::var("o")),
        Pattern::quad(iri("g"), Term::var("s"), Term::var("p"), Term::var("o")),
    ];
    let facts = materialize_templates(&templates, &table, true, &iri("fallback")).facts();
    assert_eq!(facts.len(), 2);
    assert_eq!(facts[0].context, Some(iri("fallback")));
    assert_eq!(facts[1].context, Some(iri("g")));
}

#[test]
fn insert_and_delete_round_through_a_store() {
    let mut store: Store = [
        Quad::new(iri("g"), iri("ann"), iri("age"), Term::integer(30)),
        Quad::new(iri("g"), iri("bob"), iri("age"), Term::integer(40)),
    ]
    .into_iter()
    .collect();
    let config = EngineConfig { default_context: "ex:archive".to_string(), ..EngineConfig::default() };
    let engine = Engine::new(config);
    let operation = UpdateOperation::new()
        .group(PatternGroup::new().pattern(Pattern::new(Term::var("who"), iri("age"), Term::var("age"))))
        .template(Pattern::new(Term::var("who"), iri("aged"), Term::var("age")));

    let inserted = engine.evaluate_insert(&operation, &DataSource::store(store.clone())).unwrap();
    assert_eq!(inserted.len(), 2);
    assert!(inserted.facts().iter().all(|fact| fact.context == Some(iri("archive"))));
    assert_eq!(store.insert_facts(inserted.facts()), 2);
    assert_eq!(store.insert_facts(inserted.facts()), 0);
    assert_eq!(store.len(), 4);

    let deleted = engine.evaluate_delete(&operation, &DataSource::store(store.clone())).unwrap();
    assert_eq!(store.delete_facts(&deleted.facts()), 2);
    assert_eq!(store.len(), 2);
    assert_eq!(store.contexts().len(), 1);
}
