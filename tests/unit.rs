//! Unit tests for the term context, the built-in optimizer, labels, configuration and
//! the constraint language.
mod common;
use common::*;
use flowmend::constraint::{RelevantLabels, SelectorKind};
use flowmend::cost::CostFunction;
use flowmend::error::{ConversionError, SolverError};
use flowmend::prelude::*;
use std::result::Result;
use flowmend::solver::{Context, DisplayTerm, Model, SatResult, Sort, TermNode, Value};

#[test]
fn test_label_parse_and_display() {
    let label = Label::parse("Stereotype.encrypted_connection").unwrap();
    assert_eq!(label, Label::new("Stereotype", "encrypted_connection"));
    assert_eq!(label.to_string(), "Stereotype.encrypted_connection");
    // Only the first dot separates kind and value.
    assert_eq!(Label::parse("A.b.c").unwrap().value, "b.c");
    assert!(matches!(Label::parse("nodot"), Err(ModelError::InvalidLabel(_))));
    assert!(Label::parse(".value").is_err());
}

#[test]
fn test_context_folds_constants() {
    let mut ctx = Context::new();
    let x = ctx.bool_var("x", false);
    let y = ctx.bool_var("y", false);
    let (tt, ff) = (ctx.tt(), ctx.ff());

    assert_eq!(ctx.and([x, tt]), x);
    assert_eq!(ctx.and([x, ff]), ff);
    assert_eq!(ctx.or([x, tt]), tt);
    assert_eq!(ctx.or(Vec::new()), ff);
    assert_eq!(ctx.and(Vec::new()), tt);
    let not_x = ctx.not(x);
    assert_eq!(ctx.not(not_x), x);
    assert_eq!(ctx.and([x, not_x]), ff);
    assert_eq!(ctx.or([x, not_x]), tt);
    assert_eq!(ctx.xor(x, x), ff);
    assert_eq!(ctx.xor(x, ff), x);
    assert_eq!(ctx.ite(tt, x, y), x);
    assert_eq!(ctx.ite(x, tt, ff), x);
}

#[test]
fn test_context_hash_conses_structure() {
    let mut ctx = Context::new();
    let x = ctx.bool_var("x", false);
    let y = ctx.bool_var("y", false);
    let z = ctx.bool_var("z", false);

    let xy = ctx.and([x, y]);
    assert_eq!(ctx.and([y, x]), xy);
    let nested = ctx.and([xy, z]);
    assert_eq!(ctx.node(nested), &TermNode::And(vec![x, y, z]));
    assert_eq!(ctx.or([x, y, x]), ctx.or([y, x]));
    assert_eq!(ctx.sort(xy), Sort::Bool);
}

#[test]
fn test_integer_arithmetic_folds() {
    let mut ctx = Context::new();
    let (two, three) = (ctx.int(2), ctx.int(3));
    let k = ctx.int_var("k", 0, 5).unwrap();

    let sum = ctx.add([two, three]);
    assert_eq!(ctx.as_int(sum), Some(5));
    let scaled = ctx.mul(4, three);
    assert_eq!(ctx.as_int(scaled), Some(12));
    assert_eq!(ctx.mul(1, k), k);
    let eq = ctx.eq(two, three);
    assert_eq!(ctx.as_bool(eq), Some(false));
    assert!(matches!(
        ctx.int_var("bad", 3, 1),
        Err(SolverError::EmptyDomain { lo: 3, hi: 1, .. })
    ));
}

#[test]
fn test_model_evaluates_terms() {
    let mut ctx = Context::new();
    let x = ctx.bool_var("x", false);
    let k = ctx.int_var("k", 0, 3).unwrap();
    let one = ctx.int(1);
    let zero = ctx.int(0);
    let indicator = ctx.ite(x, one, zero);
    let total = ctx.add([indicator, k]);

    let model = Model::new(vec![Value::Bool(true), Value::Int(2)]);

    assert_eq!(model.eval_int(&ctx, total).unwrap(), 3);
    assert!(model.eval_bool(&ctx, x).unwrap());
    assert!(matches!(
        model.eval_bool(&ctx, total),
        Err(SolverError::SortMismatch { expected: "bool", .. })
    ));
}

#[test]
fn test_cost_function_weights_changes() {
    let mut ctx = Context::new();
    let a = ctx.bool_var("a", false);
    let b = ctx.bool_var("b", true);
    let free = ctx.bool_var("free", false);
    let (ff, tt) = (ctx.ff(), ctx.tt());

    let mut cost = CostFunction::new();
    cost.add(&mut ctx, a, ff, 3);
    cost.add(&mut ctx, b, tt, 2);
    cost.add(&mut ctx, free, ff, 0);
    assert_eq!(cost.len(), 2);
    let objective = cost.build(&mut ctx);

    let unchanged = Model::new(vec![Value::Bool(false), Value::Bool(true), Value::Bool(true)]);
    let both = Model::new(vec![Value::Bool(true), Value::Bool(false), Value::Bool(true)]);
    assert_eq!(unchanged.eval_int(&ctx, objective).unwrap(), 0);
    assert_eq!(both.eval_int(&ctx, objective).unwrap(), 5);

    let empty = CostFunction::new();
    assert!(empty.is_empty());
    let zero = empty.build(&mut ctx);
    assert_eq!(ctx.as_int(zero), Some(0));
}

#[test]
fn test_z3_optimizer_minimizes() {
    let mut ctx = Context::new();
    let a = ctx.bool_var("a", false);
    let b = ctx.bool_var("b", false);
    let c = ctx.bool_var("c", false);
    let ff = ctx.ff();
    // (a or b) and (b or c): b alone is optimal.
    let ab = ctx.or([a, b]);
    let bc = ctx.or([b, c]);
    let mut cost = CostFunction::new();
    for var in [a, b, c] {
        cost.add(&mut ctx, var, ff, 1);
    }
    let objective = cost.build(&mut ctx);

    let mut optimizer = Z3Optimizer::new();
    optimizer.assert(&ctx, ab).unwrap();
    optimizer.assert(&ctx, bc).unwrap();
    optimizer.minimize(&ctx, objective).unwrap();

    assert_eq!(optimizer.check(&ctx).unwrap(), SatResult::Sat);
    let model = optimizer.model().unwrap();
    assert_eq!(model.eval_int(&ctx, objective).unwrap(), 1);
    assert!(model.eval_bool(&ctx, b).unwrap());
    assert!(!model.eval_bool(&ctx, a).unwrap());
    assert!(!model.eval_bool(&ctx, c).unwrap());
}

#[test]
fn test_z3_optimizer_reports_unsat() {
    let mut ctx = Context::new();
    let x = ctx.bool_var("x", false);
    let not_x = ctx.not(x);

    let mut optimizer = Z3Optimizer::new();
    optimizer.assert(&ctx, x).unwrap();
    optimizer.assert(&ctx, not_x).unwrap();

    assert_eq!(optimizer.check(&ctx).unwrap(), SatResult::Unsat);
    assert!(optimizer.model().is_none());
}

#[test]
fn test_z3_optimizer_handles_bounded_integers() {
    let mut ctx = Context::new();
    let k = ctx.int_var("k", 0, 9).unwrap();
    let seven = ctx.int(7);
    let three = ctx.int(3);
    let is_seven = ctx.eq(k, seven);
    let is_three = ctx.eq(k, three);
    let either = ctx.or([is_seven, is_three]);

    let mut optimizer = Z3Optimizer::new();
    optimizer.assert(&ctx, either).unwrap();
    optimizer.minimize(&ctx, k).unwrap();
    assert_eq!(optimizer.check(&ctx).unwrap(), SatResult::Sat);
    assert_eq!(optimizer.model().unwrap().eval_int(&ctx, k).unwrap(), 3);

    // The declared domain is part of the problem.
    let twelve = ctx.int(12);
    let out_of_range = ctx.eq(k, twelve);
    let mut bounded = Z3Optimizer::new();
    bounded.assert(&ctx, out_of_range).unwrap();
    assert_eq!(bounded.check(&ctx).unwrap(), SatResult::Unsat);
}

#[test]
fn test_z3_optimizer_orders_objectives_lexicographically() {
    let mut ctx = Context::new();
    let a = ctx.bool_var("a", false);
    let b = ctx.bool_var("b", false);
    let idle = ctx.bool_var("idle", true);
    let ff = ctx.ff();
    let either = ctx.or([a, b]);
    let mut cost = CostFunction::new();
    cost.add(&mut ctx, a, ff, 1);
    cost.add(&mut ctx, b, ff, 1);
    let objective = cost.build(&mut ctx);
    let (one, zero) = (ctx.int(1), ctx.int(0));
    let keep_a = ctx.ite(a, one, zero);

    let mut optimizer = Z3Optimizer::new().with_timeout_ms(10_000);
    optimizer.assert(&ctx, either).unwrap();
    optimizer.minimize(&ctx, objective).unwrap();
    optimizer.minimize(&ctx, keep_a).unwrap();

    assert_eq!(optimizer.check(&ctx).unwrap(), SatResult::Sat);
    let model = optimizer.model().unwrap();
    assert_eq!(model.eval_int(&ctx, objective).unwrap(), 1);
    assert!(!model.eval_bool(&ctx, a).unwrap());
    assert!(model.eval_bool(&ctx, b).unwrap());
    // Never mentioned, so it keeps its phase.
    assert!(model.eval_bool(&ctx, idle).unwrap());
}

#[test]
fn test_z3_optimizer_checks_sorts() {
    let mut ctx = Context::new();
    let x = ctx.bool_var("x", false);
    let k = ctx.int_var("k", 0, 3).unwrap();

    let mut optimizer = Z3Optimizer::new();
    assert!(matches!(
        optimizer.assert(&ctx, k),
        Err(SolverError::NonBooleanAssertion(_))
    ));
    assert!(matches!(
        optimizer.minimize(&ctx, x),
        Err(SolverError::NonIntegerObjective(_))
    ));
    assert!(optimizer.model().is_none());
}

#[test]
fn test_display_term_names_variables() {
    let mut ctx = Context::new();
    let x = ctx.bool_var("shop_label_encrypted", false);
    let y = ctx.bool_var("user.out_unset_PII", false);
    let not_y = ctx.not(y);
    let term = ctx.or([x, not_y]);

    let rendered = DisplayTerm { ctx: &ctx, term }.to_string();

    assert!(rendered.contains("shop_label_encrypted"));
    assert!(rendered.contains("user.out_unset_PII"));
    assert!(rendered.starts_with("└── "));
}

#[test]
fn test_repair_config_reads_camel_case_with_defaults() {
    let config =
        RepairConfig::from_json(r#"{ "onlyRelevantLabels": false, "removeDataLabels": false }"#)
            .unwrap();

    assert!(!config.only_relevant_labels);
    assert!(!config.remove_data_labels);
    assert!(config.add_data_labels);
    assert!(config.add_node_labels);
    assert!(config.deduplicate);
    assert_eq!(RepairConfig::from_json("{}").unwrap(), RepairConfig::default());
}

#[test]
fn test_relevant_labels_split_by_position() {
    let constraints = vec![
        pii_never_external(),
        pii_needs_encryption(),
        Constraint::builder("marked")
            .of_data()
            .without_label(secret())
            .to_vertex()
            .with_characteristic(secret())
            .create(),
    ];

    let relevant = RelevantLabels::from_constraints(&constraints);

    assert_eq!(relevant.data_remove, vec![pii()]);
    assert_eq!(relevant.data_add, vec![secret()]);
    assert_eq!(relevant.node_add, vec![encrypted()]);
    assert_eq!(relevant.node_remove, vec![secret()]);
    assert_eq!(relevant.vertex_types, vec![VertexType::External]);
    assert_eq!(relevant.data_labels(), vec![secret(), pii()]);
    assert!(!relevant.is_empty());
}

#[test]
fn test_builder_places_selectors_by_section() {
    let constraint = Constraint::builder("mixed")
        .of_data()
        .with_label(pii())
        .with_name("f1")
        .from_vertex()
        .without_name("v1")
        .never_flows()
        .to_vertex()
        .with_any_label([encrypted(), secret()])
        .without_type(VertexType::Store)
        .create();

    assert_eq!(
        constraint.data_source,
        vec![
            Selector::DataCharacteristics {
                label: pii(),
                inverted: false
            },
            Selector::VariableName {
                name: "f1".to_string(),
                inverted: false
            },
        ]
    );
    assert_eq!(
        constraint.vertex_source,
        vec![Selector::VertexName {
            name: "v1".to_string(),
            inverted: true
        }]
    );
    let kinds: Vec<SelectorKind> = constraint
        .vertex_destination
        .iter()
        .map(Selector::kind)
        .collect();
    assert_eq!(
        kinds,
        vec![SelectorKind::VertexCharacteristicsList, SelectorKind::VertexType]
    );
    let roles: Vec<SelectorRole> = constraint.selectors().map(|(_, role)| role).collect();
    assert_eq!(roles[0], SelectorRole::VertexDestination);
    assert_eq!(roles[4], SelectorRole::VertexSource);
}

#[test]
fn test_selector_role_table() {
    assert!(SelectorKind::VertexType.supports(SelectorRole::VertexSource));
    assert!(!SelectorKind::VertexType.supports(SelectorRole::DataSource));
    assert!(SelectorKind::DataCharacteristics.supports(SelectorRole::DataSource));
    assert!(!SelectorKind::VariableName.supports(SelectorRole::VertexDestination));
    assert_eq!(
        SelectorKind::DataCharacteristicList.fallback(),
        Some(SelectorKind::DataCharacteristics)
    );
    assert_eq!(SelectorKind::VertexName.fallback(), None);
}

#[test]
fn test_diagram_definition_converts_by_name() {
    let json = r#"{
        "nodes": [
            { "name": "user", "type": "External",
              "outputs": [{ "name": "out", "assignments": [
                  { "kind": "set", "labels": ["Sensitivity.PII"] } ] }] },
            { "name": "anon", "type": "Process", "labels": ["Stereotype.encrypted_connection"],
              "inputs": ["in"],
              "outputs": [{ "name": "out", "assignments": [
                  { "kind": "forward", "inputs": ["in"] },
                  { "kind": "evaluate", "inputs": ["in"],
                    "term": { "not": { "label": "Sensitivity.PII" } },
                    "labels": ["Sensitivity.Anonymous"] } ] }] },
            { "name": "db", "type": "Store", "inputs": ["in"] }
        ],
        "edges": [
            { "name": "signup", "source": "user", "source_pin": "out",
              "target": "anon", "target_pin": "in" },
            { "name": "store", "source": "anon", "source_pin": "out",
              "target": "db", "target_pin": "in" }
        ]
    }"#;

    let diagram = DiagramDefinition::from_json(json)
        .unwrap()
        .into_diagram()
        .unwrap();

    assert_eq!(diagram.nodes().len(), 3);
    assert_eq!(diagram.edges().len(), 2);
    let anon = diagram.node_by_name("anon").unwrap();
    assert!(anon.has_label(&encrypted()));
    let out = diagram.pin_by_name(anon.id, "out").unwrap();
    let input = diagram.pin_by_name(anon.id, "in").unwrap().id;
    assert_eq!(out.assignments[0], Assignment::forward([input]));
    assert_eq!(
        out.assignments[1],
        Assignment::evaluate(
            [input],
            Term::negate(Term::label(pii())),
            [Label::new("Sensitivity", "Anonymous")]
        )
    );

    let round_trip = Diagram::from_json(&diagram.to_json().unwrap()).unwrap();
    assert_eq!(round_trip, diagram);
}

#[test]
fn test_diagram_definition_reports_bad_references() {
    let missing_node = r#"{
        "nodes": [ { "name": "a", "type": "Process", "outputs": [{ "name": "out" }] } ],
        "edges": [ { "name": "e", "source": "a", "source_pin": "out",
                     "target": "ghost", "target_pin": "in" } ]
    }"#;
    let err = DiagramDefinition::from_json(missing_node)
        .unwrap()
        .into_diagram()
        .unwrap_err();
    assert!(matches!(err, ConversionError::NodeNotFound { ref missing, .. } if missing == "ghost"));

    let duplicate = r#"{ "nodes": [
        { "name": "a", "type": "Process" }, { "name": "a", "type": "Store" } ] }"#;
    let err = DiagramDefinition::from_json(duplicate)
        .unwrap()
        .into_diagram()
        .unwrap_err();
    assert!(matches!(err, ConversionError::DuplicateNode(ref name) if name == "a"));

    let bad_label = r#"{ "nodes": [ { "name": "a", "type": "Process", "labels": ["oops"] } ] }"#;
    let err = DiagramDefinition::from_json(bad_label)
        .unwrap()
        .into_diagram()
        .unwrap_err();
    assert!(matches!(err, ConversionError::Model(ModelError::InvalidLabel(_))));

    assert!(matches!(
        DiagramDefinition::from_json("not json"),
        Err(ConversionError::JsonParseError(_))
    ));
}

#[test]
fn test_assignment_inputs_must_belong_to_owner() {
    let mut diagram = Diagram::new();
    let a = diagram.add_node("a", VertexType::Process);
    let b = diagram.add_node("b", VertexType::Process);
    let a_out = diagram.add_output_pin(a, "out").unwrap();
    let b_in = diagram.add_input_pin(b, "in").unwrap();

    let err = diagram
        .push_assignment(a_out, Assignment::forward([b_in]))
        .unwrap_err();

    assert!(matches!(err, ModelError::ForeignInput { .. }));
    assert!(matches!(
        diagram.add_edge("backwards", b_in, a_out),
        Err(ModelError::PinDirection { .. })
    ));
}

struct Components(Vec<(&'static str, &'static str)>);

impl IntoDiagram for Components {
    fn into_diagram(self) -> Result<Diagram, ConversionError> {
        let mut diagram = Diagram::new();
        for (name, kind) in self.0 {
            let vertex_type = match kind {
                "external" => VertexType::External,
                "store" => VertexType::Store,
                "process" => VertexType::Process,
                other => {
                    return Err(ConversionError::ValidationError(format!(
                        "unknown component kind '{}'",
                        other
                    )));
                }
            };
            diagram.add_node(name, vertex_type);
        }
        Ok(diagram)
    }
}

#[test]
fn test_custom_format_converts_through_trait() {
    let diagram = Components(vec![("web", "process"), ("db", "store")])
        .into_diagram()
        .unwrap();
    assert_eq!(diagram.nodes().len(), 2);
    assert!(diagram.node_by_name("db").is_some());

    let err = Components(vec![("web", "cloud")]).into_diagram().unwrap_err();
    assert!(matches!(err, ConversionError::ValidationError(ref msg) if msg.contains("cloud")));
}
