//! Property tests over small random acyclic diagrams.
mod common;
use common::*;
use flowmend::prelude::*;
use proptest::prelude::*;

/// How a node's output pin computes its labels.
#[derive(Debug, Clone, Copy)]
enum PinRule {
    Forward,
    SetPii,
    ForwardThenUnsetPii,
    SecretFromPii,
    SetPiiAndForward,
}

#[derive(Debug, Clone)]
struct NodeSpec {
    external: bool,
    encrypted: bool,
    rule: PinRule,
}

fn pin_rule() -> impl Strategy<Value = PinRule> {
    prop_oneof![
        Just(PinRule::Forward),
        Just(PinRule::SetPii),
        Just(PinRule::ForwardThenUnsetPii),
        Just(PinRule::SecretFromPii),
        Just(PinRule::SetPiiAndForward),
    ]
}

fn node_spec() -> impl Strategy<Value = NodeSpec> {
    (any::<bool>(), any::<bool>(), pin_rule()).prop_map(|(external, encrypted, rule)| NodeSpec {
        external,
        encrypted,
        rule,
    })
}

/// Up to five nodes; an edge `i -> j` may exist for every `i < j`.
fn diagram_strategy() -> impl Strategy<Value = Diagram> {
    (2usize..=5)
        .prop_flat_map(|n| {
            (
                proptest::collection::vec(node_spec(), n),
                proptest::collection::vec(any::<bool>(), n * (n - 1) / 2),
            )
        })
        .prop_map(|(specs, edges)| build_diagram(&specs, &edges))
}

fn build_diagram(specs: &[NodeSpec], edges: &[bool]) -> Diagram {
    let mut diagram = Diagram::new();
    let mut pins = Vec::new();
    for (i, spec) in specs.iter().enumerate() {
        let vertex_type = if spec.external {
            VertexType::External
        } else {
            VertexType::Process
        };
        let node = diagram.add_node(format!("n{}", i), vertex_type);
        if spec.encrypted {
            diagram.add_property(node, encrypted()).unwrap();
        }
        let input = diagram.add_input_pin(node, "in").unwrap();
        let output = diagram.add_output_pin(node, "out").unwrap();
        let assignments = match spec.rule {
            PinRule::Forward => vec![Assignment::forward([input])],
            PinRule::SetPii => vec![Assignment::set([pii()])],
            PinRule::ForwardThenUnsetPii => {
                vec![Assignment::forward([input]), Assignment::unset([pii()])]
            }
            PinRule::SecretFromPii => vec![
                Assignment::forward([input]),
                Assignment::evaluate([input], Term::label(pii()), [secret()]),
            ],
            PinRule::SetPiiAndForward => {
                vec![Assignment::set([pii()]), Assignment::forward([input])]
            }
        };
        for assignment in assignments {
            diagram.push_assignment(output, assignment).unwrap();
        }
        pins.push((input, output));
    }

    let mut next = 0;
    for i in 0..specs.len() {
        for j in (i + 1)..specs.len() {
            if edges[next] {
                diagram
                    .add_edge(format!("e{}_{}", i, j), pins[i].1, pins[j].0)
                    .unwrap();
            }
            next += 1;
        }
    }
    diagram
}

fn constraints() -> Vec<Constraint> {
    vec![
        pii_never_external(),
        Constraint::builder("secret-needs-encryption")
            .of_data()
            .with_label(secret())
            .never_flows()
            .to_vertex()
            .without_characteristic(encrypted())
            .create(),
    ]
}

fn solve(diagram: &Diagram, config: RepairConfig) -> RepairResult {
    let graph = FlowGraph::unroll(diagram).unwrap();
    let constraints = constraints();
    Repairer::builder(diagram, &graph, &constraints)
        .with_config(config)
        .build()
        .repair()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_dedup_does_not_change_result(diagram in diagram_strategy()) {
        let shared = solve(&diagram, RepairConfig::default());
        let plain = solve(&diagram, RepairConfig { deduplicate: false, ..RepairConfig::default() });

        prop_assert_eq!(shared.satisfiable, plain.satisfiable);
        prop_assert_eq!(shared.cost, plain.cost);
        prop_assert_eq!(shared.actions, plain.actions);
    }

    #[test]
    fn prop_repairs_remove_every_violation(diagram in diagram_strategy()) {
        let result = solve(&diagram, RepairConfig::default());

        // Every violation can be removed by unsetting or adding a node label.
        prop_assert!(result.satisfiable);
        let repaired = result.repaired.unwrap();
        prop_assert_eq!(count_violations(&repaired, &constraints()), 0);
        if count_violations(&diagram, &constraints()) == 0 {
            prop_assert!(result.actions.is_empty());
        }
    }

    #[test]
    fn prop_no_action_is_redundant(diagram in diagram_strategy()) {
        let result = solve(&diagram, RepairConfig::default());
        prop_assert!(result.satisfiable);
        prop_assert_eq!(result.cost, result.actions.len() as u64);

        for skipped in 0..result.actions.len() {
            let partial = apply_all(
                &diagram,
                result
                    .actions
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != skipped)
                    .map(|(_, a)| a),
            );
            prop_assert!(count_violations(&partial, &constraints()) > 0);
        }
    }

    #[test]
    fn prop_disabled_edit_kinds_are_never_used(diagram in diagram_strategy()) {
        let config = RepairConfig {
            add_node_labels: false,
            remove_node_labels: false,
            ..RepairConfig::default()
        };
        let result = solve(&diagram, config);

        for action in &result.actions {
            let is_pin_edit = matches!(
                action,
                RepairAction::SetAtPin { .. } | RepairAction::UnsetAtPin { .. }
            );
            prop_assert!(is_pin_edit);
        }
        if result.satisfiable {
            prop_assert_eq!(count_violations(&result.repaired.unwrap(), &constraints()), 0);
        }
    }
}
