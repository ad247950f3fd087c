//! Common test utilities: small diagrams, constraints and a concrete violation checker.
use flowmend::constraint::Selector;
use flowmend::prelude::*;
use std::collections::BTreeSet;

#[allow(dead_code)]
pub fn pii() -> Label {
    Label::new("Sensitivity", "PII")
}

#[allow(dead_code)]
pub fn secret() -> Label {
    Label::new("Sensitivity", "Secret")
}

#[allow(dead_code)]
pub fn encrypted() -> Label {
    Label::new("Stereotype", "encrypted_connection")
}

/// Handles of a two-vertex diagram `v1 --f1--> v2`.
#[allow(dead_code)]
pub struct Pair {
    pub diagram: Diagram,
    pub v1: NodeId,
    pub v2: NodeId,
    pub v1_out: PinId,
    pub v2_in: PinId,
}

/// `v1 --f1--> v2` where `v1.out` sets PII and `v2` is external.
#[allow(dead_code)]
pub fn create_pair() -> Pair {
    let mut diagram = Diagram::new();
    let v1 = diagram.add_node("v1", VertexType::Process);
    let v2 = diagram.add_node("v2", VertexType::External);
    let v1_out = diagram.add_output_pin(v1, "out").unwrap();
    let v2_in = diagram.add_input_pin(v2, "in").unwrap();
    diagram
        .push_assignment(v1_out, Assignment::set([pii()]))
        .unwrap();
    diagram.add_edge("f1", v1_out, v2_in).unwrap();
    Pair {
        diagram,
        v1,
        v2,
        v1_out,
        v2_in,
    }
}

/// Handles of the chain `v1 --f1--> v2 --f2--> v3`.
#[allow(dead_code)]
pub struct Chain {
    pub diagram: Diagram,
    pub v1_out: PinId,
    pub v2_in: PinId,
    pub v2_out: PinId,
    pub v3_in: PinId,
}

/// `v1 --f1--> v2 --f2--> v3`; `v1.out` sets PII and `v2.out` forwards its input.
#[allow(dead_code)]
pub fn create_chain() -> Chain {
    let mut diagram = Diagram::new();
    let v1 = diagram.add_node("v1", VertexType::Process);
    let v2 = diagram.add_node("v2", VertexType::Process);
    let v3 = diagram.add_node("v3", VertexType::Store);
    let v1_out = diagram.add_output_pin(v1, "out").unwrap();
    let v2_in = diagram.add_input_pin(v2, "in").unwrap();
    let v2_out = diagram.add_output_pin(v2, "out").unwrap();
    let v3_in = diagram.add_input_pin(v3, "in").unwrap();
    diagram
        .push_assignment(v1_out, Assignment::set([pii()]))
        .unwrap();
    diagram
        .push_assignment(v2_out, Assignment::forward([v2_in]))
        .unwrap();
    diagram.add_edge("f1", v1_out, v2_in).unwrap();
    diagram.add_edge("f2", v2_out, v3_in).unwrap();
    Chain {
        diagram,
        v1_out,
        v2_in,
        v2_out,
        v3_in,
    }
}

/// One PII source forwarded through two processes into two external sinks.
///
/// `src -> p1 -> ext1` and `src -> p2 -> ext2`.
#[allow(dead_code)]
pub fn create_fork() -> (Diagram, PinId) {
    let mut diagram = Diagram::new();
    let src = diagram.add_node("src", VertexType::Process);
    let src_out = diagram.add_output_pin(src, "out").unwrap();
    diagram
        .push_assignment(src_out, Assignment::set([pii()]))
        .unwrap();
    for branch in ["1", "2"] {
        let process = diagram.add_node(format!("p{}", branch), VertexType::Process);
        let p_in = diagram.add_input_pin(process, "in").unwrap();
        let p_out = diagram.add_output_pin(process, "out").unwrap();
        diagram
            .push_assignment(p_out, Assignment::forward([p_in]))
            .unwrap();
        let sink = diagram.add_node(format!("ext{}", branch), VertexType::External);
        let sink_in = diagram.add_input_pin(sink, "in").unwrap();
        diagram
            .add_edge(format!("to_p{}", branch), src_out, p_in)
            .unwrap();
        diagram
            .add_edge(format!("to_ext{}", branch), p_out, sink_in)
            .unwrap();
    }
    (diagram, src_out)
}

/// A process that derives `Secret` from PII on its input.
///
/// `src --raw--> anon --derived--> sink` where `anon.out` evaluates
/// `Secret := PII` on its input.
#[allow(dead_code)]
pub fn create_evaluating_chain() -> (Diagram, PinId) {
    let mut diagram = Diagram::new();
    let src = diagram.add_node("src", VertexType::External);
    let anon = diagram.add_node("anon", VertexType::Process);
    let sink = diagram.add_node("sink", VertexType::Store);
    let src_out = diagram.add_output_pin(src, "out").unwrap();
    let anon_in = diagram.add_input_pin(anon, "in").unwrap();
    let anon_out = diagram.add_output_pin(anon, "out").unwrap();
    let sink_in = diagram.add_input_pin(sink, "in").unwrap();
    diagram
        .push_assignment(src_out, Assignment::set([pii()]))
        .unwrap();
    diagram
        .push_assignment(
            anon_out,
            Assignment::evaluate([anon_in], Term::label(pii()), [secret()]),
        )
        .unwrap();
    diagram.add_edge("raw", src_out, anon_in).unwrap();
    diagram.add_edge("derived", anon_out, sink_in).unwrap();
    (diagram, anon_out)
}

/// "Data labeled PII never flows to an external vertex."
#[allow(dead_code)]
pub fn pii_never_external() -> Constraint {
    Constraint::builder("pii-never-external")
        .of_data()
        .with_label(pii())
        .never_flows()
        .to_vertex()
        .with_type(VertexType::External)
        .create()
}

/// "Data labeled PII never flows to the vertex named `name`."
#[allow(dead_code)]
pub fn pii_never_to(name: &str) -> Constraint {
    Constraint::builder(format!("pii-never-{}", name))
        .of_data()
        .with_label(pii())
        .never_flows()
        .to_vertex()
        .with_name(name)
        .create()
}

/// "Data labeled PII only reaches vertices with an encrypted connection."
#[allow(dead_code)]
pub fn pii_needs_encryption() -> Constraint {
    Constraint::builder("pii-needs-encryption")
        .of_data()
        .with_label(pii())
        .never_flows()
        .to_vertex()
        .without_characteristic(encrypted())
        .create()
}

/// Concrete label sets of every flow, computed without any symbolic machinery.
#[allow(dead_code)]
pub fn concrete_flow_labels(diagram: &Diagram, graph: &FlowGraph) -> Vec<BTreeSet<Label>> {
    fn labels_of(
        diagram: &Diagram,
        graph: &FlowGraph,
        flow: FlowId,
        memo: &mut Vec<Option<BTreeSet<Label>>>,
    ) -> BTreeSet<Label> {
        if let Some(done) = &memo[flow.0] {
            return done.clone();
        }
        let flow_def = graph.flow(flow).unwrap();
        let pin = diagram.pin(flow_def.src_pin).unwrap();
        let mut labels = BTreeSet::new();
        for (position, assignment) in pin.assignments.iter().enumerate() {
            match assignment {
                Assignment::Set { labels: set } => labels.extend(set.iter().cloned()),
                Assignment::Unset { labels: unset } => {
                    for label in unset {
                        labels.remove(label);
                    }
                }
                Assignment::Forward { .. } => {
                    for dep in flow_def.forwards.get(&position).into_iter().flatten() {
                        labels.extend(labels_of(diagram, graph, *dep, memo));
                    }
                }
                Assignment::Evaluate { term, labels: out, .. } => {
                    let reads: Vec<BTreeSet<Label>> = flow_def
                        .evaluates_on
                        .get(&position)
                        .into_iter()
                        .flatten()
                        .map(|dep| labels_of(diagram, graph, *dep, memo))
                        .collect();
                    let holds = eval_term(term, &reads);
                    for label in out {
                        if holds {
                            labels.insert(label.clone());
                        } else {
                            labels.remove(label);
                        }
                    }
                }
            }
        }
        memo[flow.0] = Some(labels.clone());
        labels
    }

    let mut memo = vec![None; graph.flows().len()];
    (0..graph.flows().len())
        .map(|i| labels_of(diagram, graph, FlowId(i), &mut memo))
        .collect()
}

fn eval_term(term: &Term, reads: &[BTreeSet<Label>]) -> bool {
    match term {
        Term::True => true,
        Term::Not(inner) => !eval_term(inner, reads),
        Term::And(terms) => terms.iter().all(|t| eval_term(t, reads)),
        Term::Or(terms) => terms.iter().any(|t| eval_term(t, reads)),
        Term::LabelRef(label) => reads.iter().any(|r| r.contains(label)),
    }
}

fn matches_vertex(diagram: &Diagram, graph: &FlowGraph, selector: &Selector, vertex: VertexId) -> bool {
    let node = diagram.node(graph.vertex(vertex).unwrap().node).unwrap();
    match selector {
        Selector::VertexName { name, inverted } => (node.name == *name) != *inverted,
        Selector::VertexType {
            vertex_type,
            inverted,
        } => (node.vertex_type == *vertex_type) != *inverted,
        Selector::VertexCharacteristics { label, inverted } => node.has_label(label) != *inverted,
        Selector::VertexCharacteristicsList { labels, inverted } => {
            labels.iter().any(|l| node.has_label(l)) != *inverted
        }
        other => panic!("not a vertex selector: {:?}", other),
    }
}

fn selector_holds(
    diagram: &Diagram,
    graph: &FlowGraph,
    flow_labels: &[BTreeSet<Label>],
    selector: &Selector,
    role: SelectorRole,
    vertex: VertexId,
) -> bool {
    match role {
        SelectorRole::VertexDestination => matches_vertex(diagram, graph, selector, vertex),
        SelectorRole::VertexSource => std::iter::once(vertex)
            .chain(graph.ancestors(vertex))
            .any(|v| matches_vertex(diagram, graph, selector, v)),
        SelectorRole::DataSource => {
            let incoming = graph.incoming(vertex);
            if incoming.is_empty() {
                return false;
            }
            match selector {
                Selector::DataCharacteristics { .. } | Selector::DataCharacteristicList { .. } => {
                    let any = incoming.iter().any(|f| {
                        selector
                            .labels()
                            .iter()
                            .any(|l| flow_labels[f.0].contains(l))
                    });
                    any != selector.is_inverted()
                }
                Selector::VariableName { name, inverted } => {
                    let any = incoming.iter().any(|f| {
                        let edge = graph.flow(*f).unwrap().edge;
                        diagram.edge(edge).unwrap().name == *name
                    });
                    any != *inverted
                }
                other => panic!("not a data selector: {:?}", other),
            }
        }
    }
}

/// Number of (constraint, vertex) pairs at which a constraint is violated.
#[allow(dead_code)]
pub fn count_violations(diagram: &Diagram, constraints: &[Constraint]) -> usize {
    let graph = FlowGraph::unroll(diagram).unwrap();
    let flow_labels = concrete_flow_labels(diagram, &graph);
    let mut violations = 0;
    for constraint in constraints {
        for vertex in graph.vertices() {
            let violated = constraint.selectors().all(|(selector, role)| {
                selector_holds(diagram, &graph, &flow_labels, selector, role, vertex.id)
            });
            if violated {
                violations += 1;
            }
        }
    }
    violations
}

/// Applies `actions` to a copy of `diagram`.
#[allow(dead_code)]
pub fn apply_all<'a>(diagram: &Diagram, actions: impl IntoIterator<Item = &'a RepairAction>) -> Diagram {
    let mut next = diagram.clone();
    for action in actions {
        action.apply(&mut next).unwrap();
    }
    next
}
