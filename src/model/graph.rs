use super::definition::{Assignment, Diagram, EdgeId, NodeId, PinId};
use crate::error::ModelError;
use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Index of a vertex instance inside a [`FlowGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VertexId(pub usize);

/// Index of a flow instance inside a [`FlowGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlowId(pub usize);

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{}", self.0)
    }
}

/// One occurrence of a diagram node in the unrolled graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub id: VertexId,
    pub node: NodeId,
    /// Vertices with a flow into this one.
    pub previous: Vec<VertexId>,
}

/// A directed edge instance between two vertex pins.
///
/// `forwards` and `evaluates_on` are keyed by the index of the assignment in the
/// source pin's assignment list and name the incoming flows of the source vertex
/// that assignment reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub id: FlowId,
    pub edge: EdgeId,
    pub src_pin: PinId,
    pub src_vertex: VertexId,
    pub dst_pin: PinId,
    pub dst_vertex: VertexId,
    pub forwards: BTreeMap<usize, Vec<FlowId>>,
    pub evaluates_on: BTreeMap<usize, Vec<FlowId>>,
}

impl Flow {
    /// Every flow this flow's label formulas depend on.
    pub fn dependencies(&self) -> impl Iterator<Item = FlowId> + '_ {
        self.forwards
            .values()
            .chain(self.evaluates_on.values())
            .flatten()
            .copied()
    }
}

/// Arena of vertices and flows. The repair engine treats it as read-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowGraph {
    vertices: Vec<Vertex>,
    flows: Vec<Flow>,
    incoming: Vec<Vec<FlowId>>,
}

impl FlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vertex(&mut self, node: NodeId) -> VertexId {
        let id = VertexId(self.vertices.len());
        self.vertices.push(Vertex {
            id,
            node,
            previous: Vec::new(),
        });
        self.incoming.push(Vec::new());
        id
    }

    /// Adds an instance of diagram edge `edge` between two vertices.
    ///
    /// The adjacency maps start empty; call [`FlowGraph::derive_adjacency`] or the
    /// `link_*` methods once all flows are in place.
    pub fn add_flow(
        &mut self,
        diagram: &Diagram,
        edge: EdgeId,
        src_vertex: VertexId,
        dst_vertex: VertexId,
    ) -> Result<FlowId, ModelError> {
        let edge_def = diagram.edge(edge)?;
        let src_node = self.vertex(src_vertex)?.node;
        let dst_node = self.vertex(dst_vertex)?.node;
        let src_pin = diagram.pin(edge_def.source)?;
        let dst_pin = diagram.pin(edge_def.target)?;
        if src_pin.node != src_node || dst_pin.node != dst_node {
            return Err(ModelError::FlowEndpoint {
                edge: edge_def.name.clone(),
                src_vertex,
                dst_vertex,
            });
        }

        let id = FlowId(self.flows.len());
        self.flows.push(Flow {
            id,
            edge,
            src_pin: edge_def.source,
            src_vertex,
            dst_pin: edge_def.target,
            dst_vertex,
            forwards: BTreeMap::new(),
            evaluates_on: BTreeMap::new(),
        });
        self.incoming[dst_vertex.0].push(id);
        let previous = &mut self.vertices[dst_vertex.0].previous;
        if !previous.contains(&src_vertex) {
            previous.push(src_vertex);
        }
        Ok(id)
    }

    /// Overrides the flows read by the `Forward` assignment at `assignment`.
    pub fn link_forwards(
        &mut self,
        flow: FlowId,
        assignment: usize,
        dependencies: Vec<FlowId>,
    ) -> Result<(), ModelError> {
        self.flow_mut(flow)?.forwards.insert(assignment, dependencies);
        Ok(())
    }

    /// Overrides the flows read by the `Evaluate` assignment at `assignment`.
    pub fn link_evaluates_on(
        &mut self,
        flow: FlowId,
        assignment: usize,
        dependencies: Vec<FlowId>,
    ) -> Result<(), ModelError> {
        self.flow_mut(flow)?.evaluates_on.insert(assignment, dependencies);
        Ok(())
    }

    /// Resolves every flow's adjacency from its source pin's assignments: an assignment
    /// reads the incoming flows of the source vertex that end at one of its input pins.
    pub fn derive_adjacency(&mut self, diagram: &Diagram) -> Result<(), ModelError> {
        for index in 0..self.flows.len() {
            let (src_pin, src_vertex) = (self.flows[index].src_pin, self.flows[index].src_vertex);
            let pin = diagram.pin(src_pin)?;
            let mut forwards = BTreeMap::new();
            let mut evaluates_on = BTreeMap::new();
            for (position, assignment) in pin.assignments.iter().enumerate() {
                let reads: Vec<FlowId> = self.incoming[src_vertex.0]
                    .iter()
                    .copied()
                    .filter(|f| assignment.inputs().contains(&self.flows[f.0].dst_pin))
                    .collect();
                match assignment {
                    Assignment::Forward { .. } => {
                        forwards.insert(position, reads);
                    }
                    Assignment::Evaluate { .. } => {
                        evaluates_on.insert(position, reads);
                    }
                    Assignment::Set { .. } | Assignment::Unset { .. } => {}
                }
            }
            let flow = &mut self.flows[index];
            flow.forwards = forwards;
            flow.evaluates_on = evaluates_on;
        }
        Ok(())
    }

    /// Unrolls a diagram into a transposed flow forest.
    ///
    /// Every sink node (no outgoing edges) becomes a root, and every path leading into
    /// it gets its own copy of the upstream vertices. Shared upstream structure is
    /// therefore duplicated, which the encoder's structural cache folds back together.
    pub fn unroll(diagram: &Diagram) -> Result<Self, ModelError> {
        check_acyclic(diagram)?;
        let mut graph = FlowGraph::new();
        for node in diagram.nodes() {
            if diagram.outgoing_edges(node.id).next().is_none() {
                graph.unroll_from(diagram, node.id)?;
            }
        }
        graph.derive_adjacency(diagram)?;
        log::debug!(
            "Unrolled {} nodes into {} vertices and {} flows",
            diagram.nodes().len(),
            graph.vertices.len(),
            graph.flows.len()
        );
        Ok(graph)
    }

    /// Copies the ancestor tree of `sink`. Vertices are created in pre-order and each
    /// flow once its source subtree is complete.
    fn unroll_from(&mut self, diagram: &Diagram, sink: NodeId) -> Result<VertexId, ModelError> {
        let root = self.add_vertex(sink);
        let mut stack = vec![UnrollFrame::new(diagram, root, sink)];
        while let Some(frame) = stack.last_mut() {
            let Some(&edge) = frame.edges.get(frame.next) else {
                let done = frame.vertex;
                stack.pop();
                if let Some(parent) = stack.last() {
                    let edge = parent.edges[parent.next - 1];
                    self.add_flow(diagram, edge, done, parent.vertex)?;
                }
                continue;
            };
            frame.next += 1;
            let source_node = diagram.pin(diagram.edge(edge)?.source)?.node;
            let source = self.add_vertex(source_node);
            stack.push(UnrollFrame::new(diagram, source, source_node));
        }
        Ok(root)
    }

    pub fn vertex(&self, id: VertexId) -> Result<&Vertex, ModelError> {
        self.vertices
            .get(id.0)
            .ok_or(ModelError::UnknownVertex(id))
    }

    pub fn flow(&self, id: FlowId) -> Result<&Flow, ModelError> {
        self.flows.get(id.0).ok_or(ModelError::UnknownFlow(id))
    }

    fn flow_mut(&mut self, id: FlowId) -> Result<&mut Flow, ModelError> {
        self.flows.get_mut(id.0).ok_or(ModelError::UnknownFlow(id))
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn flows(&self) -> &[Flow] {
        &self.flows
    }

    /// Flows ending at `vertex`, in insertion order.
    pub fn incoming(&self, vertex: VertexId) -> &[FlowId] {
        self.incoming.get(vertex.0).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All transitive predecessors of `vertex`, excluding itself, nearest first.
    pub fn ancestors(&self, vertex: VertexId) -> Vec<VertexId> {
        let mut seen = AHashSet::new();
        seen.insert(vertex);
        let mut order = Vec::new();
        let mut cursor = 0;
        let mut frontier = vec![vertex];
        while cursor < frontier.len() {
            let current = frontier[cursor];
            cursor += 1;
            if let Some(v) = self.vertices.get(current.0) {
                for &prev in &v.previous {
                    if seen.insert(prev) {
                        order.push(prev);
                        frontier.push(prev);
                    }
                }
            }
        }
        order
    }

    /// Length of the longest flow chain ending with each flow (a flow out of a source
    /// vertex has depth 1). Flows on a cycle are cut off where the cycle closes.
    pub fn flow_depths(&self) -> Vec<usize> {
        let mut depths: Vec<Option<usize>> = vec![None; self.flows.len()];
        let mut visiting = vec![false; self.flows.len()];
        for start in 0..self.flows.len() {
            if depths[start].is_some() {
                continue;
            }
            visiting[start] = true;
            // (flow, next upstream flow to visit, deepest upstream depth so far)
            let mut stack = vec![(start, 0usize, 0usize)];
            while let Some(frame) = stack.last_mut() {
                let (flow, next) = (frame.0, frame.1);
                let src = self.flows[flow].src_vertex;
                match self.incoming[src.0].get(next) {
                    Some(&FlowId(upstream)) => {
                        frame.1 += 1;
                        if let Some(depth) = depths[upstream] {
                            frame.2 = frame.2.max(depth);
                        } else if !visiting[upstream] {
                            visiting[upstream] = true;
                            stack.push((upstream, 0, 0));
                        }
                    }
                    None => {
                        let depth = frame.2 + 1;
                        depths[flow] = Some(depth);
                        visiting[flow] = false;
                        stack.pop();
                        if let Some(parent) = stack.last_mut() {
                            parent.2 = parent.2.max(depth);
                        }
                    }
                }
            }
        }
        depths.into_iter().map(|d| d.unwrap_or(0)).collect()
    }
}

struct UnrollFrame {
    vertex: VertexId,
    edges: Vec<EdgeId>,
    next: usize,
}

impl UnrollFrame {
    fn new(diagram: &Diagram, vertex: VertexId, node: NodeId) -> Self {
        Self {
            vertex,
            edges: diagram.incoming_edges(node).map(|e| e.id).collect(),
            next: 0,
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Open,
    Done,
}

/// Depth-first search over outgoing edges; reports the first node found on a cycle.
fn check_acyclic(diagram: &Diagram) -> Result<(), ModelError> {
    let successors = |node: NodeId| -> Result<Vec<NodeId>, ModelError> {
        diagram
            .outgoing_edges(node)
            .map(|e| diagram.pin(e.target).map(|p| p.node))
            .collect()
    };

    let mut marks = vec![None; diagram.nodes().len()];
    for root in diagram.nodes() {
        if marks[root.id.0].is_some() {
            continue;
        }
        marks[root.id.0] = Some(Mark::Open);
        let mut stack = vec![(root.id, successors(root.id)?, 0usize)];
        while let Some(frame) = stack.last_mut() {
            let Some(&target) = frame.1.get(frame.2) else {
                marks[frame.0.0] = Some(Mark::Done);
                stack.pop();
                continue;
            };
            frame.2 += 1;
            match marks[target.0] {
                Some(Mark::Done) => {}
                Some(Mark::Open) => {
                    return Err(ModelError::CyclicDiagram(diagram.node(target)?.name.clone()));
                }
                None => {
                    marks[target.0] = Some(Mark::Open);
                    stack.push((target, successors(target)?, 0));
                }
            }
        }
    }
    Ok(())
}
