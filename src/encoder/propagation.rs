use super::dedup::{CanonicalFlowId, ClassId, DedupStats, DependencyRef, FlowKey, StructuralCache};
use super::fabric::{DecisionFabric, EditPolarity};
use crate::constraint::RelevantLabels;
use crate::error::{ModelError, RepairError};
use crate::model::{Assignment, Diagram, Flow, FlowGraph, FlowId, Label, PinId, Term};
use crate::solver::{Context, TermId};
use ahash::{AHashMap, AHashSet};
use itertools::Itertools;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Deepest `Evaluate` term the encoder will translate.
pub const MAX_TERM_DEPTH: usize = 256;

/// The data labels tracked along flows, with dense indices.
///
/// Contains the constraint-relevant data labels followed by any further label an
/// `Evaluate` term reads, since those feed relevant labels.
#[derive(Debug, Clone, Default)]
pub struct LabelSpace {
    labels: Vec<Label>,
    index: AHashMap<Label, usize>,
}

impl LabelSpace {
    pub fn build(diagram: &Diagram, relevant: &RelevantLabels) -> Self {
        let mut referenced = Vec::new();
        for pin in diagram.output_pins() {
            for assignment in &pin.assignments {
                if let Assignment::Evaluate { term, .. } = assignment {
                    term.collect_labels(&mut referenced);
                }
            }
        }
        let labels: Vec<Label> = relevant
            .data_labels()
            .into_iter()
            .chain(referenced.into_iter().cloned())
            .unique()
            .collect();
        let index = labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.clone(), i))
            .collect();
        Self { labels, index }
    }

    pub fn index_of(&self, label: &Label) -> Option<usize> {
        self.index.get(label).copied()
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Per-flow label formulas, one entry per label of the [`LabelSpace`].
#[derive(Debug, Clone, Default)]
pub struct FlowLabels {
    formulas: Vec<Arc<[TermId]>>,
    space: LabelSpace,
}

impl FlowLabels {
    pub fn get(&self, flow: FlowId, label: &Label) -> Option<TermId> {
        let index = self.space.index_of(label)?;
        self.formulas.get(flow.0).map(|f| f[index])
    }

    /// All formulas of a flow, in label-space order.
    pub fn of_flow(&self, flow: FlowId) -> Option<&Arc<[TermId]>> {
        self.formulas.get(flow.0)
    }

    pub fn space(&self) -> &LabelSpace {
        &self.space
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropagationStats {
    pub flows: usize,
    /// Flows whose formulas were built rather than taken from the structural cache.
    pub derived: usize,
    pub dedup: DedupStats,
}

/// Builds the label formula of every flow, dependencies first.
///
/// A flow's formula for label `L` folds its source pin's assignments left to right,
/// starting from "absent": `Set`/`Unset` naming `L` force it, `Forward` ORs in the
/// dependencies' formulas, `Evaluate` naming `L` replaces it by its term. The pin's
/// proposed set is then ORed in and its proposed unset ANDed out.
pub struct PropagationEncoder<'a> {
    diagram: &'a Diagram,
    graph: &'a FlowGraph,
    fabric: &'a DecisionFabric,
    space: LabelSpace,
    formulas: Vec<Option<Arc<[TermId]>>>,
    classes: Vec<Option<ClassId>>,
    canonical: Vec<CanonicalFlowId>,
    visiting: AHashSet<FlowId>,
    cache: Option<StructuralCache>,
    derived: usize,
}

impl<'a> PropagationEncoder<'a> {
    pub fn new(
        diagram: &'a Diagram,
        graph: &'a FlowGraph,
        fabric: &'a DecisionFabric,
        space: LabelSpace,
        deduplicate: bool,
    ) -> Result<Self, RepairError> {
        let canonical = graph
            .flows()
            .iter()
            .map(|f| CanonicalFlowId::of(graph, f))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            diagram,
            graph,
            fabric,
            space,
            formulas: vec![None; graph.flows().len()],
            classes: vec![None; graph.flows().len()],
            canonical,
            visiting: AHashSet::new(),
            cache: deduplicate.then(StructuralCache::new),
            derived: 0,
        })
    }

    /// The formula telling whether `label` is present on `flow`.
    pub fn label_formula(
        &mut self,
        ctx: &mut Context,
        flow: FlowId,
        label: &Label,
    ) -> Result<TermId, RepairError> {
        let index = self
            .space
            .index_of(label)
            .ok_or_else(|| RepairError::MissingMapping {
                category: "data label",
                name: label.to_string(),
            })?;
        Ok(self.encode_flow(ctx, flow)?[index])
    }

    /// Encodes every flow and hands back the finished formulas.
    pub fn encode_all(
        mut self,
        ctx: &mut Context,
    ) -> Result<(FlowLabels, PropagationStats), RepairError> {
        for index in 0..self.graph.flows().len() {
            self.encode_flow(ctx, FlowId(index))?;
        }
        let stats = PropagationStats {
            flows: self.formulas.len(),
            derived: self.derived,
            dedup: self.cache.as_ref().map(|c| c.stats()).unwrap_or_default(),
        };
        let formulas = self
            .formulas
            .into_iter()
            .enumerate()
            .map(|(i, f)| f.ok_or(ModelError::UnknownFlow(FlowId(i))))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((
            FlowLabels {
                formulas,
                space: self.space,
            },
            stats,
        ))
    }

    /// Encodes `id` after all of its transitive dependencies, depth first on an
    /// explicit stack.
    fn encode_flow(&mut self, ctx: &mut Context, id: FlowId) -> Result<Arc<[TermId]>, RepairError> {
        let graph = self.graph;
        if !self.is_encoded(id) {
            self.enter(id)?;
            let mut stack = vec![(id, graph.flow(id)?.dependencies().collect::<Vec<_>>(), 0)];
            while let Some(frame) = stack.last_mut() {
                let Some(&dependency) = frame.1.get(frame.2) else {
                    let done = frame.0;
                    stack.pop();
                    self.finish(ctx, done)?;
                    continue;
                };
                frame.2 += 1;
                if !self.is_encoded(dependency) {
                    self.enter(dependency)?;
                    let next = graph.flow(dependency)?.dependencies().collect();
                    stack.push((dependency, next, 0));
                }
            }
        }
        self.formulas
            .get(id.0)
            .and_then(Option::as_ref)
            .map(Arc::clone)
            .ok_or(RepairError::Model(ModelError::UnknownFlow(id)))
    }

    fn is_encoded(&self, id: FlowId) -> bool {
        self.formulas.get(id.0).is_some_and(Option::is_some)
    }

    fn enter(&mut self, id: FlowId) -> Result<(), RepairError> {
        self.graph.flow(id)?;
        if !self.visiting.insert(id) {
            return Err(RepairError::StructuralCycle { flow: id });
        }
        Ok(())
    }

    /// Derives or reuses the formulas of a flow whose dependencies are all encoded.
    fn finish(&mut self, ctx: &mut Context, id: FlowId) -> Result<(), RepairError> {
        let graph = self.graph;
        let flow = graph.flow(id)?;
        let formulas: Arc<[TermId]> = if self.cache.is_some() {
            let key = self.structural_key(flow)?;
            match self.cache.as_mut().and_then(|c| c.lookup(&key)) {
                Some((class, formulas)) => {
                    self.classes[id.0] = Some(class);
                    formulas
                }
                None => {
                    let formulas: Arc<[TermId]> = self.derive(ctx, flow)?.into();
                    if let Some(cache) = self.cache.as_mut() {
                        self.classes[id.0] = Some(cache.insert(key, Arc::clone(&formulas)));
                    }
                    formulas
                }
            }
        } else {
            self.derive(ctx, flow)?.into()
        };

        self.visiting.remove(&id);
        self.formulas[id.0] = Some(formulas);
        Ok(())
    }

    fn structural_key(&self, flow: &Flow) -> Result<FlowKey, RepairError> {
        let assignments = self.diagram.pin(flow.src_pin)?.assignments.len();
        let aligned = |map: &BTreeMap<usize, Vec<FlowId>>| -> Result<Vec<Vec<DependencyRef>>, RepairError> {
            (0..assignments)
                .map(|position| {
                    let mut refs = map
                        .get(&position)
                        .into_iter()
                        .flatten()
                        .map(|d| -> Result<DependencyRef, RepairError> {
                            let class = self.classes[d.0].ok_or(ModelError::UnknownFlow(*d))?;
                            Ok((self.canonical[d.0], class))
                        })
                        .collect::<Result<Vec<_>, RepairError>>()?;
                    refs.sort_unstable();
                    refs.dedup();
                    Ok(refs)
                })
                .collect()
        };
        Ok(FlowKey {
            pin: flow.src_pin,
            forwards: aligned(&flow.forwards)?,
            evaluates: aligned(&flow.evaluates_on)?,
        })
    }

    fn formula_at(&self, flow: FlowId, index: usize) -> Result<TermId, RepairError> {
        self.formulas
            .get(flow.0)
            .and_then(Option::as_ref)
            .map(|f| f[index])
            .ok_or(RepairError::Model(ModelError::UnknownFlow(flow)))
    }

    fn derive(&mut self, ctx: &mut Context, flow: &Flow) -> Result<Vec<TermId>, RepairError> {
        self.derived += 1;
        let diagram = self.diagram;
        let pin = diagram.pin(flow.src_pin)?;
        let mut out = Vec::with_capacity(self.space.len());
        for (index, label) in self.space.labels().iter().enumerate() {
            let mut expr = ctx.ff();
            for (position, assignment) in pin.assignments.iter().enumerate() {
                match assignment {
                    Assignment::Set { labels } if labels.contains(label) => expr = ctx.tt(),
                    Assignment::Unset { labels } if labels.contains(label) => expr = ctx.ff(),
                    Assignment::Forward { .. } => {
                        let mut operands = vec![expr];
                        for &dependency in flow.forwards.get(&position).into_iter().flatten() {
                            operands.push(self.formula_at(dependency, index)?);
                        }
                        expr = ctx.or(operands);
                    }
                    Assignment::Evaluate { term, labels, .. } if labels.contains(label) => {
                        let reads = flow
                            .evaluates_on
                            .get(&position)
                            .map(Vec::as_slice)
                            .unwrap_or(&[]);
                        expr = self.term(ctx, term, reads, 1, pin.id)?;
                    }
                    _ => {}
                }
            }
            if let Some(set) = self.fabric.pin_edit(pin.id, label, EditPolarity::Set) {
                expr = ctx.or([expr, set]);
            }
            if let Some(unset) = self.fabric.pin_edit(pin.id, label, EditPolarity::Unset) {
                let kept = ctx.not(unset);
                expr = ctx.and([expr, kept]);
            }
            out.push(expr);
        }
        Ok(out)
    }

    fn term(
        &self,
        ctx: &mut Context,
        term: &Term,
        reads: &[FlowId],
        depth: usize,
        pin: PinId,
    ) -> Result<TermId, RepairError> {
        if depth > MAX_TERM_DEPTH {
            return Err(RepairError::TermDepthExceeded {
                pin,
                limit: MAX_TERM_DEPTH,
            });
        }
        match term {
            Term::True => Ok(ctx.tt()),
            Term::Not(inner) => {
                let inner = self.term(ctx, inner, reads, depth + 1, pin)?;
                Ok(ctx.not(inner))
            }
            Term::And(terms) => {
                let parts = terms
                    .iter()
                    .map(|t| self.term(ctx, t, reads, depth + 1, pin))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ctx.and(parts))
            }
            Term::Or(terms) => {
                let parts = terms
                    .iter()
                    .map(|t| self.term(ctx, t, reads, depth + 1, pin))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ctx.or(parts))
            }
            Term::LabelRef(label) => {
                let Some(index) = self.space.index_of(label) else {
                    return Ok(ctx.ff());
                };
                let matches = reads
                    .iter()
                    .map(|&f| self.formula_at(f, index))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ctx.or(matches))
            }
        }
    }
}
