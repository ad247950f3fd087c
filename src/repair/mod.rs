//! The repair driver: encodes a diagram and its constraints, runs the optimizer and
//! turns the optimal model into concrete edits.
use crate::constraint::{Constraint, RelevantLabels};
use crate::cost::{CostFunction, change_indicator};
use crate::encoder::{DecisionFabric, EditPolarity, FlowLabels, LabelSpace, Mappings, PropagationEncoder};
use crate::error::{ModelError, RepairError, SolverError};
use crate::model::{Diagram, FlowGraph, FlowId, Label};
use crate::solver::{Context, DisplayTerm, Model, Optimizer, SatResult, TermId, Z3Optimizer};
use crate::translator::{SelectorHandler, SelectorTranslator, TranslationEnv};
use ahash::AHashMap;
use itertools::Itertools;
use rayon::prelude::*;

#[cfg(feature = "debug-tools")]
use std::fs;

mod action;
mod config;

pub use action::RepairAction;
pub use config::RepairConfig;

/// Size figures of one encoding pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodingStats {
    pub flows: usize,
    /// Flows whose formulas were derived instead of reused from the structural cache.
    pub derived_flows: usize,
    pub dedup_lookups: usize,
    pub dedup_hits: usize,
    pub decision_variables: usize,
    pub assertions: usize,
    /// Distinct terms reachable from the assertions and the objective.
    pub dag_size: usize,
}

/// Outcome of a repair request.
///
/// An infeasible request is not an error: `satisfiable` is false, there is no repaired
/// diagram and `cost` is `u64::MAX`.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairResult {
    pub satisfiable: bool,
    pub repaired: Option<Diagram>,
    pub actions: Vec<RepairAction>,
    pub cost: u64,
    pub stats: EncodingStats,
}

impl RepairResult {
    fn infeasible(stats: EncodingStats) -> Self {
        Self {
            satisfiable: false,
            repaired: None,
            actions: Vec::new(),
            cost: u64::MAX,
            stats,
        }
    }
}

/// A fully encoded repair problem, ready to hand to an [`Optimizer`].
pub struct Encoding {
    ctx: Context,
    fabric: DecisionFabric,
    flow_labels: FlowLabels,
    assertions: Vec<TermId>,
    objective: TermId,
    tie_breakers: Vec<TermId>,
    stats: EncodingStats,
}

impl Encoding {
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn fabric(&self) -> &DecisionFabric {
        &self.fabric
    }

    /// The propagated formula for `label` on `flow`, if the label is tracked.
    pub fn flow_label(&self, flow: FlowId, label: &Label) -> Option<TermId> {
        self.flow_labels.get(flow, label)
    }

    pub fn flow_labels(&self) -> &FlowLabels {
        &self.flow_labels
    }

    /// One "never violated" formula per distinct (constraint, vertex) obligation.
    pub fn assertions(&self) -> &[TermId] {
        &self.assertions
    }

    pub fn objective(&self) -> TermId {
        self.objective
    }

    /// Secondary objectives, one change indicator per free decision variable in
    /// declaration order. Minimized after the cost, they make the chosen optimum unique:
    /// pin edits win over node edits and upstream pins over downstream ones.
    pub fn tie_breakers(&self) -> &[TermId] {
        &self.tie_breakers
    }

    pub fn stats(&self) -> EncodingStats {
        self.stats
    }

    /// Asserts the encoding into `optimizer`, solves it and applies the chosen edits to
    /// a copy of `diagram`.
    pub fn solve(
        &self,
        optimizer: &mut dyn Optimizer,
        diagram: &Diagram,
    ) -> Result<RepairResult, RepairError> {
        for &assertion in &self.assertions {
            optimizer.assert(&self.ctx, assertion)?;
        }
        optimizer.minimize(&self.ctx, self.objective)?;
        for &tie_breaker in &self.tie_breakers {
            optimizer.minimize(&self.ctx, tie_breaker)?;
        }
        log::info!(
            "Solving {} assertions over {} decision variables",
            self.assertions.len(),
            self.fabric.decision_count()
        );

        match optimizer.check(&self.ctx)? {
            SatResult::Unsat => {
                log::info!("No combination of allowed edits removes every violation");
                Ok(RepairResult::infeasible(self.stats))
            }
            SatResult::Sat => {
                let model = optimizer.model().ok_or(SolverError::NoModel)?;
                let value = model.eval_int(&self.ctx, self.objective)?;
                let cost = u64::try_from(value).map_err(|_| SolverError::NegativeObjective(value))?;
                let actions = self.decode(model)?;
                let mut repaired = diagram.clone();
                for action in &actions {
                    action.apply(&mut repaired)?;
                }
                log::info!("Found repair with {} actions at cost {}", actions.len(), cost);
                Ok(RepairResult {
                    satisfiable: true,
                    repaired: Some(repaired),
                    actions,
                    cost,
                    stats: self.stats,
                })
            }
        }
    }

    /// Reads the edits out of a model: flipped node labels first, then pin sets, then
    /// pin unsets.
    pub fn decode(&self, model: &Model) -> Result<Vec<RepairAction>, RepairError> {
        let mut actions = Vec::new();
        for var in self.fabric.node_vars() {
            let before = model.eval_bool(&self.ctx, var.reference)?;
            let after = model.eval_bool(&self.ctx, var.proposed)?;
            match (before, after) {
                (false, true) => actions.push(RepairAction::AddNodeLabel {
                    node: var.node,
                    label: var.label.clone(),
                }),
                (true, false) => actions.push(RepairAction::RemoveNodeLabel {
                    node: var.node,
                    label: var.label.clone(),
                }),
                _ => {}
            }
        }
        for polarity in [EditPolarity::Set, EditPolarity::Unset] {
            for var in self.fabric.pin_vars().iter().filter(|v| v.polarity == polarity) {
                if !model.eval_bool(&self.ctx, var.proposed)? {
                    continue;
                }
                let (pin, label) = (var.pin, var.label.clone());
                actions.push(match polarity {
                    EditPolarity::Set => RepairAction::SetAtPin { pin, label },
                    EditPolarity::Unset => RepairAction::UnsetAtPin { pin, label },
                });
            }
        }
        Ok(actions)
    }
}

/// Repairs one diagram against a set of constraints.
///
/// # Example
///
/// ```
/// use flowmend::prelude::*;
///
/// let mut diagram = Diagram::new();
/// let user = diagram.add_node("user", VertexType::External);
/// let shop = diagram.add_node("shop", VertexType::Process);
/// let out = diagram.add_output_pin(user, "out").unwrap();
/// let inp = diagram.add_input_pin(shop, "in").unwrap();
/// let pii = Label::new("Sensitivity", "PII");
/// diagram.push_assignment(out, Assignment::set([pii.clone()])).unwrap();
/// diagram.add_edge("order", out, inp).unwrap();
/// let graph = FlowGraph::unroll(&diagram).unwrap();
///
/// let constraints = vec![
///     Constraint::builder("no-pii")
///         .of_data()
///         .with_label(pii.clone())
///         .never_flows()
///         .to_vertex()
///         .with_name("shop")
///         .create(),
/// ];
///
/// let result = Repairer::builder(&diagram, &graph, &constraints)
///     .build()
///     .repair()
///     .unwrap();
/// assert!(result.satisfiable);
/// assert_eq!(result.cost, 1);
/// assert_eq!(result.actions, vec![RepairAction::UnsetAtPin { pin: out, label: pii }]);
/// ```
pub struct Repairer<'a> {
    diagram: &'a Diagram,
    graph: &'a FlowGraph,
    constraints: &'a [Constraint],
    label_costs: AHashMap<Label, u32>,
    config: RepairConfig,
    translator: SelectorTranslator,
    optimizer: Box<dyn Optimizer>,
}

pub struct RepairerBuilder<'a> {
    diagram: &'a Diagram,
    graph: &'a FlowGraph,
    constraints: &'a [Constraint],
    label_costs: AHashMap<Label, u32>,
    config: RepairConfig,
    translator: SelectorTranslator,
    optimizer: Option<Box<dyn Optimizer>>,
}

impl<'a> RepairerBuilder<'a> {
    /// Per-label edit weights. Labels without an entry cost 1.
    pub fn with_label_costs(mut self, costs: impl IntoIterator<Item = (Label, u32)>) -> Self {
        self.label_costs.extend(costs);
        self
    }

    pub fn with_label_cost(mut self, label: Label, cost: u32) -> Self {
        self.label_costs.insert(label, cost);
        self
    }

    pub fn with_config(mut self, config: RepairConfig) -> Self {
        self.config = config;
        self
    }

    /// Adds a selector handler, replacing any handler registered for the same kind.
    pub fn with_handler(mut self, handler: Box<dyn SelectorHandler>) -> Self {
        if let Some(old) = self.translator.register(handler) {
            log::debug!("Replaced default handler for selector kind {}", old.kind());
        }
        self
    }

    /// Solves with `optimizer` instead of the default [`Z3Optimizer`].
    pub fn with_optimizer(mut self, optimizer: Box<dyn Optimizer>) -> Self {
        self.optimizer = Some(optimizer);
        self
    }

    pub fn build(self) -> Repairer<'a> {
        Repairer {
            diagram: self.diagram,
            graph: self.graph,
            constraints: self.constraints,
            label_costs: self.label_costs,
            config: self.config,
            translator: self.translator,
            optimizer: self
                .optimizer
                .unwrap_or_else(|| Box::new(Z3Optimizer::new())),
        }
    }
}

impl<'a> Repairer<'a> {
    pub fn builder(
        diagram: &'a Diagram,
        graph: &'a FlowGraph,
        constraints: &'a [Constraint],
    ) -> RepairerBuilder<'a> {
        RepairerBuilder {
            diagram,
            graph,
            constraints,
            label_costs: AHashMap::new(),
            config: RepairConfig::default(),
            translator: SelectorTranslator::new(),
            optimizer: None,
        }
    }

    pub fn config(&self) -> &RepairConfig {
        &self.config
    }

    fn weight(&self, label: &Label) -> u32 {
        self.label_costs.get(label).copied().unwrap_or(1)
    }

    /// Builds the full symbolic problem without solving it.
    pub fn encode(&self) -> Result<Encoding, RepairError> {
        let (diagram, graph) = (self.diagram, self.graph);
        log::info!(
            "Encoding {} constraints over {} vertices and {} flows",
            self.constraints.len(),
            graph.vertices().len(),
            graph.flows().len()
        );

        let relevant = RelevantLabels::from_constraints(self.constraints);
        let mappings = Mappings::build(diagram, &relevant);
        let mut ctx = Context::new();
        let fabric = DecisionFabric::build(&mut ctx, diagram, graph, &relevant, &self.config);
        log::debug!(
            "Declared {} node label and {} pin edit variables",
            fabric.node_vars().len(),
            fabric.pin_vars().len()
        );

        let space = LabelSpace::build(diagram, &relevant);
        let (flow_labels, propagation) =
            PropagationEncoder::new(diagram, graph, &fabric, space, self.config.deduplicate)?
                .encode_all(&mut ctx)?;
        log::debug!(
            "Propagated {} labels over {} flows ({} derived, {} of {} structural lookups hit)",
            flow_labels.space().len(),
            propagation.flows,
            propagation.derived,
            propagation.dedup.hits,
            propagation.dedup.lookups
        );

        let mut cost = CostFunction::new();
        for var in fabric.node_vars() {
            cost.add(&mut ctx, var.proposed, var.reference, self.weight(&var.label));
        }
        for var in fabric.pin_vars() {
            cost.add(&mut ctx, var.proposed, var.reference, self.weight(&var.label));
        }
        let objective = cost.build(&mut ctx);
        let decisions = fabric
            .node_vars()
            .iter()
            .map(|var| (var.proposed, var.reference))
            .chain(fabric.pin_vars().iter().map(|var| (var.proposed, var.reference)));
        let mut tie_breakers = Vec::new();
        for (proposed, reference) in decisions {
            let indicator = change_indicator(&mut ctx, proposed, reference);
            // Disabled edits fold to a constant.
            if ctx.as_int(indicator).is_none() {
                tie_breakers.push(indicator);
            }
        }

        let env = TranslationEnv {
            diagram,
            graph,
            mappings: &mappings,
            fabric: &fabric,
            flow_labels: &flow_labels,
        };
        let mut obligations = Vec::new();
        for constraint in self.constraints {
            for vertex in graph.vertices() {
                let violated = self.translator.violation(constraint, vertex.id, &env, &mut ctx)?;
                obligations.push(ctx.not(violated));
            }
        }
        // Unrolled copies of a vertex usually produce the same obligation.
        let assertions: Vec<TermId> = obligations
            .into_iter()
            .filter(|&t| ctx.as_bool(t) != Some(true))
            .unique()
            .collect();

        let mut roots = assertions.clone();
        roots.push(objective);
        let stats = EncodingStats {
            flows: propagation.flows,
            derived_flows: propagation.derived,
            dedup_lookups: propagation.dedup.lookups,
            dedup_hits: propagation.dedup.hits,
            decision_variables: fabric.decision_count(),
            assertions: assertions.len(),
            dag_size: ctx.dag_size(&roots),
        };
        log::debug!("Encoding complete: {:?}", stats);

        if log::log_enabled!(log::Level::Trace) {
            for &assertion in &assertions {
                log::trace!("Assertion:\n{}", DisplayTerm { ctx: &ctx, term: assertion });
            }
            log::trace!("Objective:\n{}", DisplayTerm { ctx: &ctx, term: objective });
        }

        #[cfg(feature = "debug-tools")]
        {
            let mut dump = String::new();
            for (index, &assertion) in assertions.iter().enumerate() {
                dump.push_str(&format!("assertion {}\n", index));
                dump.push_str(&DisplayTerm { ctx: &ctx, term: assertion }.to_string());
            }
            dump.push_str("objective\n");
            dump.push_str(&DisplayTerm { ctx: &ctx, term: objective }.to_string());
            write_debug_file("tmp/repair_encoding.txt", &dump)?;
        }

        Ok(Encoding {
            ctx,
            fabric,
            flow_labels,
            assertions,
            objective,
            tie_breakers,
            stats,
        })
    }

    /// Encodes, solves and decodes.
    pub fn repair(mut self) -> Result<RepairResult, RepairError> {
        let encoding = self.encode()?;
        encoding.solve(self.optimizer.as_mut(), self.diagram)
    }
}

#[cfg(feature = "debug-tools")]
fn write_debug_file(path: &str, content: &str) -> Result<(), RepairError> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        fs::create_dir_all(parent).map_err(|e| {
            RepairError::DebugOutput(format!("Failed to create debug directory: {}", e))
        })?;
    }
    fs::write(path, content)
        .map_err(|e| RepairError::DebugOutput(format!("Failed to write debug file: {}", e)))
}

/// Repairs with the default selector handlers and the Z3 optimizer.
pub fn repair(
    diagram: &Diagram,
    graph: &FlowGraph,
    constraints: &[Constraint],
    label_costs: &AHashMap<Label, u32>,
    config: RepairConfig,
) -> Result<RepairResult, RepairError> {
    Repairer::builder(diagram, graph, constraints)
        .with_label_costs(label_costs.iter().map(|(l, c)| (l.clone(), *c)))
        .with_config(config)
        .build()
        .repair()
}

/// A self-contained repair request for [`repair_batch`].
#[derive(Debug, Clone)]
pub struct RepairRequest {
    pub diagram: Diagram,
    pub graph: FlowGraph,
    pub constraints: Vec<Constraint>,
    pub label_costs: AHashMap<Label, u32>,
    pub config: RepairConfig,
}

impl RepairRequest {
    /// A request over the unrolled flow graph of `diagram`.
    pub fn new(diagram: Diagram, constraints: Vec<Constraint>) -> Result<Self, ModelError> {
        let graph = FlowGraph::unroll(&diagram)?;
        Ok(Self {
            diagram,
            graph,
            constraints,
            label_costs: AHashMap::new(),
            config: RepairConfig::default(),
        })
    }

    pub fn with_label_costs(mut self, costs: impl IntoIterator<Item = (Label, u32)>) -> Self {
        self.label_costs.extend(costs);
        self
    }

    pub fn with_config(mut self, config: RepairConfig) -> Self {
        self.config = config;
        self
    }
}

/// Solves independent requests in parallel, each in its own solver context.
/// Results come back in request order.
pub fn repair_batch(requests: &[RepairRequest]) -> Vec<Result<RepairResult, RepairError>> {
    log::info!("Repairing a batch of {} requests", requests.len());
    requests
        .par_iter()
        .map(|request| {
            repair(
                &request.diagram,
                &request.graph,
                &request.constraints,
                &request.label_costs,
                request.config,
            )
        })
        .collect()
}
