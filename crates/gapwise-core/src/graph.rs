//! The stage graph: nodes, edges, and routers.
//!
//! A `StageGraph` is a directed acyclic graph over `StageName`s with a single
//! terminal node, `StageName::Logger`. Edges are either unconditional or
//! conditional; a conditional edge names its router (a pure function of the
//! case) and declares every target the router may return.
//!
//! All structural checks happen in `GraphBuilder::build`. A graph that builds
//! cannot loop and cannot strand a case away from the terminal node, so the
//! engine never has to discover misconfiguration mid-run.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

use tracing::debug;

use gapwise_contracts::{
    case::Case,
    error::{GapwiseError, GapwiseResult},
    route::{GapRoute, StageName},
};

/// A branch function: reads case fields, names the next stage.
pub type Router = fn(&Case) -> GapwiseResult<StageName>;

/// An outgoing edge of a node.
#[derive(Clone)]
pub enum Edge {
    Always(StageName),
    Conditional {
        router: Router,
        /// Every stage `router` may return.
        targets: Vec<StageName>,
    },
}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::Always(to) => f.debug_tuple("Always").field(to).finish(),
            Edge::Conditional { targets, .. } => f
                .debug_struct("Conditional")
                .field("targets", targets)
                .finish_non_exhaustive(),
        }
    }
}

impl Edge {
    fn targets(&self) -> Vec<StageName> {
        match self {
            Edge::Always(to) => vec![*to],
            Edge::Conditional { targets, .. } => targets.clone(),
        }
    }
}

// ── Routers ──────────────────────────────────────────────────────────────────

/// The branch after the Inspector.
///
/// `DROP_GAP` goes straight to the logger, `KEEP_GAP` to the Auditor, and
/// `NO_GAP_HIGH_RISK` skips the Auditor for the Risk Assessor.
pub fn route_after_inspector(case: &Case) -> GapwiseResult<StageName> {
    match case.gap_route() {
        Some(GapRoute::DropGap) => Ok(StageName::Logger),
        Some(GapRoute::KeepGap) => Ok(StageName::Auditor),
        Some(GapRoute::NoGapHighRisk) => Ok(StageName::RiskAssessor),
        None => Err(GapwiseError::StateMachineError {
            reason: "gap_route must be set before leaving the inspector".to_string(),
        }),
    }
}

// ── Graph ────────────────────────────────────────────────────────────────────

/// A validated workflow graph.
#[derive(Debug, Clone)]
pub struct StageGraph {
    entry: StageName,
    nodes: BTreeSet<StageName>,
    edges: BTreeMap<StageName, Edge>,
}

impl StageGraph {
    /// The canonical compliance graph.
    ///
    /// ```text
    /// inspector ─┬─ DROP_GAP ──────────────────────────────────────► logger
    ///            ├─ KEEP_GAP ─────────► auditor ─► risk-assessor ─┬─► logger
    ///            └─ NO_GAP_HIGH_RISK ─────────────► risk-assessor │
    ///                                        (materiality-check) ─┘
    /// ```
    ///
    /// With `materiality` set, `risk-assessor` flows through
    /// `materiality-check` before the logger.
    pub fn canonical(materiality: bool) -> GapwiseResult<Self> {
        let mut builder = GraphBuilder::new()
            .entry(StageName::Inspector)
            .node(StageName::Inspector)
            .node(StageName::Auditor)
            .node(StageName::RiskAssessor)
            .node(StageName::Logger)
            .conditional(
                StageName::Inspector,
                route_after_inspector,
                &[StageName::Logger, StageName::Auditor, StageName::RiskAssessor],
            )
            .edge(StageName::Auditor, StageName::RiskAssessor);

        builder = if materiality {
            builder
                .node(StageName::MaterialityCheck)
                .edge(StageName::RiskAssessor, StageName::MaterialityCheck)
                .edge(StageName::MaterialityCheck, StageName::Logger)
        } else {
            builder.edge(StageName::RiskAssessor, StageName::Logger)
        };

        builder.build()
    }

    pub fn entry(&self) -> StageName {
        self.entry
    }

    /// Number of declared nodes, terminal included. Also the engine's step
    /// bound.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, node: StageName) -> bool {
        self.nodes.contains(&node)
    }

    /// Declared nodes in stable order.
    pub fn nodes(&self) -> impl Iterator<Item = StageName> + '_ {
        self.nodes.iter().copied()
    }

    /// Every stage reachable in one hop from `from`.
    pub fn successors(&self, from: StageName) -> Vec<StageName> {
        self.edges.get(&from).map(Edge::targets).unwrap_or_default()
    }

    /// Select the stage after `from` for this case.
    ///
    /// # Errors
    ///
    /// `StateMachineError` if `from` is terminal, has no edge, or its router
    /// returned a stage outside the edge's declared targets.
    pub fn next(&self, from: StageName, case: &Case) -> GapwiseResult<StageName> {
        let edge = self.edges.get(&from).ok_or_else(|| GapwiseError::StateMachineError {
            reason: format!("stage '{}' has no outgoing edge", from),
        })?;

        match edge {
            Edge::Always(to) => Ok(*to),
            Edge::Conditional { router, targets } => {
                let to = router(case)?;
                if !targets.contains(&to) {
                    return Err(GapwiseError::StateMachineError {
                        reason: format!(
                            "router for '{}' returned undeclared target '{}'",
                            from, to
                        ),
                    });
                }
                debug!(from = %from, to = %to, "conditional edge taken");
                Ok(to)
            }
        }
    }
}

// ── Builder ──────────────────────────────────────────────────────────────────

/// Collects nodes and edges, then validates them into a `StageGraph`.
///
/// Builder methods never fail; problems such as a duplicate edge are recorded
/// and reported together by `build()`.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    entry: Option<StageName>,
    nodes: BTreeSet<StageName>,
    edges: BTreeMap<StageName, Edge>,
    problems: Vec<String>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(mut self, node: StageName) -> Self {
        self.entry = Some(node);
        self
    }

    pub fn node(mut self, node: StageName) -> Self {
        self.nodes.insert(node);
        self
    }

    pub fn edge(self, from: StageName, to: StageName) -> Self {
        self.add_edge(from, Edge::Always(to))
    }

    pub fn conditional(self, from: StageName, router: Router, targets: &[StageName]) -> Self {
        self.add_edge(
            from,
            Edge::Conditional {
                router,
                targets: targets.to_vec(),
            },
        )
    }

    fn add_edge(mut self, from: StageName, edge: Edge) -> Self {
        if self.edges.contains_key(&from) {
            self.problems
                .push(format!("stage '{}' declares more than one outgoing edge", from));
        } else {
            self.edges.insert(from, edge);
        }
        self
    }

    /// Validate and freeze the graph.
    ///
    /// Rejects: a missing or undeclared entry, a missing terminal node, edges
    /// touching undeclared nodes, conditional edges with no targets, outgoing
    /// edges on the terminal node, non-terminal nodes without an outgoing
    /// edge, cycles, nodes unreachable from the entry, and nodes with no path
    /// to the terminal node.
    pub fn build(self) -> GapwiseResult<StageGraph> {
        let mut problems = self.problems;

        let entry = match self.entry {
            Some(entry) if self.nodes.contains(&entry) => Some(entry),
            Some(entry) => {
                problems.push(format!("entry '{}' is not a declared node", entry));
                None
            }
            None => {
                problems.push("no entry node declared".to_string());
                None
            }
        };

        if !self.nodes.contains(&StageName::Logger) {
            problems.push("terminal node 'logger' is not declared".to_string());
        }

        for (from, edge) in &self.edges {
            if !self.nodes.contains(from) {
                problems.push(format!("edge from undeclared node '{}'", from));
            }
            let targets = edge.targets();
            if targets.is_empty() {
                problems.push(format!("conditional edge from '{}' declares no targets", from));
            }
            for to in targets {
                if !self.nodes.contains(&to) {
                    problems.push(format!("edge '{}' -> '{}' targets an undeclared node", from, to));
                }
            }
        }

        if self.edges.contains_key(&StageName::Logger) {
            problems.push("terminal node 'logger' must not have an outgoing edge".to_string());
        }
        for node in &self.nodes {
            if *node != StageName::Logger && !self.edges.contains_key(node) {
                problems.push(format!("stage '{}' has no outgoing edge", node));
            }
        }

        if !problems.is_empty() {
            return Err(misconfigured(problems));
        }

        let graph = StageGraph {
            // Checked above: entry is declared whenever `problems` is empty.
            entry: entry.unwrap_or(StageName::Inspector),
            nodes: self.nodes,
            edges: self.edges,
        };

        if let Some(cycle_at) = find_cycle(&graph) {
            return Err(misconfigured(vec![format!("cycle through stage '{}'", cycle_at)]));
        }

        let reachable = reachable_from(&graph, graph.entry);
        let reaches_logger = reaching(&graph, StageName::Logger);
        for node in &graph.nodes {
            if !reachable.contains(node) {
                problems.push(format!("stage '{}' is unreachable from '{}'", node, graph.entry));
            }
            if !reaches_logger.contains(node) {
                problems.push(format!("stage '{}' has no path to 'logger'", node));
            }
        }
        if !problems.is_empty() {
            return Err(misconfigured(problems));
        }

        debug!(nodes = graph.nodes.len(), entry = %graph.entry, "stage graph validated");
        Ok(graph)
    }
}

fn misconfigured(problems: Vec<String>) -> GapwiseError {
    GapwiseError::GraphMisconfigured {
        reason: problems.join("; "),
    }
}

/// Depth-first search with three colours. Returns a node on a cycle, if any.
fn find_cycle(graph: &StageGraph) -> Option<StageName> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        InProgress,
        Done,
    }

    fn visit(
        graph: &StageGraph,
        node: StageName,
        marks: &mut BTreeMap<StageName, Mark>,
    ) -> Option<StageName> {
        match marks.get(&node) {
            Some(Mark::InProgress) => return Some(node),
            Some(Mark::Done) => return None,
            None => {}
        }
        marks.insert(node, Mark::InProgress);
        for next in graph.successors(node) {
            if let Some(found) = visit(graph, next, marks) {
                return Some(found);
            }
        }
        marks.insert(node, Mark::Done);
        None
    }

    let mut marks = BTreeMap::new();
    graph.nodes.iter().find_map(|node| visit(graph, *node, &mut marks))
}

fn reachable_from(graph: &StageGraph, start: StageName) -> BTreeSet<StageName> {
    let mut seen = BTreeSet::from([start]);
    let mut queue = VecDeque::from([start]);
    while let Some(node) = queue.pop_front() {
        for next in graph.successors(node) {
            if seen.insert(next) {
                queue.push_back(next);
            }
        }
    }
    seen
}

/// Every node with a path to `target`, `target` included.
fn reaching(graph: &StageGraph, target: StageName) -> BTreeSet<StageName> {
    let mut seen = BTreeSet::from([target]);
    let mut changed = true;
    while changed {
        changed = false;
        for node in &graph.nodes {
            if !seen.contains(node) && graph.successors(*node).iter().any(|n| seen.contains(n)) {
                seen.insert(*node);
                changed = true;
            }
        }
    }
    seen
}
