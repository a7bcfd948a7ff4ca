//!
//! Supervision automaton of a training example
//!
//! The automaton encodes all the label sequences allowed by the transcript.
//! Every arc consumes exactly one frame, so a state has a well-defined frame
//! (the number of arcs on any path from a start state) and the automaton is
//! acyclic.
//!
//! ## Lanes
//!
//! A merged minibatch of `num_sequences` sequences of equal length is a
//! single automaton with `num_sequences` disjoint lanes. Lane `n` is the
//! component reachable from the `n`-th start state (in state order).
//! A state of lane `n` at frame `t` reads row `t * num_sequences + n` of the
//! neural-network output.
//!
use crate::common::{BaseFloat, GraphLabel};
use crate::error::{CctcError, CctcResult};
use crate::vector::NodeVec;
use derive_new::new;
use itertools::Itertools;
use petgraph::dot::Dot;
use petgraph::graph::DiGraph;
pub use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

/// State of the supervision automaton
#[derive(new, Debug, Clone, Copy, PartialEq)]
pub struct SNode {
    pub is_start: bool,
    pub is_final: bool,
}

/// Arc of the supervision automaton
#[derive(new, Debug, Clone, Copy, PartialEq)]
pub struct SEdge {
    pub label: GraphLabel,
}

pub type SGraph = DiGraph<SNode, SEdge>;

///
/// Supervision for one (merged) training example.
///
/// `weight` is carried along for the caller; the positive computation itself
/// ignores it.
///
#[derive(Debug, Clone)]
pub struct Supervision {
    pub weight: BaseFloat,
    pub num_sequences: usize,
    pub frames_per_sequence: usize,
    /// number of graph labels of the transition model this was built for
    pub label_dim: usize,
    pub graph: SGraph,
}

impl Supervision {
    /// Empty supervision with weight 1.0
    pub fn new(num_sequences: usize, frames_per_sequence: usize, label_dim: usize) -> Self {
        Supervision {
            weight: 1.0,
            num_sequences,
            frames_per_sequence,
            label_dim,
            graph: SGraph::new(),
        }
    }
    pub fn with_weight(mut self, weight: BaseFloat) -> Self {
        self.weight = weight;
        self
    }
    ///
    /// States must be added in topological order.
    ///
    pub fn add_state(&mut self, is_start: bool, is_final: bool) -> NodeIndex {
        self.graph.add_node(SNode::new(is_start, is_final))
    }
    pub fn add_arc(&mut self, source: NodeIndex, target: NodeIndex, label: GraphLabel) -> EdgeIndex {
        self.graph.add_edge(source, target, SEdge::new(label))
    }
    ///
    /// Add a lane with a single path emitting `labels`, one per frame.
    /// Returns the start and final state of the lane.
    ///
    pub fn add_linear_lane(&mut self, labels: &[GraphLabel]) -> (NodeIndex, NodeIndex) {
        let start = self.add_state(true, labels.is_empty());
        let mut prev = start;
        for (i, &label) in labels.iter().enumerate() {
            let next = self.add_state(false, i + 1 == labels.len());
            self.add_arc(prev, next, label);
            prev = next;
        }
        (start, prev)
    }
    /// Total number of frames (rows of the nnet output) of all sequences.
    pub fn num_frames(&self) -> usize {
        self.num_sequences * self.frames_per_sequence
    }
    pub fn n_states(&self) -> usize {
        self.graph.node_count()
    }
    pub fn n_arcs(&self) -> usize {
        self.graph.edge_count()
    }
    ///
    /// Outgoing arcs of the state in ascending order of `EdgeIndex`.
    ///
    /// Item is `(EdgeIndex, NodeIndex of target, &SEdge)`.
    ///
    pub fn childs(&self, node: NodeIndex) -> impl Iterator<Item = (EdgeIndex, NodeIndex, &SEdge)> + '_ {
        self.graph
            .edges_directed(node, Direction::Outgoing)
            .map(|e| (e.id(), e.target(), e.weight()))
            .sorted_by_key(|(e, _, _)| e.index())
    }
    ///
    /// All arcs, visiting each arc of each state in state order.
    ///
    pub fn arcs(&self) -> impl Iterator<Item = (EdgeIndex, NodeIndex, NodeIndex, &SEdge)> + '_ {
        self.graph.node_indices().flat_map(move |node| {
            self.childs(node)
                .map(move |(e, target, ew)| (e, node, target, ew))
        })
    }
    ///
    /// Assign frame and lane to every state, checking that the automaton is
    /// usable for a single forward and a single backward pass.
    ///
    pub fn state_times(&self) -> CctcResult<StateTimes> {
        let n_states = self.n_states();
        if n_states == 0 {
            return Err(CctcError::InvalidAutomaton("no states".to_string()));
        }
        let mut times: NodeVec<Option<StateTime>> = NodeVec::new(n_states, None);
        let mut starts = Vec::new();

        for node in self.graph.node_indices() {
            if self.graph[node].is_start {
                if times[node].is_some() {
                    return Err(CctcError::InvalidAutomaton(format!(
                        "start state {} has an incoming arc",
                        node.index()
                    )));
                }
                times[node] = Some(StateTime::new(0, starts.len()));
                starts.push(node);
            }
            let time = times[node].ok_or_else(|| {
                CctcError::InvalidAutomaton(format!(
                    "state {} is not reachable from any start state",
                    node.index()
                ))
            })?;
            for (e, target, _) in self.childs(node) {
                if target.index() <= node.index() {
                    return Err(CctcError::InvalidAutomaton(format!(
                        "arc {} goes from state {} to state {}; states are not topologically sorted",
                        e.index(),
                        node.index(),
                        target.index()
                    )));
                }
                if time.frame >= self.frames_per_sequence {
                    return Err(CctcError::InvalidAutomaton(format!(
                        "arc {} leaves frame {} but there are only {} frames",
                        e.index(),
                        time.frame,
                        self.frames_per_sequence
                    )));
                }
                let next = StateTime::new(time.frame + 1, time.lane);
                let current = times[target];
                match current {
                    None => times[target] = Some(next),
                    Some(t) if t == next => {}
                    Some(t) => {
                        return Err(CctcError::InvalidAutomaton(format!(
                            "state {} is reached at (frame={},lane={}) and at (frame={},lane={})",
                            target.index(),
                            t.frame,
                            t.lane,
                            next.frame,
                            next.lane
                        )))
                    }
                }
            }
        }

        if starts.len() != self.num_sequences {
            return Err(CctcError::InvalidAutomaton(format!(
                "{} start states for {} sequences",
                starts.len(),
                self.num_sequences
            )));
        }

        let mut finals = vec![Vec::new(); starts.len()];
        for node in self.graph.node_indices() {
            if !self.graph[node].is_final {
                continue;
            }
            // every state has a time here
            let time = times[node].unwrap_or_default();
            if time.frame != self.frames_per_sequence {
                return Err(CctcError::InvalidAutomaton(format!(
                    "final state {} is at frame {} instead of {}",
                    node.index(),
                    time.frame,
                    self.frames_per_sequence
                )));
            }
            finals[time.lane].push(node);
        }
        if let Some(lane) = finals.iter().position(|f| f.is_empty()) {
            return Err(CctcError::InvalidAutomaton(format!(
                "lane {} has no final state",
                lane
            )));
        }

        let times = NodeVec::from_vec(times.as_slice().iter().map(|t| t.unwrap_or_default()).collect());
        Ok(StateTimes {
            num_sequences: self.num_sequences,
            times,
            starts,
            finals,
        })
    }
}

impl std::fmt::Display for SNode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match (self.is_start, self.is_final) {
            (true, true) => write!(f, "start,final"),
            (true, false) => write!(f, "start"),
            (false, true) => write!(f, "final"),
            (false, false) => write!(f, ""),
        }
    }
}

impl std::fmt::Display for SEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.label)
    }
}

impl std::fmt::Display for Supervision {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", Dot::with_config(&self.graph, &[]))
    }
}

/// Frame and lane of a state
#[derive(new, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StateTime {
    pub frame: usize,
    pub lane: usize,
}

///
/// Result of `Supervision::state_times`
///
#[derive(Debug, Clone)]
pub struct StateTimes {
    num_sequences: usize,
    times: NodeVec<StateTime>,
    starts: Vec<NodeIndex>,
    finals: Vec<Vec<NodeIndex>>,
}

impl StateTimes {
    pub fn time(&self, node: NodeIndex) -> StateTime {
        self.times[node]
    }
    /// Row of the frame-indexed matrices read by arcs leaving this state
    pub fn row(&self, node: NodeIndex) -> usize {
        let t = self.times[node];
        t.frame * self.num_sequences + t.lane
    }
    pub fn n_lanes(&self) -> usize {
        self.starts.len()
    }
    /// Start state of each lane
    pub fn starts(&self) -> &[NodeIndex] {
        &self.starts
    }
    /// Final states of each lane
    pub fn finals(&self) -> &[Vec<NodeIndex>] {
        &self.finals
    }
}
