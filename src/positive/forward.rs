//!
//! Forward algorithm on the supervision
//!
//! ```text
//! alpha[start] = 1
//! alpha[v]     = \sum_{e: u -> v} alpha[u] w(e)
//! P(lane n)    = \sum_{f: finals of lane n} alpha[f]
//! log P        = \sum_n log P(lane n)
//! ```
//!
//! where `w(e) = numerator_prob * lm_prob / denominator_prob` is the arc
//! weight. States are visited in index order, which is topological, so
//! `alpha[u]` is complete when its outgoing arcs are visited.
//!
use super::PositiveComputation;
use crate::prob::Prob;
use crate::transition::TransitionModel;
use crate::vector::NodeVec;
use log::{debug, warn};

impl<'a, T: TransitionModel> PositiveComputation<'a, T> {
    /// Fill `log_alpha`, `lane_log_probs` and `tot_log_prob`.
    pub(super) fn compute_alpha(&mut self) {
        let supervision = self.supervision;
        let mut alpha = NodeVec::new(supervision.n_states(), Prob::zero());
        for &start in self.times.starts() {
            alpha[start] = Prob::one();
        }
        for node in supervision.graph.node_indices() {
            let a = alpha[node];
            for (e, target, _) in supervision.childs(node) {
                alpha[target] += a * self.arc_logprobs[e];
            }
        }

        self.lane_log_probs = self
            .times
            .finals()
            .iter()
            .map(|finals| finals.iter().map(|&f| alpha[f]).sum::<Prob>())
            .collect();
        self.tot_log_prob = self
            .lane_log_probs
            .iter()
            .map(|p| p.to_log_value())
            .sum::<f64>();
        self.log_alpha = alpha;

        debug!(
            "forward: lanes={} tot_log_prob={}",
            self.lane_log_probs.len(),
            self.tot_log_prob
        );
        if !self.tot_log_prob.is_finite() {
            warn!(
                "forward: total log-prob of the supervision is {}",
                self.tot_log_prob
            );
        }
    }
}
