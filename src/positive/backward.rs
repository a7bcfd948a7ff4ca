//!
//! Backward algorithm on the supervision
//!
//! ```text
//! beta[final] = 1
//! beta[u]     = \sum_{e: u -> v} w(e) beta[v]
//! ```
//!
//! Posterior of the arc `e: u -> v` in lane `n`:
//!
//! ```text
//! gamma(e) = alpha[u] w(e) beta[v] / P(lane n)
//! ```
//!
use super::PositiveComputation;
use crate::prob::Prob;
use crate::transition::TransitionModel;
use crate::vector::{EdgeVec, NodeVec};
use log::warn;

/// Relative tolerance between the forward and backward totals
pub const FORWARD_BACKWARD_TOLERANCE: f64 = 1e-5;

impl<'a, T: TransitionModel> PositiveComputation<'a, T> {
    /// Fill `log_beta`.
    pub(super) fn compute_beta(&mut self) {
        let supervision = self.supervision;
        let mut beta = NodeVec::new(supervision.n_states(), Prob::zero());
        for finals in self.times.finals() {
            for &f in finals {
                beta[f] = Prob::one();
            }
        }
        for node in supervision.graph.node_indices().rev() {
            let b: Prob = supervision
                .childs(node)
                .map(|(e, target, _)| self.arc_logprobs[e] * beta[target])
                .sum();
            // finals have no outgoing arcs
            beta[node] += b;
        }
        self.log_beta = beta;
        self.check_forward_backward();
    }
    ///
    /// `beta[start]` should be equal to `alpha` summed over the finals in
    /// each lane.
    ///
    fn check_forward_backward(&self) {
        for (lane, (&start, &forward)) in self
            .times
            .starts()
            .iter()
            .zip(self.lane_log_probs.iter())
            .enumerate()
        {
            let forward = forward.to_log_value();
            let backward = self.log_beta[start].to_log_value();
            if !forward.is_finite() || !backward.is_finite() {
                continue;
            }
            let diff = (forward - backward).abs();
            if diff > FORWARD_BACKWARD_TOLERANCE * forward.abs().max(1.0) {
                warn!(
                    "lane {}: total log-prob differs between forward ({}) and backward ({})",
                    lane, forward, backward
                );
            }
        }
    }
    ///
    /// Posterior occupation probability of each arc.
    ///
    pub(super) fn compute_arc_posteriors(&self) -> EdgeVec<f64> {
        let supervision = self.supervision;
        let mut posteriors = EdgeVec::new(supervision.n_arcs(), 0.0);
        for (e, source, target, _) in supervision.arcs() {
            let lane = self.times.time(source).lane;
            let p = self.log_alpha[source] * self.arc_logprobs[e] * self.log_beta[target]
                / self.lane_log_probs[lane];
            posteriors[e] = p.to_value();
        }
        posteriors
    }
}
