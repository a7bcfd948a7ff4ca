//!
//! Interface to the context-dependent transition model
//!
//! The transition model knows, for each graph label on a supervision arc,
//! which neural-network output it emits, which history state it leaves from
//! and the phone-language-model probability of the transition.
//!
use crate::common::{BaseFloat, GraphLabel};
use derive_new::new;
use ndarray::Array2;

///
/// What a graph label means in the transition model.
///
#[derive(new, Debug, Clone, Copy, PartialEq)]
pub struct GraphLabelInfo {
    /// column of the neural-network output (numerator side)
    pub output_index: usize,
    /// column of the denominators (denominator side)
    pub history_state: usize,
    /// language-model probability `lm(output | history)`
    pub lm_prob: BaseFloat,
}

///
/// Context-dependent transition model.
///
/// It must not change while a computation that borrows it is alive.
///
pub trait TransitionModel {
    /// Number of distinct graph labels (`label_dim` of the supervision)
    fn num_graph_labels(&self) -> usize;
    /// Number of columns of the neural-network output
    fn num_output_indexes(&self) -> usize;
    /// Number of columns of the denominators
    fn num_history_states(&self) -> usize;
    /// `None` if the label has no mapping in this model.
    fn graph_label_info(&self, label: GraphLabel) -> Option<GraphLabelInfo>;
    ///
    /// Weights matrix of `num_history_states x num_output_indexes`, used to
    /// compute the denominators `exp(nnet_output) * weights^T`.
    ///
    /// `weights[h, o]` is the sum of the lm-probs of the labels going out of
    /// history state `h` with output `o`.
    ///
    fn compute_weights(&self) -> Array2<BaseFloat> {
        let mut weights = Array2::zeros((self.num_history_states(), self.num_output_indexes()));
        for label in 0..self.num_graph_labels() {
            if let Some(info) = self.graph_label_info(label) {
                // labels mapped out of range are reported when the lookup indexes are built
                if let Some(w) = weights.get_mut([info.history_state, info.output_index]) {
                    *w += info.lm_prob;
                }
            }
        }
        weights
    }
}
