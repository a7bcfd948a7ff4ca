//!
//! Mock transition models, supervisions and inputs for testing
//!
use crate::common::{BaseFloat, GraphLabel};
use crate::error::{CctcError, CctcResult};
use crate::negative::NegativeComputation;
use crate::supervision::Supervision;
use crate::transition::{GraphLabelInfo, TransitionModel};
use ndarray::{Array2, ArrayView2, ArrayViewMut2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;

///
/// Transition model given by a table of labels
///
#[derive(Debug, Clone)]
pub struct MockTransitionModel {
    num_output_indexes: usize,
    num_history_states: usize,
    labels: Vec<Option<GraphLabelInfo>>,
}

impl MockTransitionModel {
    pub fn new(
        num_output_indexes: usize,
        num_history_states: usize,
        labels: Vec<Option<GraphLabelInfo>>,
    ) -> Self {
        MockTransitionModel {
            num_output_indexes,
            num_history_states,
            labels,
        }
    }
    ///
    /// Every output from every history.
    ///
    /// label `h * num_output_indexes + o` is output `o` from history `h`,
    /// with uniform lm-prob `1 / num_output_indexes`.
    ///
    pub fn full(num_history_states: usize, num_output_indexes: usize) -> Self {
        let lm_prob = 1.0 / num_output_indexes as BaseFloat;
        let labels = (0..num_history_states)
            .flat_map(|h| (0..num_output_indexes).map(move |o| Some(GraphLabelInfo::new(o, h, lm_prob))))
            .collect();
        MockTransitionModel::new(num_output_indexes, num_history_states, labels)
    }
}

impl TransitionModel for MockTransitionModel {
    fn num_graph_labels(&self) -> usize {
        self.labels.len()
    }
    fn num_output_indexes(&self) -> usize {
        self.num_output_indexes
    }
    fn num_history_states(&self) -> usize {
        self.num_history_states
    }
    fn graph_label_info(&self, label: GraphLabel) -> Option<GraphLabelInfo> {
        self.labels.get(label).copied().flatten()
    }
}

///
/// One frame, one arc: numerator prob 0.5, denominator prob 0.25, lm-prob 1.
///
/// Returns `(trans_model, supervision, exp_nnet_output, denominators)`.
///
pub fn mock_single_arc() -> (
    MockTransitionModel,
    Supervision,
    Array2<BaseFloat>,
    Array2<BaseFloat>,
) {
    let trans = MockTransitionModel::new(2, 1, vec![Some(GraphLabelInfo::new(0, 0, 1.0))]);
    let mut s = Supervision::new(1, 1, 1);
    s.add_linear_lane(&[0]);
    let exp_nnet_output = Array2::from_elem((1, 2), 0.5);
    let denominators = Array2::from_elem((1, 1), 0.25);
    (trans, s, exp_nnet_output, denominators)
}

/// Small branching supervision of 3 frames for `MockTransitionModel::full(2, 3)`
///
/// ```text
/// frame    0        1        2
///  v0 -0-> v1 -1-> v3 -2-> v5
///  v0 -4-> v2 -3-> v3
///          v2 -5-> v4 -0-> v5
/// ```
///
/// arcs in insertion order (= EdgeIndex):
/// `v0-v1:0, v0-v2:4, v1-v3:1, v2-v3:3, v2-v4:5, v3-v5:2, v4-v5:0`
///
pub fn mock_branching() -> Supervision {
    let mut s = Supervision::new(1, 3, 6);
    let v0 = s.add_state(true, false);
    let v1 = s.add_state(false, false);
    let v2 = s.add_state(false, false);
    let v3 = s.add_state(false, false);
    let v4 = s.add_state(false, false);
    let v5 = s.add_state(false, true);
    s.add_arc(v0, v1, 0);
    s.add_arc(v0, v2, 4);
    s.add_arc(v1, v3, 1);
    s.add_arc(v2, v3, 3);
    s.add_arc(v2, v4, 5);
    s.add_arc(v3, v5, 2);
    s.add_arc(v4, v5, 0);
    s
}

///
/// Random lattice-like supervision of `num_sequences` lanes.
///
/// Each lane has one start state, `width` states at each inner frame and one
/// final state. Every state has at least one incoming and one outgoing arc,
/// and arc labels are chosen uniformly from `0..num_graph_labels`.
///
pub fn mock_random_supervision<T: TransitionModel>(
    trans_model: &T,
    num_sequences: usize,
    frames_per_sequence: usize,
    width: usize,
    seed: u64,
) -> Supervision {
    assert!(frames_per_sequence > 0 && width > 0);
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let n_labels = trans_model.num_graph_labels();
    let mut s = Supervision::new(num_sequences, frames_per_sequence, n_labels);
    for _ in 0..num_sequences {
        let mut layer = vec![s.add_state(true, false)];
        for t in 1..=frames_per_sequence {
            let next: Vec<_> = if t == frames_per_sequence {
                vec![s.add_state(false, true)]
            } else {
                (0..width).map(|_| s.add_state(false, false)).collect()
            };
            for &target in next.iter() {
                let source = layer[rng.gen_range(0..layer.len())];
                s.add_arc(source, target, rng.gen_range(0..n_labels));
            }
            for &source in layer.iter() {
                let target = next[rng.gen_range(0..next.len())];
                s.add_arc(source, target, rng.gen_range(0..n_labels));
            }
            layer = next;
        }
    }
    s
}

///
/// Random nnet output whose entries are in `[-2, 2)`
///
pub fn mock_nnet_output(n_rows: usize, n_cols: usize, seed: u64) -> Array2<BaseFloat> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    Array2::from_shape_fn((n_rows, n_cols), |_| rng.gen_range(-2.0..2.0))
}

///
/// `(exp_nnet_output, denominators)` from a random nnet output
///
pub fn mock_inputs<T: TransitionModel>(
    trans_model: &T,
    n_rows: usize,
    seed: u64,
) -> (Array2<BaseFloat>, Array2<BaseFloat>) {
    let exp_nnet_output = mock_nnet_output(n_rows, trans_model.num_output_indexes(), seed)
        .mapv(BaseFloat::exp);
    let weights = trans_model.compute_weights();
    let denominators = exp_nnet_output.dot(&weights.t());
    (exp_nnet_output, denominators)
}

///
/// Negative computation whose log-prob is
///
/// ```text
/// \sum_t log \sum_h denominators[t, h]
/// ```
///
#[derive(Debug, Clone, Default)]
pub struct MockNegative {
    n_forward: usize,
    n_backward: usize,
}

impl MockNegative {
    pub fn n_forward(&self) -> usize {
        self.n_forward
    }
    pub fn n_backward(&self) -> usize {
        self.n_backward
    }
}

impl NegativeComputation for MockNegative {
    fn forward(
        &mut self,
        _exp_nnet_output: ArrayView2<BaseFloat>,
        denominators: ArrayView2<BaseFloat>,
    ) -> CctcResult<f64> {
        self.n_forward += 1;
        Ok(denominators
            .sum_axis(Axis(1))
            .iter()
            .map(|&x| (x as f64).ln())
            .sum())
    }
    fn backward(
        &mut self,
        _exp_nnet_output: ArrayView2<BaseFloat>,
        denominators: ArrayView2<BaseFloat>,
        _exp_nnet_output_deriv: ArrayViewMut2<BaseFloat>,
        mut denominators_deriv: ArrayViewMut2<BaseFloat>,
    ) -> CctcResult<()> {
        if self.n_forward == 0 {
            return Err(CctcError::InvalidState(
                "backward was called before forward".to_string(),
            ));
        }
        self.n_backward += 1;
        let sums = denominators.sum_axis(Axis(1));
        for (mut row, &sum) in denominators_deriv.axis_iter_mut(Axis(0)).zip(sums.iter()) {
            row += 1.0 / sum;
        }
        Ok(())
    }
}
