//!
//! Objective function and its derivative for one training example
//!
//! `CommonComputation` does the parts shared by the positive and negative
//! computations: the exponentiated nnet output, the denominators
//!
//! ```text
//! denominators = exp(nnet_output) * weights^T
//! ```
//!
//! and the combination of both log-probs and both derivatives.
//!
//! ```text
//! objf = weight * (log P_positive - denominator_scale * log P_negative)
//!
//! d objf / d nnet_output
//!   = exp(nnet_output) .* (d objf / d exp(nnet_output)
//!                          + (d objf / d denominators) * weights)
//! ```
//!
use crate::common::BaseFloat;
use crate::error::{CctcError, CctcResult};
use crate::negative::NegativeComputation;
use crate::options::TrainingOptions;
use crate::positive::{PositiveComputation, Stage};
use crate::supervision::Supervision;
use crate::transition::TransitionModel;
use derive_new::new;
use log::{debug, warn};
use ndarray::{Array2, ArrayView2, ArrayViewMut2};

///
/// Objective function of an example, in parts.
///
/// `positive + negative` is the objective (already multiplied by
/// `supervision.weight`) and `denominator` is `weight * num_frames`, used to
/// report the per-frame objective.
///
#[derive(new, Debug, Clone, Copy, PartialEq, Default)]
pub struct ObjfParts {
    pub positive: f64,
    pub negative: f64,
    pub denominator: f64,
}

impl ObjfParts {
    pub fn total(&self) -> f64 {
        self.positive + self.negative
    }
    pub fn per_frame(&self) -> f64 {
        self.total() / self.denominator
    }
}

/// Sum the parts over examples
impl std::ops::AddAssign for ObjfParts {
    fn add_assign(&mut self, other: Self) {
        self.positive += other.positive;
        self.negative += other.negative;
        self.denominator += other.denominator;
    }
}

impl std::fmt::Display for ObjfParts {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "objf={:.6} (positive={:.6} negative={:.6}) over {} frames",
            self.per_frame(),
            self.positive,
            self.negative,
            self.denominator
        )
    }
}

pub struct CommonComputation<'a, T: TransitionModel, N: NegativeComputation> {
    opts: &'a TrainingOptions,
    /// `num_history_states x num_output_indexes`
    weights: ArrayView2<'a, BaseFloat>,
    supervision: &'a Supervision,
    exp_nnet_output: Array2<BaseFloat>,
    /// `num_frames x num_history_states`
    denominators: Array2<BaseFloat>,
    positive: PositiveComputation<'a, T>,
    negative: N,
    stage: Stage,
}

impl<'a, T: TransitionModel, N: NegativeComputation> CommonComputation<'a, T, N> {
    ///
    /// `weights` should be the output of `trans_model.compute_weights()`.
    ///
    /// `num_sequences` is the number of sequences merged in the supervision;
    /// it comes from the caller since the nnet output does not store it.
    ///
    pub fn new(
        opts: &'a TrainingOptions,
        trans_model: &'a T,
        weights: ArrayView2<'a, BaseFloat>,
        supervision: &'a Supervision,
        num_sequences: usize,
        nnet_output: ArrayView2<BaseFloat>,
        negative: N,
    ) -> CctcResult<Self> {
        check_dims(trans_model, weights, supervision, num_sequences, nnet_output)?;
        let exp_nnet_output = nnet_output.mapv(BaseFloat::exp);
        let denominators = exp_nnet_output.dot(&weights.t());
        let positive = PositiveComputation::new(trans_model, supervision)?;
        Ok(CommonComputation {
            opts,
            weights,
            supervision,
            exp_nnet_output,
            denominators,
            positive,
            negative,
            stage: Stage::Constructed,
        })
    }
    ///
    /// Forward part of the computation
    ///
    /// A non-finite objective is `NumericInstability`, so that it never
    /// reaches the sum over examples.
    ///
    pub fn forward(&mut self) -> CctcResult<ObjfParts> {
        self.stage.start_forward()?;
        let weight = self.supervision.weight as f64;
        let scale = self.opts.denominator_scale as f64;

        let positive_logprob = self
            .positive
            .forward(self.exp_nnet_output.view(), self.denominators.view())?;
        let negative = if scale == 0.0 {
            0.0
        } else {
            let negative_logprob = self
                .negative
                .forward(self.exp_nnet_output.view(), self.denominators.view())?;
            -scale * weight * negative_logprob
        };

        let parts = ObjfParts::new(
            weight * positive_logprob,
            negative,
            weight * self.supervision.num_frames() as f64,
        );
        debug!("{}", parts);
        if !parts.total().is_finite() {
            warn!("objective function is not finite: {}", parts);
            return Err(CctcError::NumericInstability(format!(
                "objective function is not finite: {}",
                parts
            )));
        }
        Ok(parts)
    }
    ///
    /// Backward part of the computation. Adds the derivative of the objective
    /// w.r.t. the nnet output to `nnet_output_deriv`.
    ///
    /// On error, `nnet_output_deriv` is not modified.
    ///
    pub fn backward(&mut self, mut nnet_output_deriv: ArrayViewMut2<BaseFloat>) -> CctcResult<()> {
        let dim = self.exp_nnet_output.dim();
        if nnet_output_deriv.dim() != dim {
            return Err(CctcError::shape("nnet_output_deriv", dim, nnet_output_deriv.dim()));
        }
        self.stage.start_backward()?;
        let weight = self.supervision.weight;
        let scale = self.opts.denominator_scale;

        // d objf / d exp(nnet_output), the direct part
        let mut exp_nnet_output_deriv = Array2::zeros(dim);
        // d objf / d denominators
        let mut denominators_deriv = Array2::zeros(self.denominators.dim());
        self.positive
            .backward(exp_nnet_output_deriv.view_mut(), denominators_deriv.view_mut())?;
        exp_nnet_output_deriv *= weight;
        denominators_deriv *= weight;

        if scale != 0.0 {
            let mut negative_exp_deriv = Array2::zeros(dim);
            let mut negative_denominators_deriv = Array2::zeros(self.denominators.dim());
            self.negative.backward(
                self.exp_nnet_output.view(),
                self.denominators.view(),
                negative_exp_deriv.view_mut(),
                negative_denominators_deriv.view_mut(),
            )?;
            exp_nnet_output_deriv.scaled_add(-scale * weight, &negative_exp_deriv);
            denominators_deriv.scaled_add(-scale * weight, &negative_denominators_deriv);
        }

        // through the denominators = exp(nnet_output) * weights^T
        exp_nnet_output_deriv += &denominators_deriv.dot(&self.weights);
        // through the exp
        exp_nnet_output_deriv *= &self.exp_nnet_output;

        let n_bad = exp_nnet_output_deriv
            .iter()
            .filter(|x| !x.is_finite())
            .count();
        if n_bad > 0 {
            return Err(CctcError::NumericInstability(format!(
                "{} of {} derivatives w.r.t. the nnet output are NaN or Inf",
                n_bad,
                exp_nnet_output_deriv.len()
            )));
        }
        nnet_output_deriv += &exp_nnet_output_deriv;
        Ok(())
    }
}

/// Accessors
impl<'a, T: TransitionModel, N: NegativeComputation> CommonComputation<'a, T, N> {
    pub fn exp_nnet_output(&self) -> &Array2<BaseFloat> {
        &self.exp_nnet_output
    }
    pub fn denominators(&self) -> &Array2<BaseFloat> {
        &self.denominators
    }
    pub fn positive(&self) -> &PositiveComputation<'a, T> {
        &self.positive
    }
    pub fn negative(&self) -> &N {
        &self.negative
    }
}

fn check_dims<T: TransitionModel>(
    trans_model: &T,
    weights: ArrayView2<BaseFloat>,
    supervision: &Supervision,
    num_sequences: usize,
    nnet_output: ArrayView2<BaseFloat>,
) -> CctcResult<()> {
    if num_sequences == 0 || num_sequences != supervision.num_sequences {
        return Err(CctcError::DimensionMismatch(format!(
            "num_sequences={} but the supervision has {} sequences",
            num_sequences, supervision.num_sequences
        )));
    }
    if supervision.label_dim != trans_model.num_graph_labels() {
        return Err(CctcError::DimensionMismatch(format!(
            "supervision label_dim={} but the transition model has {} graph labels",
            supervision.label_dim,
            trans_model.num_graph_labels()
        )));
    }
    let expected = (supervision.num_frames(), trans_model.num_output_indexes());
    if nnet_output.dim() != expected {
        return Err(CctcError::shape("nnet_output", expected, nnet_output.dim()));
    }
    let expected = (
        trans_model.num_history_states(),
        trans_model.num_output_indexes(),
    );
    if weights.dim() != expected {
        return Err(CctcError::shape("weights", expected, weights.dim()));
    }
    Ok(())
}

///
/// Compute the objective of an example and, if `nnet_output_deriv` is given,
/// add its derivative w.r.t. the nnet output.
///
#[allow(clippy::too_many_arguments)]
pub fn compute_objf_and_deriv<'a, T: TransitionModel, N: NegativeComputation>(
    opts: &'a TrainingOptions,
    trans_model: &'a T,
    weights: ArrayView2<'a, BaseFloat>,
    supervision: &'a Supervision,
    num_sequences: usize,
    nnet_output: ArrayView2<BaseFloat>,
    negative: N,
    nnet_output_deriv: Option<ArrayViewMut2<BaseFloat>>,
) -> CctcResult<ObjfParts> {
    let mut computation = CommonComputation::new(
        opts,
        trans_model,
        weights,
        supervision,
        num_sequences,
        nnet_output,
        negative,
    )?;
    let parts = computation.forward()?;
    if let Some(deriv) = nnet_output_deriv {
        computation.backward(deriv)?;
    }
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::*;
    use crate::transition::GraphLabelInfo;
    use test_case::test_case;

    fn objf(
        opts: &TrainingOptions,
        trans: &MockTransitionModel,
        s: &Supervision,
        nnet_output: ArrayView2<BaseFloat>,
        deriv: Option<ArrayViewMut2<BaseFloat>>,
    ) -> ObjfParts {
        let weights = trans.compute_weights();
        compute_objf_and_deriv(
            opts,
            trans,
            weights.view(),
            s,
            s.num_sequences,
            nnet_output,
            MockNegative::default(),
            deriv,
        )
        .unwrap()
    }

    fn construct<'a>(
        opts: &'a TrainingOptions,
        trans: &'a MockTransitionModel,
        weights: ArrayView2<'a, BaseFloat>,
        s: &'a Supervision,
        num_sequences: usize,
        nnet_output: ArrayView2<'a, BaseFloat>,
    ) -> CctcResult<()> {
        CommonComputation::new(
            opts,
            trans,
            weights,
            s,
            num_sequences,
            nnet_output,
            MockNegative::default(),
        )
        .map(|_| ())
    }

    #[test]
    fn objf_parts() {
        let mut a = ObjfParts::new(-2.0, 1.0, 4.0);
        assert_eq!(a.total(), -1.0);
        assert_eq!(a.per_frame(), -0.25);
        a += ObjfParts::new(-1.0, 0.5, 2.0);
        assert_eq!(a, ObjfParts::new(-3.0, 1.5, 6.0));
        println!("{}", a);
    }
    #[test]
    fn denominators_are_projected() {
        let trans = MockTransitionModel::full(2, 3);
        let weights = trans.compute_weights();
        let s = mock_branching();
        let nnet_output = mock_nnet_output(s.num_frames(), 3, 0);
        let opts = TrainingOptions::default();
        let c = CommonComputation::new(
            &opts,
            &trans,
            weights.view(),
            &s,
            1,
            nnet_output.view(),
            MockNegative::default(),
        )
        .unwrap();
        for t in 0..s.num_frames() {
            let sum: BaseFloat = (0..3).map(|o| nnet_output[[t, o]].exp()).sum();
            for h in 0..2 {
                assert_relative_eq!(c.denominators()[[t, h]], sum / 3.0, max_relative = 1e-5);
            }
            assert_relative_eq!(
                c.exp_nnet_output()[[t, 1]],
                nnet_output[[t, 1]].exp(),
                max_relative = 1e-6
            );
        }
    }
    #[test]
    fn dimensions_are_checked() {
        let trans = MockTransitionModel::full(2, 3);
        let weights = trans.compute_weights();
        let s = mock_branching();
        let opts = TrainingOptions::default();
        let nnet_output = mock_nnet_output(s.num_frames(), 3, 0);

        let is_mismatch = |r: CctcResult<()>| matches!(r, Err(CctcError::DimensionMismatch(_)));
        let w = weights.view();
        let x = nnet_output.view();
        assert!(construct(&opts, &trans, w, &s, 1, x).is_ok());
        // nnet output with wrong number of frames or columns
        let short = mock_nnet_output(2, 3, 0);
        assert!(is_mismatch(construct(&opts, &trans, w, &s, 1, short.view())));
        let narrow = mock_nnet_output(3, 2, 0);
        assert!(is_mismatch(construct(&opts, &trans, w, &s, 1, narrow.view())));
        // transposed weights
        let wt = weights.t().to_owned();
        assert!(is_mismatch(construct(&opts, &trans, wt.view(), &s, 1, x)));
        // num_sequences
        assert!(is_mismatch(construct(&opts, &trans, w, &s, 2, x)));
        assert!(is_mismatch(construct(&opts, &trans, w, &s, 0, x)));
        // label_dim
        let mut s2 = mock_branching();
        s2.label_dim = 5;
        assert!(is_mismatch(construct(&opts, &trans, w, &s2, 1, x)));
    }
    #[test]
    fn backward_requires_forward() {
        let trans = MockTransitionModel::full(2, 3);
        let weights = trans.compute_weights();
        let s = mock_branching();
        let opts = TrainingOptions::default();
        let nnet_output = mock_nnet_output(s.num_frames(), 3, 0);
        let mut deriv = Array2::zeros(nnet_output.dim());
        let mut c = CommonComputation::new(
            &opts,
            &trans,
            weights.view(),
            &s,
            1,
            nnet_output.view(),
            MockNegative::default(),
        )
        .unwrap();
        let r = c.backward(deriv.view_mut());
        assert!(matches!(r, Err(CctcError::InvalidState(_))));
        c.forward().unwrap();
        assert!(matches!(c.forward(), Err(CctcError::InvalidState(_))));
        // wrong shape of the derivative
        let mut wrong = Array2::zeros((3, 2));
        let r = c.backward(wrong.view_mut());
        assert!(matches!(r, Err(CctcError::DimensionMismatch(_))));
        c.backward(deriv.view_mut()).unwrap();
        assert_eq!(c.negative().n_forward(), 1);
        assert_eq!(c.negative().n_backward(), 1);
    }
    #[test_case(0.0 ; "positive only")]
    #[test_case(1.0 ; "full negative")]
    #[test_case(0.5 ; "half negative")]
    fn derivative_matches_finite_difference(scale: BaseFloat) {
        let opts = TrainingOptions::new(scale);
        let trans = MockTransitionModel::full(2, 3);
        let s = mock_branching().with_weight(0.7);
        let nnet_output = mock_nnet_output(s.num_frames(), 3, 11);
        let mut deriv = Array2::zeros(nnet_output.dim());
        objf(&opts, &trans, &s, nnet_output.view(), Some(deriv.view_mut()));

        let eps = 1e-3;
        for t in 0..s.num_frames() {
            for o in 0..3 {
                let mut plus = nnet_output.clone();
                plus[[t, o]] += eps;
                let mut minus = nnet_output.clone();
                minus[[t, o]] -= eps;
                let f_plus = objf(&opts, &trans, &s, plus.view(), None).total();
                let f_minus = objf(&opts, &trans, &s, minus.view(), None).total();
                let numeric = (f_plus - f_minus) / (2.0 * eps as f64);
                assert_abs_diff_eq!(numeric, deriv[[t, o]] as f64, epsilon = 2e-3);
            }
        }
    }
    #[test]
    fn zero_scale_skips_negative() {
        let opts = TrainingOptions::new(0.0);
        let trans = MockTransitionModel::full(2, 3);
        let weights = trans.compute_weights();
        let s = mock_branching();
        let nnet_output = mock_nnet_output(s.num_frames(), 3, 2);
        let mut deriv = Array2::zeros(nnet_output.dim());
        let mut c = CommonComputation::new(
            &opts,
            &trans,
            weights.view(),
            &s,
            1,
            nnet_output.view(),
            MockNegative::default(),
        )
        .unwrap();
        let parts = c.forward().unwrap();
        c.backward(deriv.view_mut()).unwrap();
        assert_eq!(parts.negative, 0.0);
        assert_eq!(parts.total(), parts.positive);
        assert_abs_diff_eq!(parts.positive, c.positive().tot_log_prob(), epsilon = 1e-12);
        assert_eq!(c.negative().n_forward(), 0);
        assert_eq!(c.negative().n_backward(), 0);

        // derivative from the positive computation alone
        let mut pc = PositiveComputation::new(&trans, &s).unwrap();
        pc.forward(c.exp_nnet_output().view(), c.denominators().view())
            .unwrap();
        let mut direct = Array2::zeros(nnet_output.dim());
        let mut den_deriv = Array2::zeros(c.denominators().dim());
        pc.backward(direct.view_mut(), den_deriv.view_mut()).unwrap();
        let expected = (direct + den_deriv.dot(&weights)) * c.exp_nnet_output();
        for (a, b) in deriv.iter().zip(expected.iter()) {
            assert_relative_eq!(*a, *b, max_relative = 1e-5, epsilon = 1e-6);
        }

        // with a non-zero scale the negative term changes the derivative
        let mut deriv_full = Array2::zeros(nnet_output.dim());
        objf(
            &TrainingOptions::new(1.0),
            &trans,
            &s,
            nnet_output.view(),
            Some(deriv_full.view_mut()),
        );
        assert!(deriv
            .iter()
            .zip(deriv_full.iter())
            .any(|(a, b)| (a - b).abs() > 1e-3));
    }
    #[test]
    fn supervision_weight_scales_everything() {
        let opts = TrainingOptions::default();
        let trans = MockTransitionModel::full(2, 3);
        let s1 = mock_branching();
        let s2 = mock_branching().with_weight(2.5);
        let nnet_output = mock_nnet_output(s1.num_frames(), 3, 5);

        let mut d1 = Array2::zeros(nnet_output.dim());
        let mut d2 = Array2::zeros(nnet_output.dim());
        let p1 = objf(&opts, &trans, &s1, nnet_output.view(), Some(d1.view_mut()));
        let p2 = objf(&opts, &trans, &s2, nnet_output.view(), Some(d2.view_mut()));
        assert_relative_eq!(p2.positive, 2.5 * p1.positive, max_relative = 1e-9);
        assert_relative_eq!(p2.negative, 2.5 * p1.negative, max_relative = 1e-9);
        assert_relative_eq!(p2.denominator, 7.5);
        assert_relative_eq!(p1.per_frame(), p2.per_frame(), max_relative = 1e-9);
        for (a, b) in d1.iter().zip(d2.iter()) {
            assert_relative_eq!(2.5 * a, *b, max_relative = 1e-4, epsilon = 1e-6);
        }
    }
    #[test]
    fn derivative_is_accumulated() {
        let opts = TrainingOptions::default();
        let trans = MockTransitionModel::full(2, 3);
        let s = mock_branching();
        let nnet_output = mock_nnet_output(s.num_frames(), 3, 8);
        let mut d0 = Array2::zeros(nnet_output.dim());
        objf(&opts, &trans, &s, nnet_output.view(), Some(d0.view_mut()));
        let mut d1 = Array2::from_elem(nnet_output.dim(), 1.0);
        objf(&opts, &trans, &s, nnet_output.view(), Some(d1.view_mut()));
        for (a, b) in d0.iter().zip(d1.iter()) {
            assert_abs_diff_eq!(a + 1.0, *b, epsilon = 1e-6);
        }
    }
    #[test]
    fn unreachable_final_leaves_deriv_untouched() {
        // label 1 has lm-prob zero, so the supervision has prob zero
        let trans = MockTransitionModel::new(
            2,
            1,
            vec![
                Some(GraphLabelInfo::new(0, 0, 1.0)),
                Some(GraphLabelInfo::new(1, 0, 0.0)),
            ],
        );
        let weights = trans.compute_weights();
        let mut s = Supervision::new(1, 2, 2);
        s.add_linear_lane(&[0, 1]);
        let opts = TrainingOptions::default();
        let nnet_output = Array2::zeros((2, 2));
        let mut deriv = Array2::from_elem((2, 2), 3.0);
        let r = compute_objf_and_deriv(
            &opts,
            &trans,
            weights.view(),
            &s,
            1,
            nnet_output.view(),
            MockNegative::default(),
            Some(deriv.view_mut()),
        );
        assert!(matches!(r, Err(CctcError::NumericInstability(_))));
        assert!(deriv.iter().all(|&x| x == 3.0));
    }
    #[test]
    fn non_finite_objective_is_not_summed() {
        // label 1 has lm-prob zero, so the second supervision has prob zero
        let trans = MockTransitionModel::new(
            2,
            1,
            vec![
                Some(GraphLabelInfo::new(0, 0, 1.0)),
                Some(GraphLabelInfo::new(1, 0, 0.0)),
            ],
        );
        let weights = trans.compute_weights();
        let mut good = Supervision::new(1, 2, 2);
        good.add_linear_lane(&[0, 0]);
        let mut bad = Supervision::new(1, 2, 2);
        bad.add_linear_lane(&[0, 1]);
        let opts = TrainingOptions::default();
        let nnet_output = mock_nnet_output(2, 2, 3);

        let mut total = ObjfParts::default();
        let mut n_failed = 0;
        for s in [&good, &bad, &good] {
            // evaluation only, no derivative
            let r = compute_objf_and_deriv(
                &opts,
                &trans,
                weights.view(),
                s,
                1,
                nnet_output.view(),
                MockNegative::default(),
                None,
            );
            match r {
                Ok(parts) => total += parts,
                Err(e) => {
                    assert!(matches!(e, CctcError::NumericInstability(_)));
                    assert!(e.is_recoverable());
                    n_failed += 1;
                }
            }
        }
        assert_eq!(n_failed, 1);
        assert!(total.total().is_finite());
        assert_eq!(total.denominator, 4.0);
        let single = objf(&opts, &trans, &good, nnet_output.view(), None);
        assert_relative_eq!(total.total(), 2.0 * single.total(), max_relative = 1e-9);
    }
}
