//!
//! Interface of the negative (denominator) computation
//!
//! The negative computation gives the log-probability of all label sequences
//! under the model. It is combined with the positive computation by
//! `training::CommonComputation`, which scales it by
//! `-denominator_scale * supervision.weight`.
//!
use crate::common::BaseFloat;
use crate::error::CctcResult;
use ndarray::{ArrayView2, ArrayViewMut2};

pub trait NegativeComputation {
    ///
    /// Returns the (unscaled) log-probability.
    ///
    /// `exp_nnet_output` is `num_frames x num_output_indexes` and
    /// `denominators` is `num_frames x num_history_states`.
    ///
    fn forward(
        &mut self,
        exp_nnet_output: ArrayView2<BaseFloat>,
        denominators: ArrayView2<BaseFloat>,
    ) -> CctcResult<f64>;
    ///
    /// Adds the derivatives of the (unscaled) log-probability w.r.t.
    /// `exp_nnet_output` and `denominators` to the two output matrices.
    /// Called once, after `forward`.
    ///
    fn backward(
        &mut self,
        exp_nnet_output: ArrayView2<BaseFloat>,
        denominators: ArrayView2<BaseFloat>,
        exp_nnet_output_deriv: ArrayViewMut2<BaseFloat>,
        denominators_deriv: ArrayViewMut2<BaseFloat>,
    ) -> CctcResult<()>;
}
