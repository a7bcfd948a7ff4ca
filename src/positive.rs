//!
//! Positive (numerator) computation
//!
//! Forward-backward on the supervision automaton, with arc weights
//!
//! ```text
//! w(e) = exp_nnet_output[row, output(e)] * lm(e) / denominators[row, history(e)]
//! ```
//!
//! # Overview of calculation
//!
//! 1. `new`: lookup indexes of each arc (`indexes`)
//! 2. `forward`: batched lookup of the tables (`lookup`), then alpha (`forward`)
//! 3. `backward`: beta and the arc posteriors (`backward`), then derivatives
//!    scattered into the caller's matrices (`derivs`)
//!
//! `supervision.weight` is not applied here; the caller scales the log-prob
//! and the derivatives.
//!
pub mod backward;
pub mod derivs;
pub mod forward;
pub mod indexes;
pub mod lookup;
pub mod tables;

use crate::common::BaseFloat;
use crate::error::{CctcError, CctcResult};
use crate::prob::Prob;
use crate::supervision::{StateTimes, Supervision};
use crate::transition::TransitionModel;
use crate::vector::{EdgeVec, NodeVec};
use indexes::{ArcIndexPair, LookupIndexes};
use ndarray::{ArrayView2, ArrayViewMut2};
use tables::TableArena;

/// Which passes of a computation have been run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Constructed,
    Forwarded,
    Backwarded,
}

impl Stage {
    /// Move `Constructed -> Forwarded`
    pub fn start_forward(&mut self) -> CctcResult<()> {
        match self {
            Stage::Constructed => {
                *self = Stage::Forwarded;
                Ok(())
            }
            _ => Err(CctcError::InvalidState(
                "forward was already called".to_string(),
            )),
        }
    }
    /// Move `Forwarded -> Backwarded`
    pub fn start_backward(&mut self) -> CctcResult<()> {
        match self {
            Stage::Forwarded => {
                *self = Stage::Backwarded;
                Ok(())
            }
            Stage::Constructed => Err(CctcError::InvalidState(
                "backward was called before forward".to_string(),
            )),
            Stage::Backwarded => Err(CctcError::InvalidState(
                "backward was already called".to_string(),
            )),
        }
    }
}

pub struct PositiveComputation<'a, T: TransitionModel> {
    trans_model: &'a T,
    supervision: &'a Supervision,
    times: StateTimes,
    indexes: LookupIndexes,
    tables: TableArena,
    /// `log(numerator_prob * lm_prob / denominator_prob)` of each arc
    arc_logprobs: EdgeVec<Prob>,
    log_alpha: NodeVec<Prob>,
    log_beta: NodeVec<Prob>,
    /// total prob of each lane
    lane_log_probs: Vec<Prob>,
    tot_log_prob: f64,
    arc_posteriors: EdgeVec<f64>,
    stage: Stage,
}

impl<'a, T: TransitionModel> PositiveComputation<'a, T> {
    ///
    /// Check the supervision and build the lookup indexes.
    ///
    pub fn new(trans_model: &'a T, supervision: &'a Supervision) -> CctcResult<Self> {
        let times = supervision.state_times()?;
        let indexes = LookupIndexes::build(trans_model, supervision, &times)?;
        let tables = TableArena::new(indexes.n_numerator(), indexes.n_denominator());
        Ok(PositiveComputation {
            trans_model,
            supervision,
            times,
            indexes,
            tables,
            arc_logprobs: EdgeVec::new(0, Prob::zero()),
            log_alpha: NodeVec::new(0, Prob::zero()),
            log_beta: NodeVec::new(0, Prob::zero()),
            lane_log_probs: Vec::new(),
            tot_log_prob: f64::NEG_INFINITY,
            arc_posteriors: EdgeVec::new(0, 0.0),
            stage: Stage::Constructed,
        })
    }
    ///
    /// Forward computation. Returns the total log-prob.
    ///
    /// A non-finite log-prob is returned as it is; `backward` will then fail
    /// with `NumericInstability`.
    ///
    pub fn forward(
        &mut self,
        exp_nnet_output: ArrayView2<BaseFloat>,
        denominators: ArrayView2<BaseFloat>,
    ) -> CctcResult<f64> {
        self.check_shape("exp_nnet_output", exp_nnet_output.dim(), self.trans_model.num_output_indexes())?;
        self.check_shape("denominators", denominators.dim(), self.trans_model.num_history_states())?;
        self.stage.start_forward()?;
        self.look_up_likelihoods(exp_nnet_output, denominators)?;
        self.compute_alpha();
        Ok(self.tot_log_prob)
    }
    ///
    /// Backward computation. Adds the derivative w.r.t. `exp_nnet_output` not
    /// involving the denominators to `nnet_output_deriv`, and the derivative
    /// w.r.t. the denominators to `denominators_deriv`.
    ///
    /// The matrices are accumulated into, not overwritten, and are left
    /// untouched on error.
    ///
    pub fn backward(
        &mut self,
        nnet_output_deriv: ArrayViewMut2<BaseFloat>,
        denominators_deriv: ArrayViewMut2<BaseFloat>,
    ) -> CctcResult<()> {
        self.check_shape("nnet_output_deriv", nnet_output_deriv.dim(), self.trans_model.num_output_indexes())?;
        self.check_shape("denominators_deriv", denominators_deriv.dim(), self.trans_model.num_history_states())?;
        self.stage.start_backward()?;
        self.compute_beta();
        if !self.tot_log_prob.is_finite() {
            return Err(CctcError::NumericInstability(format!(
                "total log-prob of the supervision is {}",
                self.tot_log_prob
            )));
        }
        self.compute_derivatives(nnet_output_deriv, denominators_deriv)
    }
    fn check_shape(&self, what: &str, dim: (usize, usize), n_cols: usize) -> CctcResult<()> {
        let expected = (self.supervision.num_frames(), n_cols);
        if dim != expected {
            Err(CctcError::shape(what, expected, dim))
        } else {
            Ok(())
        }
    }
}

/// Accessors
impl<'a, T: TransitionModel> PositiveComputation<'a, T> {
    pub fn stage(&self) -> Stage {
        self.stage
    }
    /// Index pair of each arc
    pub fn arc_index_pairs(&self) -> &EdgeVec<ArcIndexPair> {
        &self.indexes.arc_indexes
    }
    pub fn lookup_indexes(&self) -> &LookupIndexes {
        &self.indexes
    }
    /// Available after `forward`
    pub fn arc_logprobs(&self) -> &EdgeVec<Prob> {
        &self.arc_logprobs
    }
    /// Available after `forward`
    pub fn log_alpha(&self) -> &NodeVec<Prob> {
        &self.log_alpha
    }
    /// Available after `backward`
    pub fn log_beta(&self) -> &NodeVec<Prob> {
        &self.log_beta
    }
    /// Total prob of each lane, available after `forward`
    pub fn lane_log_probs(&self) -> &[Prob] {
        &self.lane_log_probs
    }
    pub fn tot_log_prob(&self) -> f64 {
        self.tot_log_prob
    }
    /// Available after a successful `backward`
    pub fn arc_posteriors(&self) -> &EdgeVec<f64> {
        &self.arc_posteriors
    }
    pub fn state_times(&self) -> &StateTimes {
        &self.times
    }
    /// Looked-up probabilities, until `backward` overwrites them
    pub fn table_probs(&self) -> CctcResult<(&[BaseFloat], &[BaseFloat])> {
        self.tables.probs()
    }
    /// Derivatives w.r.t. the table entries, after `backward`
    pub fn table_derivs(&self) -> CctcResult<(&[BaseFloat], &[BaseFloat])> {
        self.tables.derivs()
    }
}
