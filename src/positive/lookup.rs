//!
//! Batched likelihood lookup
//!
//! The tables are filled by one gather per matrix, never by per-arc scalar
//! reads, and the arc weights are computed from the filled tables.
//!
use super::PositiveComputation;
use crate::common::{BaseFloat, MatrixIndex};
use crate::error::CctcResult;
use crate::prob::Prob;
use crate::transition::TransitionModel;
use crate::vector::EdgeVec;
use ndarray::{ArrayView2, ArrayViewMut2};
use rayon::prelude::*;

///
/// `out[i] = matrix[indexes[i]]`
///
pub fn gather(matrix: ArrayView2<BaseFloat>, indexes: &[MatrixIndex], out: &mut [BaseFloat]) {
    assert_eq!(indexes.len(), out.len());
    out.par_iter_mut()
        .zip(indexes.par_iter())
        .for_each(|(x, &(row, col))| *x = matrix[[row, col]]);
}

///
/// `matrix[indexes[i]] += values[i]`
///
/// Duplicated indexes are accumulated.
///
pub fn scatter_add(values: &[BaseFloat], indexes: &[MatrixIndex], mut matrix: ArrayViewMut2<BaseFloat>) {
    assert_eq!(indexes.len(), values.len());
    for (&x, &(row, col)) in values.iter().zip(indexes.iter()) {
        matrix[[row, col]] += x;
    }
}

impl<'a, T: TransitionModel> PositiveComputation<'a, T> {
    ///
    /// Fill the numerator/denominator tables and compute the arc weights
    ///
    /// ```text
    /// arc_logprob = log(numerator_prob) + log(lm_prob) - log(denominator_prob)
    /// ```
    ///
    pub(super) fn look_up_likelihoods(
        &mut self,
        exp_nnet_output: ArrayView2<BaseFloat>,
        denominators: ArrayView2<BaseFloat>,
    ) -> CctcResult<()> {
        {
            let (numerator_probs, denominator_probs) = self.tables.probs_mut()?;
            gather(
                exp_nnet_output,
                &self.indexes.numerator_indexes,
                numerator_probs,
            );
            gather(
                denominators,
                &self.indexes.denominator_indexes,
                denominator_probs,
            );
        }

        let (numerator_probs, denominator_probs) = self.tables.probs()?;
        let arc_logprobs: Vec<Prob> = self
            .indexes
            .arc_indexes
            .as_slice()
            .par_iter()
            .zip(self.indexes.lm_probs.as_slice().par_iter())
            .map(|(pair, &lm_prob)| {
                let num = numerator_probs[pair.numerator] as f64;
                let den = denominator_probs[pair.denominator] as f64;
                Prob::from_log_prob(num.ln() + (lm_prob as f64).ln() - den.ln())
            })
            .collect();
        self.arc_logprobs = EdgeVec::from_vec(arc_logprobs);
        Ok(())
    }
}
