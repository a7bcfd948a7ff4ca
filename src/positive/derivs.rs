//!
//! Derivatives of the log-prob w.r.t. the looked-up probabilities
//!
//! For the arc `e` with index pair `(i, j)` and posterior `gamma(e)`,
//!
//! ```text
//! d log P / d numerator_prob[i]   += gamma(e) / numerator_prob[i]
//! d log P / d denominator_prob[j] -= gamma(e) / denominator_prob[j]
//! ```
//!
//! and the table derivatives are scatter-added into the matrices at the
//! coordinates the tables were gathered from.
//!
use super::lookup::scatter_add;
use super::PositiveComputation;
use crate::common::BaseFloat;
use crate::error::{CctcError, CctcResult};
use crate::transition::TransitionModel;
use ndarray::ArrayViewMut2;

impl<'a, T: TransitionModel> PositiveComputation<'a, T> {
    ///
    /// Nothing is added to the matrices if a derivative is NaN or Inf.
    ///
    pub(super) fn compute_derivatives(
        &mut self,
        nnet_output_deriv: ArrayViewMut2<BaseFloat>,
        denominators_deriv: ArrayViewMut2<BaseFloat>,
    ) -> CctcResult<()> {
        let posteriors = self.compute_arc_posteriors();
        let mut numerator_occupancy = vec![0.0; self.indexes.n_numerator()];
        let mut denominator_occupancy = vec![0.0; self.indexes.n_denominator()];
        for (e, pair) in self.indexes.arc_indexes.iter() {
            numerator_occupancy[pair.numerator] += posteriors[e];
            denominator_occupancy[pair.denominator] += posteriors[e];
        }
        self.arc_posteriors = posteriors;

        self.tables
            .convert_to_derivs(&numerator_occupancy, &denominator_occupancy)?;
        let (numerator_derivs, denominator_derivs) = self.tables.derivs()?;
        check_finite("numerator", numerator_derivs)?;
        check_finite("denominator", denominator_derivs)?;

        scatter_add(
            numerator_derivs,
            &self.indexes.numerator_indexes,
            nnet_output_deriv,
        );
        scatter_add(
            denominator_derivs,
            &self.indexes.denominator_indexes,
            denominators_deriv,
        );
        Ok(())
    }
}

fn check_finite(name: &str, derivs: &[BaseFloat]) -> CctcResult<()> {
    let n_bad = derivs.iter().filter(|x| !x.is_finite()).count();
    if n_bad > 0 {
        Err(CctcError::NumericInstability(format!(
            "{} of {} {} derivatives are NaN or Inf",
            n_bad,
            derivs.len(),
            name
        )))
    } else {
        Ok(())
    }
}
