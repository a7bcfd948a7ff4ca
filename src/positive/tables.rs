//!
//! Storage for the numerator/denominator tables
//!
//! Both tables live in one allocation. In the forward pass they hold the
//! looked-up probabilities; in the backward pass they are overwritten with
//! the derivatives w.r.t. those probabilities. `TableContent` records which
//! meaning is current, and reading the wrong one is an `InvalidState`.
//!
use crate::common::BaseFloat;
use crate::error::{CctcError, CctcResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableContent {
    Empty,
    Probs,
    Derivs,
}

#[derive(Debug, Clone)]
pub struct TableArena {
    /// numerator entries first, then denominator entries
    values: Vec<BaseFloat>,
    n_numerator: usize,
    content: TableContent,
}

impl TableArena {
    pub fn new(n_numerator: usize, n_denominator: usize) -> TableArena {
        TableArena {
            values: vec![0.0; n_numerator + n_denominator],
            n_numerator,
            content: TableContent::Empty,
        }
    }
    pub fn n_numerator(&self) -> usize {
        self.n_numerator
    }
    pub fn n_denominator(&self) -> usize {
        self.values.len() - self.n_numerator
    }
    pub fn content(&self) -> TableContent {
        self.content
    }
    fn check_content(&self, content: TableContent) -> CctcResult<()> {
        if self.content == content {
            Ok(())
        } else {
            Err(CctcError::InvalidState(format!(
                "tables hold {:?}, not {:?}",
                self.content, content
            )))
        }
    }
    ///
    /// `(numerator_probs, denominator_probs)` to be filled by the lookup.
    /// Only once, on empty tables.
    ///
    pub fn probs_mut(&mut self) -> CctcResult<(&mut [BaseFloat], &mut [BaseFloat])> {
        self.check_content(TableContent::Empty)?;
        self.content = TableContent::Probs;
        Ok(self.values.split_at_mut(self.n_numerator))
    }
    /// `(numerator_probs, denominator_probs)`
    pub fn probs(&self) -> CctcResult<(&[BaseFloat], &[BaseFloat])> {
        self.check_content(TableContent::Probs)?;
        Ok(self.values.split_at(self.n_numerator))
    }
    ///
    /// Overwrite the probabilities with the derivatives of the log-prob:
    ///
    /// ```text
    /// numerator_deriv[i]   =  occupancy[i] / numerator_prob[i]
    /// denominator_deriv[j] = -occupancy[j] / denominator_prob[j]
    /// ```
    ///
    /// An entry with zero occupancy gets zero derivative.
    ///
    pub fn convert_to_derivs(
        &mut self,
        numerator_occupancy: &[f64],
        denominator_occupancy: &[f64],
    ) -> CctcResult<()> {
        self.check_content(TableContent::Probs)?;
        assert_eq!(numerator_occupancy.len(), self.n_numerator());
        assert_eq!(denominator_occupancy.len(), self.n_denominator());
        let (num, den) = self.values.split_at_mut(self.n_numerator);
        for (x, &occ) in num.iter_mut().zip(numerator_occupancy) {
            *x = to_deriv(occ, *x, 1.0);
        }
        for (x, &occ) in den.iter_mut().zip(denominator_occupancy) {
            *x = to_deriv(occ, *x, -1.0);
        }
        self.content = TableContent::Derivs;
        Ok(())
    }
    /// `(numerator_derivs, denominator_derivs)`
    pub fn derivs(&self) -> CctcResult<(&[BaseFloat], &[BaseFloat])> {
        self.check_content(TableContent::Derivs)?;
        Ok(self.values.split_at(self.n_numerator))
    }
}

fn to_deriv(occupancy: f64, prob: BaseFloat, sign: f64) -> BaseFloat {
    if occupancy == 0.0 {
        0.0
    } else {
        (sign * occupancy / prob as f64) as BaseFloat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probs_then_derivs() {
        let mut t = TableArena::new(2, 1);
        assert_eq!(t.content(), TableContent::Empty);
        assert!(t.probs().is_err());
        {
            let (num, den) = t.probs_mut().unwrap();
            num.copy_from_slice(&[0.5, 0.1]);
            den.copy_from_slice(&[0.25]);
        }
        assert_eq!(t.probs().unwrap(), (&[0.5, 0.1][..], &[0.25][..]));
        assert!(t.derivs().is_err());

        t.convert_to_derivs(&[1.0, 0.0], &[1.0]).unwrap();
        assert_eq!(t.content(), TableContent::Derivs);
        let (num, den) = t.derivs().unwrap();
        assert_eq!(num, &[2.0, 0.0]);
        assert_eq!(den, &[-4.0]);

        // probabilities are gone
        assert!(matches!(t.probs(), Err(CctcError::InvalidState(_))));
        assert!(t.probs_mut().is_err());
        assert!(t.convert_to_derivs(&[1.0, 0.0], &[1.0]).is_err());
    }
    #[test]
    fn zero_prob_with_mass_is_not_finite() {
        let mut t = TableArena::new(1, 1);
        {
            let (num, den) = t.probs_mut().unwrap();
            num[0] = 0.0;
            den[0] = 0.0;
        }
        t.convert_to_derivs(&[0.5], &[0.0]).unwrap();
        let (num, den) = t.derivs().unwrap();
        assert!(!num[0].is_finite());
        assert_eq!(den[0], 0.0);
    }
}
