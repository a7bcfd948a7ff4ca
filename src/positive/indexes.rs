//!
//! Lookup indexes from supervision arcs into the probability tables
//!
use crate::common::{BaseFloat, GraphLabel, MatrixIndex};
use crate::error::{CctcError, CctcResult};
use crate::supervision::{StateTimes, Supervision};
use crate::transition::{GraphLabelInfo, TransitionModel};
use crate::vector::EdgeVec;
use derive_new::new;
use fnv::FnvHashMap;
use log::debug;

///
/// Where an arc looks up its likelihoods.
///
/// `numerator` is a position in `LookupIndexes::numerator_indexes` (and in
/// the numerator table), `denominator` in `denominator_indexes`.
///
#[derive(new, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArcIndexPair {
    pub numerator: usize,
    pub denominator: usize,
}

#[derive(Debug, Clone)]
pub struct LookupIndexes {
    /// index pair of each arc
    pub arc_indexes: EdgeVec<ArcIndexPair>,
    /// lm-prob of each arc, from the transition model
    pub lm_probs: EdgeVec<BaseFloat>,
    /// `(row, output_index)` in `exp_nnet_output`, without duplicates
    pub numerator_indexes: Vec<MatrixIndex>,
    /// `(row, history_state)` in `denominators`, without duplicates
    pub denominator_indexes: Vec<MatrixIndex>,
}

/// Position of `key` in `table`, appending it if it is new.
fn intern(map: &mut FnvHashMap<MatrixIndex, usize>, table: &mut Vec<MatrixIndex>, key: MatrixIndex) -> usize {
    *map.entry(key).or_insert_with(|| {
        table.push(key);
        table.len() - 1
    })
}

impl LookupIndexes {
    ///
    /// Visit each arc of each state in order and collect the matrix
    /// coordinates the arc needs.
    ///
    pub fn build<T: TransitionModel>(
        trans_model: &T,
        supervision: &Supervision,
        times: &StateTimes,
    ) -> CctcResult<LookupIndexes> {
        let n_arcs = supervision.n_arcs();
        let mut arc_indexes = EdgeVec::new(n_arcs, ArcIndexPair::default());
        let mut lm_probs = EdgeVec::new(n_arcs, 0.0);
        let mut numerator_indexes = Vec::new();
        let mut denominator_indexes = Vec::new();
        let mut numerator_map = FnvHashMap::default();
        let mut denominator_map = FnvHashMap::default();

        for (e, source, _, ew) in supervision.arcs() {
            let info = label_info(trans_model, supervision, ew.label)?;
            let row = times.row(source);
            let numerator = intern(
                &mut numerator_map,
                &mut numerator_indexes,
                (row, info.output_index),
            );
            let denominator = intern(
                &mut denominator_map,
                &mut denominator_indexes,
                (row, info.history_state),
            );
            arc_indexes[e] = ArcIndexPair::new(numerator, denominator);
            lm_probs[e] = info.lm_prob;
        }

        debug!(
            "lookup indexes: arcs={} numerator={} denominator={}",
            n_arcs,
            numerator_indexes.len(),
            denominator_indexes.len()
        );
        Ok(LookupIndexes {
            arc_indexes,
            lm_probs,
            numerator_indexes,
            denominator_indexes,
        })
    }
    pub fn n_numerator(&self) -> usize {
        self.numerator_indexes.len()
    }
    pub fn n_denominator(&self) -> usize {
        self.denominator_indexes.len()
    }
}

fn label_info<T: TransitionModel>(
    trans_model: &T,
    supervision: &Supervision,
    label: GraphLabel,
) -> CctcResult<GraphLabelInfo> {
    if label >= supervision.label_dim {
        return Err(CctcError::InvalidAutomaton(format!(
            "graph label {} is out of range (label_dim={})",
            label, supervision.label_dim
        )));
    }
    let info = trans_model.graph_label_info(label).ok_or_else(|| {
        CctcError::InvalidAutomaton(format!(
            "graph label {} has no mapping in the transition model",
            label
        ))
    })?;
    if info.output_index >= trans_model.num_output_indexes()
        || info.history_state >= trans_model.num_history_states()
    {
        return Err(CctcError::InvalidAutomaton(format!(
            "graph label {} maps to output {} and history {}, out of {}x{}",
            label,
            info.output_index,
            info.history_state,
            trans_model.num_output_indexes(),
            trans_model.num_history_states()
        )));
    }
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ei;
    use crate::mocks::{mock_branching, MockTransitionModel};

    #[test]
    fn shared_coordinates_are_deduplicated() {
        let trans = MockTransitionModel::full(2, 3);
        let s = mock_branching();
        let times = s.state_times().unwrap();
        let idx = LookupIndexes::build(&trans, &s, &times).unwrap();
        println!("{:?}", idx);
        assert_eq!(idx.arc_indexes.len(), s.n_arcs());

        // each arc points to its own coordinate
        for (e, source, _, ew) in s.arcs() {
            let pair = idx.arc_indexes[e];
            let info = trans.graph_label_info(ew.label).unwrap();
            let row = times.row(source);
            assert_eq!(idx.numerator_indexes[pair.numerator], (row, info.output_index));
            assert_eq!(idx.denominator_indexes[pair.denominator], (row, info.history_state));
            assert_eq!(idx.lm_probs[e], info.lm_prob);
        }

        // arcs 2->3 (label 3) and 2->4 (label 5) leave the same state with
        // history 1, so they share the denominator entry.
        assert_eq!(
            idx.arc_indexes[ei(3)].denominator,
            idx.arc_indexes[ei(4)].denominator
        );
        assert_ne!(
            idx.arc_indexes[ei(3)].numerator,
            idx.arc_indexes[ei(4)].numerator
        );
        // no duplicated coordinates
        let mut num = idx.numerator_indexes.clone();
        num.sort();
        num.dedup();
        assert_eq!(num.len(), idx.n_numerator());
        let mut den = idx.denominator_indexes.clone();
        den.sort();
        den.dedup();
        assert_eq!(den.len(), idx.n_denominator());
    }
    #[test]
    fn unmapped_label_is_rejected() {
        // label 1 has no mapping
        let trans = MockTransitionModel::new(
            2,
            1,
            vec![Some(GraphLabelInfo::new(0, 0, 1.0)), None],
        );
        let mut s = Supervision::new(1, 2, 2);
        s.add_linear_lane(&[0, 1]);
        let times = s.state_times().unwrap();
        let r = LookupIndexes::build(&trans, &s, &times);
        assert!(matches!(r, Err(CctcError::InvalidAutomaton(_))));

        // label beyond label_dim
        let mut s = Supervision::new(1, 1, 2);
        s.add_linear_lane(&[7]);
        let times = s.state_times().unwrap();
        let r = LookupIndexes::build(&trans, &s, &times);
        assert!(matches!(r, Err(CctcError::InvalidAutomaton(_))));
    }
}
