//!
//! Common types shared by the training modules
//!
pub use petgraph::graph::{EdgeIndex, NodeIndex};

/// Context-dependent label on a supervision arc.
///
/// It is an index of the transition model, which knows the output index,
/// the history state and the language-model probability of the label.
pub type GraphLabel = usize;

/// `(row, column)` coordinate in a frame-indexed matrix.
pub type MatrixIndex = (usize, usize);

/// Precision of the matrices exchanged with the neural network.
pub type BaseFloat = f32;

///
/// short-hand of `NodeIndex::new`
///
pub fn ni(index: usize) -> NodeIndex {
    NodeIndex::new(index)
}

///
/// short-hand of `EdgeIndex::new`
///
pub fn ei(index: usize) -> EdgeIndex {
    EdgeIndex::new(index)
}
