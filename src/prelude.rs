//!
//! globally-available parts
//!
pub use crate::common::{BaseFloat, GraphLabel};
pub use crate::error::{CctcError, CctcResult};
pub use crate::negative::NegativeComputation;
pub use crate::options::TrainingOptions;
pub use crate::positive::PositiveComputation;
pub use crate::prob::{p, Prob};
pub use crate::supervision::Supervision;
pub use crate::training::{compute_objf_and_deriv, CommonComputation, ObjfParts};
pub use crate::transition::{GraphLabelInfo, TransitionModel};
pub use petgraph::graph::{EdgeIndex, NodeIndex};
