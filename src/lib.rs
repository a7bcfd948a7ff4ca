pub mod common;
pub mod error;
pub mod mocks;
pub mod negative;
pub mod options;
pub mod positive;
pub mod prelude;
pub mod prob;
pub mod supervision;
pub mod training;
pub mod transition;
pub mod vector;

#[cfg(test)]
#[macro_use]
extern crate approx;
