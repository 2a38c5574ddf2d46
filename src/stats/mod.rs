//! Statistical estimators used by the strategy engine.

mod kde;

pub use kde::{GaussianKde, KdeError};
