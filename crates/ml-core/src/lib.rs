//! Image classification primitives consumed by the inference loop.
//!
//! Enable the `with-tch` feature to pull in the `tch` crate and the
//! TorchScript-backed [`torch::TorchClassifier`].

pub mod classifier;
pub mod labels;
pub mod scripted;
#[cfg(feature = "with-tch")]
pub mod torch;

pub use classifier::{Classification, ClassifyError, Classifier, Prediction, UNKNOWN_LABEL};
pub use labels::{canonical_label, ranked_summary};
pub use scripted::{ScriptStep, ScriptedClassifier};

#[cfg(feature = "with-tch")]
pub use tch;
