pub mod controller;
pub mod reconciler;

pub use controller::AlternativesController;
pub use reconciler::{metadata_for, reconcile};
