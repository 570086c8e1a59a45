pub mod controller;
pub mod merge;

pub use controller::RouteRefreshController;
pub use merge::{apply_delta, merge, AnnotationRefreshDelta};
