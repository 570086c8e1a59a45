pub mod pipeline;
pub mod store;

pub use pipeline::{PipelineContext, RouteSetOutcome, RouteUpdatePipeline, RoutesUpdate};
pub use store::{RouteStore, RouteStoreReader, RouteStoreSnapshot};
