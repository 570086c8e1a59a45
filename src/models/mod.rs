pub mod alternative;
pub mod reason;
pub mod route;

pub use alternative::{AlternativeRouteInfo, AlternativeRouteMetadata, ForkIntersection};
pub use reason::{RefreshOrigin, RouteUpdateReason};
pub use route::{Congestion, GeoPoint, LegAnnotation, LegStep, Route, RouteId, RouteLeg, RouteSet};
