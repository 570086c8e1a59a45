use serde::{Deserialize, Serialize};
use std::fmt;

/// Who asked for a route refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RefreshOrigin {
    Manual,
    Controller,
}

/// Why the route set changed. Every mutation carries exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum RouteUpdateReason {
    CleanUp,
    NewRoutes { initial_leg_index: usize },
    Reroute { leg_index: usize },
    Alternatives { leg_index: usize },
    Reorder { leg_index: usize },
    RefreshRoutes { origin: RefreshOrigin, leg_index: usize },
}

impl RouteUpdateReason {
    /// Leg the engine should start tracking from.
    pub fn starting_leg_index(&self) -> usize {
        match *self {
            RouteUpdateReason::CleanUp => 0,
            RouteUpdateReason::NewRoutes { initial_leg_index } => initial_leg_index,
            RouteUpdateReason::Reroute { leg_index }
            | RouteUpdateReason::Alternatives { leg_index }
            | RouteUpdateReason::Reorder { leg_index }
            | RouteUpdateReason::RefreshRoutes { leg_index, .. } => leg_index,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteUpdateReason::CleanUp => "CleanUp",
            RouteUpdateReason::NewRoutes { .. } => "NewRoutes",
            RouteUpdateReason::Reroute { .. } => "Reroute",
            RouteUpdateReason::Alternatives { .. } => "Alternatives",
            RouteUpdateReason::Reorder { .. } => "Reorder",
            RouteUpdateReason::RefreshRoutes {
                origin: RefreshOrigin::Manual,
                ..
            } => "RefreshRoutes(manual)",
            RouteUpdateReason::RefreshRoutes {
                origin: RefreshOrigin::Controller,
                ..
            } => "RefreshRoutes(controller)",
        }
    }
}

impl fmt::Display for RouteUpdateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
