pub mod coordinator;
pub mod state;

pub use coordinator::RerouteCoordinator;
pub use state::{RerouteState, RerouteStateMachine, RerouteTicket};
