pub mod history;
pub mod navigation;

pub use history::{
    HistoryRecordingSessionState, HistoryRecordingStateChangeObserver,
    HistoryRecordingStateMachine,
};
pub use navigation::{derive_state, NavigationSessionState, NavigationSessionStateMachine};
