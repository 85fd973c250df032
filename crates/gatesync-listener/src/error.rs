use gatesync_state::StateError;
use thiserror::Error;

pub type ListenerResult<T> = Result<T, ListenerError>;

/// Errors surfaced as the result of a feed event.
///
/// `Clone` so that one result can be handed to every subscriber.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ListenerError {
    #[error("no deployment store is active; a snapshot must be applied first")]
    NoActiveStore,

    #[error("malformed change: {0}")]
    MalformedChange(String),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("listener worker has shut down")]
    WorkerClosed,

    #[error("status report failed: {0}")]
    Report(String),
}
