mod error;
mod history;
mod request;
mod state;

pub use error::{GenerationError, StudioError};
pub use history::{History, HistoryEntry};
pub use request::{
    GenerationRequest, ImagePayload, SelectionAxis, SelectionChange, DATA_URI_MIME,
};
pub use state::{GenerationState, PendingGeneration, StudioState, FAILURE_PREFIX};
