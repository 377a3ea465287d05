use thiserror::Error;

/// Terminal failure of a single generation attempt. None of these are retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("No image data found in response")]
    NoImageInResponse,
    #[error("{0}")]
    Transport(String),
    #[error("No API key available; select a key or set GEMINI_API_KEY")]
    MissingCredential,
    #[error("Image data in response was not valid base64: {0}")]
    InvalidImageData(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StudioError {
    #[error("A generation is already in progress.")]
    GenerationInFlight,
    #[error("No history entry matches '{0}'.")]
    UnknownHistoryEntry(String),
    #[error("There is no generated image to download.")]
    NothingToDownload,
    #[error("{0}")]
    InvalidSelection(String),
}
