use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Empty image payload")]
    Empty,

    #[error("Corrupt image data: {0}")]
    Corrupt(#[source] image::ImageError),

    #[error("Image has zero width or height")]
    ZeroDimensions,
}

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("JPEG quality must be within (0, 1], got {0}")]
    InvalidQuality(f32),

    #[error("JPEG encoding failed: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Decoding recompressed JPEG failed: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Recompressed image is {actual:?}, expected {expected:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

#[derive(Error, Debug)]
pub enum ClassificationError {
    #[error("Classification API call failed with status: {0}")]
    HttpStatus(u16),

    #[error("Classification request failed: {0}")]
    Transport(String),

    #[error("Invalid response from classification API: {0}")]
    InvalidResponse(String),

    #[error("Classification API still rate limited after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("File too large: {size} bytes (limit: {limit} bytes)")]
    FileTooLarge { size: usize, limit: usize },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Classification(#[from] ClassificationError),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("No image loaded")]
    NoImageLoaded,

    #[error("An analysis is already running")]
    AlreadyAnalyzing,

    #[error("Analysis superseded by a newer image")]
    Superseded,

    #[error("Analysis task failed: {0}")]
    TaskFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image export error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
