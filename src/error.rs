pub type WaveGridResult<T> = Result<T, WaveGridError>;

#[derive(thiserror::Error, Debug)]
pub enum WaveGridError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("capture unsupported: {0}")]
    CaptureUnsupported(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("render error: {0}")]
    Render(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WaveGridError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn capture_unsupported(msg: impl Into<String>) -> Self {
        Self::CaptureUnsupported(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn is_capture_unsupported(&self) -> bool {
        matches!(self, Self::CaptureUnsupported(_))
    }
}
