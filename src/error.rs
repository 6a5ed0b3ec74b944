use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectError {
    /// The source URI is not `gs://bucket/object`.
    #[error("source URI '{0}' is not in 'gs://bucket/object' format")]
    InvalidUri(String),

    /// Storage or inference backend failed; never retried.
    #[error("{service} request failed: {message}")]
    Backend {
        service: &'static str,
        message: String,
    },

    #[error("prediction response contains no predictions")]
    EmptyPrediction,

    #[error("malformed prediction: {0}")]
    MalformedPrediction(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("resize error: {0}")]
    Resize(#[from] fast_image_resize::ResizeError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("font error: {0}")]
    Font(String),

    #[error("label file error: {0}")]
    Labels(String),
}

impl DetectError {
    pub fn backend(service: &'static str, message: impl Into<String>) -> Self {
        DetectError::Backend {
            service,
            message: message.into(),
        }
    }

    /// Folds a `ureq` failure into `Backend`, keeping the status body for diagnostics.
    pub fn from_http(service: &'static str, e: ureq::Error) -> Self {
        match e {
            ureq::Error::Status(code, response) => {
                let url = response.get_url().to_string();
                let body = response.into_string().unwrap_or_default();
                DetectError::backend(service, format!("{url} returned {code}: {}", body.trim()))
            }
            ureq::Error::Transport(t) => DetectError::backend(service, t.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, DetectError>;
