pub mod chart;
pub mod cli;
pub mod endpoint;
pub mod error;
pub mod helpers;
pub mod mapping;
pub mod postprocess;
pub mod report;
pub mod service;
pub mod storage;
pub mod text;

pub use crate::cli::Args;
pub use crate::endpoint::{
    ImagePrediction, Instance, PredictionClient, PredictionResponse, VertexEndpoint,
};
pub use crate::error::{DetectError, Result};
pub use crate::mapping::SymbolNames;
pub use crate::report::{ReportOutcome, Reporter};
pub use crate::service::{Prediction, Predictor};
pub use crate::storage::{GcsStore, ObjectStore, StorageUri};
