use std::path::PathBuf;

use thiserror::Error;

/// Every failure the driver can surface; all of them end the run.
/// Unsupported alleles in affinity mode are not errors: the predictor marks
/// them in the returned rows.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("cannot read input file {}", .path.display())]
    InputUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("predictor failed to load: {0}")]
    PredictorLoadFailure(String),

    #[error("prediction failed for {target}: {message}")]
    PredictionFailure { target: String, message: String },

    #[error("predictor output {} is not valid CSV", .path.display())]
    MalformedPrediction {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("cannot write output file {}", .path.display())]
    OutputUnwritable {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

pub type Result<T> = std::result::Result<T, DriverError>;
