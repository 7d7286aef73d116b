//! rusty-flurry
//!
//! Batch driver for the MHCflurry peptide–MHC predictor:
//!
//! - read an allele file and a peptide file,
//! - predict every peptide against every allele (affinity or presentation),
//! - write one `<alleles>_<peptides>_flur.csv` next to the peptide file.
//!
pub mod cli;
pub mod data;
pub mod error;
pub mod executor;
pub mod predictor;

pub use cli::Cli;
pub use data::model::{CellValue, PredictionRow, ResultTable};
pub use error::DriverError;
pub use predictor::{AffinityPredictor, Gateway, Mode, PresentationPredictor, SampleAlleles};
