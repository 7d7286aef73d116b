//! Predictor gateway.
//!
//! The peptide–MHC predictor is an external collaborator. The driver only
//! sees it through two capability traits, one per prediction mode, and the
//! [`Gateway`] enum that gives both a common `predict(peptides, alleles)`
//! contract.

pub mod mhcflurry;

use std::fmt;

use serde::ser::{Serialize, Serializer};

use crate::data::input::{Allele, Peptide};
use crate::data::model::ResultTable;
use crate::error::Result;
use crate::executor;

pub use mhcflurry::{Mhcflurry, MhcflurryConfig};

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// Which predictor variant a build drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Binding affinity, one predictor call per allele.
    Affinity,
    /// Antigen presentation, one batched call over all alleles.
    Presentation,
}

impl Mode {
    /// The mode compiled into this build (`presentation` cargo feature).
    pub const BUILD: Mode = if cfg!(feature = "presentation") {
        Mode::Presentation
    } else {
        Mode::Affinity
    };
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Affinity => write!(f, "affinity"),
            Mode::Presentation => write!(f, "presentation"),
        }
    }
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// A predictor scoring peptides against a single allele.
pub trait AffinityPredictor {
    /// Columns of the table `predict_to_table` returns. Used as the header
    /// when there is nothing to predict.
    fn schema(&self) -> Vec<String>;

    /// Predict every peptide against `allele`. With `throw == false`
    /// unsupported alleles or peptides must not fail the call; the returned
    /// rows carry the predictor's own error markers instead.
    fn predict_to_table(&self, peptides: &[Peptide], allele: &str, throw: bool)
        -> Result<ResultTable>;
}

/// A predictor scoring peptides against samples, each a set of alleles.
pub trait PresentationPredictor {
    fn predict(&self, peptides: &[Peptide], alleles: &SampleAlleles) -> Result<ResultTable>;
}

// ---------------------------------------------------------------------------
// SampleAlleles
// ---------------------------------------------------------------------------

/// Insertion-ordered mapping from sample name to the alleles of that sample.
/// Inserting a sample that already exists leaves the mapping unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SampleAlleles {
    entries: Vec<(String, Vec<Allele>)>,
}

impl SampleAlleles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sample; returns `false` if the name was already present.
    pub fn insert(&mut self, sample: impl Into<String>, alleles: Vec<Allele>) -> bool {
        let sample = sample.into();
        if self.get(&sample).is_some() {
            return false;
        }
        self.entries.push((sample, alleles));
        true
    }

    pub fn get(&self, sample: &str) -> Option<&[Allele]> {
        self.entries
            .iter()
            .find(|(name, _)| name == sample)
            .map(|(_, alleles)| alleles.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Samples in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Allele])> {
        self.entries
            .iter()
            .map(|(name, alleles)| (name.as_str(), alleles.as_slice()))
    }
}

/// Serialized as a JSON object whose keys keep insertion order.
impl Serialize for SampleAlleles {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// A loaded predictor of either variant.
pub enum Gateway {
    Affinity(Box<dyn AffinityPredictor>),
    Presentation(Box<dyn PresentationPredictor>),
}

impl Gateway {
    /// Load the MHCflurry predictor for `mode`. Slow; call once per run.
    pub fn load(mode: Mode, config: MhcflurryConfig) -> Result<Self> {
        let predictor = Mhcflurry::load(mode, config)?;
        Ok(match mode {
            Mode::Affinity => Gateway::Affinity(Box::new(predictor)),
            Mode::Presentation => Gateway::Presentation(Box::new(predictor)),
        })
    }

    pub fn mode(&self) -> Mode {
        match self {
            Gateway::Affinity(_) => Mode::Affinity,
            Gateway::Presentation(_) => Mode::Presentation,
        }
    }

    /// Predict `peptides` against `alleles`, fanning out as the mode requires.
    pub fn predict(&self, peptides: &[Peptide], alleles: &[Allele]) -> Result<ResultTable> {
        match self {
            Gateway::Affinity(p) => executor::run_affinity(p.as_ref(), peptides, alleles),
            Gateway::Presentation(p) => executor::run_presentation(p.as_ref(), peptides, alleles),
        }
    }
}
