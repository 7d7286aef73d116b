//! Fan-out of predictions across alleles.

use crate::data::input::{Allele, Peptide};
use crate::data::model::ResultTable;
use crate::error::Result;
use crate::predictor::{AffinityPredictor, PresentationPredictor, SampleAlleles};

/// Affinity mode: one non-throwing call per allele, in input order, with the
/// per-allele frames stacked row-wise. No alleles means no calls and a table
/// holding only the predictor's column schema.
pub fn run_affinity<P>(predictor: &P, peptides: &[Peptide], alleles: &[Allele]) -> Result<ResultTable>
where
    P: AffinityPredictor + ?Sized,
{
    if alleles.is_empty() {
        log::warn!("no alleles to predict against");
        return Ok(ResultTable::with_columns(predictor.schema()));
    }

    let mut frames = Vec::with_capacity(alleles.len());
    for (i, allele) in alleles.iter().enumerate() {
        log::info!(
            "[{}/{}] predicting {} peptides against {allele}",
            i + 1,
            alleles.len(),
            peptides.len()
        );
        let frame = predictor.predict_to_table(peptides, allele, false)?;
        let missing = frame.rows_with_missing();
        if missing > 0 {
            log::warn!("{allele}: {missing} of {} rows carry no prediction", frame.len());
        }
        frames.push(frame);
    }
    Ok(ResultTable::concat(frames))
}

/// One sample per allele, named after the allele itself. Repeated alleles
/// collapse onto their first occurrence.
pub fn presentation_samples(alleles: &[Allele]) -> SampleAlleles {
    let mut samples = SampleAlleles::new();
    for allele in alleles {
        samples.insert(allele.clone(), vec![allele.clone()]);
    }
    samples
}

/// Presentation mode: a single batched call over all alleles. Failures are
/// not suppressed.
pub fn run_presentation<P>(
    predictor: &P,
    peptides: &[Peptide],
    alleles: &[Allele],
) -> Result<ResultTable>
where
    P: PresentationPredictor + ?Sized,
{
    let samples = presentation_samples(alleles);
    log::info!(
        "predicting {} peptides against {} samples",
        peptides.len(),
        samples.len()
    );
    predictor.predict(peptides, &samples)
}
