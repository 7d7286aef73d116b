use std::path::Path;

use crate::error::{DriverError, Result};

/// An HLA allele identifier such as `HLA-A*02:01`, passed through untouched.
pub type Allele = String;

/// An amino-acid sequence, passed through untouched.
pub type Peptide = String;

// ---------------------------------------------------------------------------
// File readers
// ---------------------------------------------------------------------------

/// Read the allele file: one line of alleles separated by single spaces.
pub fn read_alleles(path: &Path) -> Result<Vec<Allele>> {
    read_text(path).map(|text| parse_alleles(&text))
}

/// Read the peptide file: peptides separated by any whitespace, any number
/// of lines.
pub fn read_peptides(path: &Path) -> Result<Vec<Peptide>> {
    read_text(path).map(|text| parse_peptides(&text))
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| DriverError::InputUnreadable {
        path: path.to_path_buf(),
        source,
    })
}

// ---------------------------------------------------------------------------
// Splitting rules
// ---------------------------------------------------------------------------

/// Split allele text on the ASCII space only. Trailing line terminators are
/// dropped, and so are empty tokens; tabs and other whitespace stay inside
/// tokens.
pub fn parse_alleles(text: &str) -> Vec<Allele> {
    text.trim_end_matches(|c: char| c == '\r' || c == '\n')
        .split(' ')
        .filter(|tok| !tok.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split peptide text on any run of whitespace.
pub fn parse_peptides(text: &str) -> Vec<Peptide> {
    text.split_whitespace().map(str::to_string).collect()
}
