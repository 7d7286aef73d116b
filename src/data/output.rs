use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use crate::data::model::ResultTable;
use crate::error::{DriverError, Result};

/// Suffix appended to every output file name.
pub const OUTPUT_SUFFIX: &str = "_flur.csv";

// ---------------------------------------------------------------------------
// Output naming
// ---------------------------------------------------------------------------

/// `dirname(peptides) + "/" + stem(alleles) + "_" + stem(peptides) + "_flur.csv"`.
///
/// Pure path composition; the filesystem is never consulted and non-UTF-8
/// bytes are kept as they are. The file always lands next to the peptide
/// file, or in `.` when the peptide path has no directory part.
pub fn output_path(allele_file: &Path, peptide_file: &Path) -> PathBuf {
    let dir = match peptide_file.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    let mut name = OsString::new();
    name.push(stem(allele_file));
    name.push("_");
    name.push(stem(peptide_file));
    name.push(OUTPUT_SUFFIX);
    dir.join(name)
}

/// Basename with its final `.ext` removed. Leading dots do not start an
/// extension, so `.peptides` keeps its name.
fn stem(path: &Path) -> &OsStr {
    path.file_stem().unwrap_or_default()
}

// ---------------------------------------------------------------------------
// CSV sink
// ---------------------------------------------------------------------------

/// Write the table as CSV: header row, no index column, cells verbatim.
/// Any existing file is replaced. A table without columns produces an empty
/// file.
pub fn write_csv(table: &ResultTable, path: &Path) -> Result<()> {
    let unwritable = |source: csv::Error| DriverError::OutputUnwritable {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = csv::Writer::from_path(path).map_err(unwritable)?;
    if !table.columns.is_empty() {
        writer.write_record(&table.columns).map_err(unwritable)?;
        for row in &table.rows {
            writer.write_record(&row.cells).map_err(unwritable)?;
        }
    }
    writer.flush().map_err(|e| unwritable(e.into()))?;
    Ok(())
}
