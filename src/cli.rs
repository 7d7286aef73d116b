use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::data::{input, output};
use crate::predictor::{Gateway, MhcflurryConfig, Mode};

/// Run MHCflurry over every allele in one file and every peptide in another,
/// writing `<alleles>_<peptides>_flur.csv` next to the peptide file.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// File with one line of space-separated HLA alleles.
    #[arg(short, long, required = true)]
    pub allele: PathBuf,

    /// File with whitespace-separated peptides.
    #[arg(short, long, required = true)]
    pub peptide: PathBuf,

    /// Python interpreter with the `mhcflurry` package installed.
    #[arg(long, env = "MHCFLURRY_PYTHON", default_value = "python3")]
    pub python: PathBuf,

    /// The `mhcflurry-downloads` executable, used to locate trained models.
    #[arg(long, env = "MHCFLURRY_DOWNLOADS_BIN", default_value = "mhcflurry-downloads")]
    pub downloads_bin: PathBuf,

    /// Use this models directory instead of asking `mhcflurry-downloads`.
    #[arg(long, env = "MHCFLURRY_MODELS")]
    pub models: Option<PathBuf>,
}

impl Cli {
    fn predictor_config(&self) -> MhcflurryConfig {
        MhcflurryConfig {
            python: self.python.clone(),
            downloads_bin: self.downloads_bin.clone(),
            models_dir: self.models.clone(),
        }
    }

    /// Read both inputs, predict in the build's mode and write the CSV.
    /// Returns the path written.
    pub fn execute(self) -> Result<PathBuf> {
        let alleles = input::read_alleles(&self.allele)?;
        let peptides = input::read_peptides(&self.peptide)?;
        log::info!(
            "read {} alleles from {} and {} peptides from {}",
            alleles.len(),
            self.allele.display(),
            peptides.len(),
            self.peptide.display()
        );

        let gateway = Gateway::load(Mode::BUILD, self.predictor_config())?;
        let table = gateway.predict(&peptides, &alleles)?;

        let out = output::output_path(&self.allele, &self.peptide);
        output::write_csv(&table, &out)?;
        log::info!("wrote {} {} rows to {}", table.len(), gateway.mode(), out.display());
        Ok(out)
    }
}
