//! MHCflurry backend.
//!
//! Loading resolves the trained models directory through
//! `mhcflurry-downloads`, which honours MHCflurry's own environment
//! variables, then starts one Python worker that loads the models and stays
//! up for the rest of the run. Each prediction is a JSON request on the
//! worker's stdin naming a scratch input/output CSV pair; the worker answers
//! with one JSON line.

use std::cell::RefCell;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use super::{AffinityPredictor, Mode, PresentationPredictor, SampleAlleles};
use crate::data::input::Peptide;
use crate::data::model::ResultTable;
use crate::error::{DriverError, Result};

const WORKER_SCRIPT: &str = include_str!("worker.py");

/// Columns of `Class1AffinityPredictor.predict_to_dataframe` with its default
/// percentile ranks and confidence intervals.
pub const AFFINITY_COLUMNS: [&str; 6] = [
    "peptide",
    "allele",
    "prediction",
    "prediction_low",
    "prediction_high",
    "prediction_percentile",
];

/// Where to find Python, the MHCflurry tools and the models.
#[derive(Debug, Clone)]
pub struct MhcflurryConfig {
    /// Interpreter with the `mhcflurry` package installed.
    pub python: PathBuf,
    pub downloads_bin: PathBuf,
    /// Skip the `mhcflurry-downloads` lookup and use this directory.
    pub models_dir: Option<PathBuf>,
}

impl Default for MhcflurryConfig {
    fn default() -> Self {
        Self {
            python: PathBuf::from("python3"),
            downloads_bin: PathBuf::from("mhcflurry-downloads"),
            models_dir: None,
        }
    }
}

/// Download name and the models subdirectory inside it, per mode.
fn download_for(mode: Mode) -> (&'static str, &'static str) {
    match mode {
        Mode::Affinity => ("models_class1_pan", "models.combined"),
        Mode::Presentation => ("models_class1_presentation", "models"),
    }
}

// ---------------------------------------------------------------------------
// Worker protocol
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct Request<'a> {
    input: &'a Path,
    output: &'a Path,
    throw: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    samples: Option<&'a SampleAlleles>,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
enum Reply {
    Ready,
    Ok,
    Error { message: String },
}

/// A running worker process holding the loaded models.
struct Session {
    child: Child,
    stdin: Option<ChildStdin>,
    replies: BufReader<ChildStdout>,
    scratch: TempDir,
}

impl Session {
    /// Start the worker and wait until it has loaded the models.
    fn start(python: &Path, mode: Mode, models_dir: &Path) -> std::result::Result<Self, String> {
        let scratch =
            tempfile::tempdir().map_err(|e| format!("cannot create scratch directory: {e}"))?;
        let log = File::create(scratch.path().join("worker.log"))
            .map_err(|e| format!("cannot create worker log: {e}"))?;

        let mut child = Command::new(python)
            .arg("-c")
            .arg(WORKER_SCRIPT)
            .arg(mode.to_string())
            .arg(models_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(log)
            .spawn()
            .map_err(|e| format!("cannot start {}: {e}", python.display()))?;
        let stdin = child.stdin.take();
        let Some(stdout) = child.stdout.take() else {
            return Err("worker stdout is not piped".to_string());
        };

        let mut session = Session {
            child,
            stdin,
            replies: BufReader::new(stdout),
            scratch,
        };
        match session.receive()? {
            Reply::Ready => Ok(session),
            Reply::Error { message } => Err(message),
            other => Err(format!("unexpected reply while loading: {other:?}")),
        }
    }

    fn request(&mut self, request: &Request) -> std::result::Result<(), String> {
        let mut line =
            serde_json::to_string(request).map_err(|e| format!("cannot encode request: {e}"))?;
        line.push('\n');
        let sent = match self.stdin.as_mut() {
            Some(stdin) => stdin.write_all(line.as_bytes()).and_then(|_| stdin.flush()),
            None => return Err("worker input is closed".to_string()),
        };
        if let Err(e) = sent {
            return Err(format!("cannot reach worker ({e}): {}", self.diagnostics()));
        }

        match self.receive()? {
            Reply::Ok => Ok(()),
            Reply::Error { message } => Err(message),
            other => Err(format!("unexpected reply: {other:?}")),
        }
    }

    fn receive(&mut self) -> std::result::Result<Reply, String> {
        let mut line = String::new();
        let n = self
            .replies
            .read_line(&mut line)
            .map_err(|e| format!("cannot read from worker: {e}"))?;
        if n == 0 {
            return Err(format!("worker exited: {}", self.diagnostics()));
        }
        serde_json::from_str(line.trim())
            .map_err(|e| format!("unreadable worker reply {:?}: {e}", line.trim()))
    }

    /// Last line the worker wrote to stderr.
    fn diagnostics(&self) -> String {
        match std::fs::read(self.scratch.path().join("worker.log")) {
            Ok(bytes) => last_line(&bytes),
            Err(_) => "no diagnostics on stderr".to_string(),
        }
    }

    fn scratch(&self) -> &Path {
        self.scratch.path()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // EOF on stdin ends the worker's request loop.
        drop(self.stdin.take());
        match self.child.wait() {
            Ok(status) if !status.success() => log::debug!("predictor worker exited with {status}"),
            Err(e) => log::debug!("cannot wait for predictor worker: {e}"),
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Mhcflurry
// ---------------------------------------------------------------------------

/// A loaded MHCflurry predictor.
pub struct Mhcflurry {
    session: RefCell<Session>,
}

impl Mhcflurry {
    /// Locate the models and start the worker. The models are loaded exactly
    /// once here; every later prediction reuses them.
    pub fn load(mode: Mode, config: MhcflurryConfig) -> Result<Self> {
        let models_dir = match config.models_dir {
            Some(dir) => dir,
            None => {
                let (download, subdir) = download_for(mode);
                locate_download(&config.downloads_bin, download)?.join(subdir)
            }
        };
        if !models_dir.is_dir() {
            return Err(DriverError::PredictorLoadFailure(format!(
                "models directory {} does not exist (run `mhcflurry-downloads fetch`?)",
                models_dir.display()
            )));
        }
        log::info!("loading {mode} predictor from {}", models_dir.display());
        let session = Session::start(&config.python, mode, &models_dir)
            .map_err(DriverError::PredictorLoadFailure)?;
        Ok(Self {
            session: RefCell::new(session),
        })
    }

    /// Send one request over `(key, peptide)` rows, where the key is the
    /// allele in affinity mode and the sample name in presentation mode.
    fn run<'a, I>(
        &self,
        target: &str,
        key_column: &str,
        rows: I,
        samples: Option<&SampleAlleles>,
        throw: bool,
    ) -> Result<ResultTable>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let failure = |message: String| DriverError::PredictionFailure {
            target: target.to_string(),
            message,
        };

        let mut session = self.session.borrow_mut();
        let input = session.scratch().join("input.csv");
        let output = session.scratch().join("predictions.csv");
        write_input(&input, key_column, rows)
            .map_err(|e| failure(format!("cannot write predictor input: {e}")))?;
        if output.exists() {
            std::fs::remove_file(&output)
                .map_err(|e| failure(format!("cannot clear {}: {e}", output.display())))?;
        }

        let request = Request {
            input: &input,
            output: &output,
            throw,
            samples,
        };
        log::debug!("predictor request {request:?}");
        session.request(&request).map_err(failure)?;

        let file = File::open(&output)
            .map_err(|e| failure(format!("no predictions written to {}: {e}", output.display())))?;
        ResultTable::from_csv_reader(file).map_err(|source| DriverError::MalformedPrediction {
            path: output.clone(),
            source,
        })
    }
}

impl AffinityPredictor for Mhcflurry {
    fn schema(&self) -> Vec<String> {
        AFFINITY_COLUMNS.iter().map(|c| c.to_string()).collect()
    }

    fn predict_to_table(&self, peptides: &[Peptide], allele: &str, throw: bool) -> Result<ResultTable> {
        let rows = peptides.iter().map(|p| (allele, p.as_str()));
        self.run(allele, "allele", rows, None, throw)
    }
}

impl PresentationPredictor for Mhcflurry {
    fn predict(&self, peptides: &[Peptide], alleles: &SampleAlleles) -> Result<ResultTable> {
        let rows = alleles
            .iter()
            .flat_map(|(sample, _)| peptides.iter().map(move |p| (sample, p.as_str())));
        let target = format!("{} samples", alleles.len());
        self.run(&target, "sample", rows, Some(alleles), true)
    }
}

/// Ask `mhcflurry-downloads` where a download lives.
fn locate_download(downloads_bin: &Path, download: &str) -> Result<PathBuf> {
    let result = Command::new(downloads_bin)
        .arg("path")
        .arg(download)
        .stdin(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| {
            DriverError::PredictorLoadFailure(format!("cannot run {}: {e}", downloads_bin.display()))
        })?;
    if !result.status.success() {
        return Err(DriverError::PredictorLoadFailure(format!(
            "{} path {download} exited with {}: {}",
            downloads_bin.display(),
            result.status,
            last_line(&result.stderr)
        )));
    }
    let path = String::from_utf8_lossy(&result.stdout).trim().to_string();
    if path.is_empty() {
        return Err(DriverError::PredictorLoadFailure(format!(
            "{} printed no path for {download}",
            downloads_bin.display()
        )));
    }
    Ok(PathBuf::from(path))
}

fn write_input<'a, I>(path: &Path, key_column: &str, rows: I) -> std::result::Result<(), csv::Error>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([key_column, "peptide"])?;
    for (key, peptide) in rows {
        writer.write_record([key, peptide])?;
    }
    writer.flush()?;
    Ok(())
}

/// Last non-empty line of a child's stderr, usually the exception message.
fn last_line(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr)
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("no diagnostics on stderr")
        .to_string()
}
