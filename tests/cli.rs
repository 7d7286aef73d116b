//! End-to-end runs of the `rusty-flurry` binary against a stub predictor
//! worker written in shell.
#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde::Deserialize;
use tempfile::TempDir;

const HEADER: &str =
    "peptide,allele,prediction,prediction_low,prediction_high,prediction_percentile";

/// Speaks the worker protocol: one `ready` line after "loading", then one
/// reply per JSON request. Invoked as `python -c SCRIPT MODE MODELS_DIR`.
/// Each start appends the mode to `$STUB_LOAD_LOG`. `$STUB_LOAD_ERROR` fails
/// the load. Keys named in `$STUB_UNSUPPORTED` fail a throwing request and
/// get empty predictions otherwise. Chatter goes to stderr like the real
/// worker's.
const STUB_WORKER: &str = r#"#!/bin/sh
if [ -n "${STUB_LOAD_LOG:-}" ]; then echo "$3" >> "$STUB_LOAD_LOG"; fi
echo "stub predictor loading models from $4" >&2
if [ -n "${STUB_LOAD_ERROR:-}" ]; then
  echo "{\"status\":\"error\",\"message\":\"$STUB_LOAD_ERROR\"}"
  exit 1
fi
echo '{"status":"ready"}'
bad="${STUB_UNSUPPORTED:-}"
field() { printf '%s\n' "$line" | sed "s/.*\"$1\":\"\([^\"]*\)\".*/\1/"; }
while IFS= read -r line; do
  in=$(field input)
  out=$(field output)
  case "$line" in *'"throw":true'*) throw=1 ;; *) throw=0 ;; esac
  if [ -n "$bad" ] && [ "$throw" = 1 ] && grep -q "^$bad," "$in"; then
    echo "{\"status\":\"error\",\"message\":\"ValueError: Unsupported allele: $bad\"}"
    continue
  fi
  awk -F, -v bad="$bad" '
    NR == 1 { print "peptide,allele,prediction,prediction_low,prediction_high,prediction_percentile"; next }
    $1 == bad { print $2 "," $1 ",,,,"; next }
    { n = length($2); print $2 "," $1 "," n "," (n - 1) "," (n + 1) ",1.5" }' "$in" > "$out"
  echo '{"status":"ok"}'
done
"#;

#[derive(Debug, Deserialize, PartialEq)]
struct Row {
    peptide: String,
    allele: String,
    prediction: Option<f64>,
    prediction_low: Option<f64>,
    prediction_high: Option<f64>,
    prediction_percentile: Option<f64>,
}

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("models")).unwrap();
        let fixture = Fixture { dir };
        fixture.script("python", STUB_WORKER);
        fixture
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
        path
    }

    fn script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.write(name, body);
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// The binary wired to the stub worker, with no models location.
    fn bare_command(&self, alleles: &Path, peptides: &Path) -> Command {
        let mut cmd = Command::cargo_bin("rusty-flurry").unwrap();
        cmd.env_remove("MHCFLURRY_MODELS")
            .env_remove("STUB_UNSUPPORTED")
            .env_remove("STUB_LOAD_ERROR")
            .env("STUB_LOAD_LOG", self.path("loads.log"))
            .arg("-a")
            .arg(alleles)
            .arg("-p")
            .arg(peptides)
            .arg("--python")
            .arg(self.path("python"));
        cmd
    }

    /// The binary wired to the stub worker and the fixture's models dir.
    fn command(&self, alleles: &Path, peptides: &Path) -> Command {
        let mut cmd = self.bare_command(alleles, peptides);
        cmd.arg("--models").arg(self.path("models"));
        cmd
    }
}

fn read_rows(path: &Path) -> Vec<Row> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    reader.deserialize().map(|r| r.unwrap()).collect()
}

fn stderr_of(assert: assert_cmd::assert::Assert) -> String {
    String::from_utf8_lossy(&assert.get_output().stderr).into_owned()
}

fn pairs(rows: &[Row]) -> Vec<(&str, &str)> {
    rows.iter()
        .map(|r| (r.peptide.as_str(), r.allele.as_str()))
        .collect()
}

#[cfg(not(feature = "presentation"))]
#[test]
fn affinity_rows_are_grouped_by_allele() {
    let fx = Fixture::new();
    let alleles = fx.write("allele.txt", "A B");
    let peptides = fx.write("pep.txt", "P1 P2");

    fx.command(&alleles, &peptides).assert().success().stdout("");

    let rows = read_rows(&fx.path("allele_pep_flur.csv"));
    assert_eq!(
        pairs(&rows),
        vec![("P1", "A"), ("P2", "A"), ("P1", "B"), ("P2", "B")]
    );
    assert!(rows.iter().all(|r| r.prediction == Some(2.0) && r.prediction_percentile == Some(1.5)));
}

#[cfg(not(feature = "presentation"))]
#[test]
fn models_load_once_for_all_alleles() {
    let fx = Fixture::new();
    let alleles = fx.write("allele.txt", "A B C");
    let peptides = fx.write("pep.txt", "P1 P2");

    fx.command(&alleles, &peptides).assert().success();

    assert_eq!(fs::read_to_string(fx.path("loads.log")).unwrap(), "affinity\n");
    assert_eq!(read_rows(&fx.path("allele_pep_flur.csv")).len(), 6);
}

#[cfg(not(feature = "presentation"))]
#[test]
fn empty_allele_file_gives_header_only() {
    let fx = Fixture::new();
    let alleles = fx.write("allele.txt", "");
    let peptides = fx.write("pep.txt", "P1");

    fx.command(&alleles, &peptides).assert().success();

    let text = fs::read_to_string(fx.path("allele_pep_flur.csv")).unwrap();
    assert_eq!(text, format!("{HEADER}\n"));
}

#[cfg(not(feature = "presentation"))]
#[test]
fn empty_peptide_file_passes_predictor_header_through() {
    let fx = Fixture::new();
    let alleles = fx.write("allele.txt", "A");
    let peptides = fx.write("pep.txt", "");

    fx.command(&alleles, &peptides).assert().success();

    let text = fs::read_to_string(fx.path("allele_pep_flur.csv")).unwrap();
    assert_eq!(text, format!("{HEADER}\n"));
}

#[cfg(not(feature = "presentation"))]
#[test]
fn unsupported_allele_is_reported_in_rows_not_exit_code() {
    let fx = Fixture::new();
    let alleles = fx.write("allele.txt", "A B");
    let peptides = fx.write("pep.txt", "P1");

    fx.command(&alleles, &peptides)
        .env("STUB_UNSUPPORTED", "B")
        .assert()
        .success();

    let rows = read_rows(&fx.path("allele_pep_flur.csv"));
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0], Row {
        peptide: "P1".into(),
        allele: "A".into(),
        prediction: Some(2.0),
        prediction_low: Some(1.0),
        prediction_high: Some(3.0),
        prediction_percentile: Some(1.5),
    });
    assert_eq!(rows[1].allele, "B");
    assert_eq!(rows[1].prediction, None);
    assert_eq!(rows[1].prediction_percentile, None);
}

#[test]
fn output_goes_to_peptide_directory() {
    let fx = Fixture::new();
    let alleles = fx.write("data/ciwd/42.txt", "HLA-A*02:01");
    let peptides = fx.write("work/run1/peps.lst", "SIINFEKL\nGILGFVFTL\n");

    fx.command(&alleles, &peptides).assert().success();

    let out = fx.path("work/run1/42_peps_flur.csv");
    let rows = read_rows(&out);
    assert_eq!(rows.len(), 2);
    assert!(!fx.path("data/ciwd/42_peps_flur.csv").exists());
}

#[test]
fn existing_output_is_overwritten() {
    let fx = Fixture::new();
    let alleles = fx.write("allele.txt", "A");
    let peptides = fx.write("pep.txt", "SIINFEKL");
    let out = fx.write("allele_pep_flur.csv", "old,contents\n1,2\n3,4\n");

    fx.command(&alleles, &peptides).assert().success();

    assert_eq!(pairs(&read_rows(&out)), vec![("SIINFEKL", "A")]);
}

#[test]
fn missing_input_fails_with_path() {
    let fx = Fixture::new();
    let peptides = fx.write("pep.txt", "P1");

    let result = fx.command(&fx.path("absent.txt"), &peptides).assert().failure().code(1);
    assert!(stderr_of(result).contains("absent.txt"));
}

#[test]
fn missing_models_fail_to_load() {
    let fx = Fixture::new();
    let alleles = fx.write("allele.txt", "A");
    let peptides = fx.write("pep.txt", "P1");

    let result = fx
        .bare_command(&alleles, &peptides)
        .arg("--models")
        .arg(fx.path("no-models-here"))
        .assert()
        .failure();
    assert!(stderr_of(result).contains("predictor failed to load"));
    assert!(!fx.path("allele_pep_flur.csv").exists());
}

#[test]
fn broken_model_install_fails_to_load() {
    let fx = Fixture::new();
    let alleles = fx.write("allele.txt", "A B");
    let peptides = fx.write("pep.txt", "P1");

    let result = fx
        .command(&alleles, &peptides)
        .env("STUB_LOAD_ERROR", "OSError: manifest.csv not found")
        .assert()
        .failure()
        .code(1);
    let stderr = stderr_of(result);
    assert!(stderr.contains("predictor failed to load"), "{stderr}");
    assert!(stderr.contains("manifest.csv not found"), "{stderr}");
    assert!(!fx.path("allele_pep_flur.csv").exists());
}

#[test]
fn models_are_located_through_downloads_tool() {
    let fx = Fixture::new();
    let base = fx.path("downloads");
    for sub in ["models_class1_pan/models.combined", "models_class1_presentation/models"] {
        fs::create_dir_all(base.join(sub)).unwrap();
    }
    let downloads = fx.script(
        "mhcflurry-downloads",
        &format!("#!/bin/sh\necho \"{}/$2\"\n", base.display()),
    );
    let alleles = fx.write("allele.txt", "A");
    let peptides = fx.write("pep.txt", "P1");

    fx.bare_command(&alleles, &peptides)
        .arg("--downloads-bin")
        .arg(&downloads)
        .assert()
        .success();

    assert_eq!(read_rows(&fx.path("allele_pep_flur.csv")).len(), 1);
}

#[cfg(feature = "presentation")]
#[test]
fn presentation_failure_is_fatal() {
    let fx = Fixture::new();
    let alleles = fx.write("allele.txt", "A B");
    let peptides = fx.write("pep.txt", "P1");

    let result = fx
        .command(&alleles, &peptides)
        .env("STUB_UNSUPPORTED", "B")
        .assert()
        .failure();
    assert!(stderr_of(result).contains("Unsupported allele: B"));
    assert_eq!(fs::read_to_string(fx.path("loads.log")).unwrap(), "presentation\n");
}

#[cfg(feature = "presentation")]
#[test]
fn presentation_collapses_repeated_alleles() {
    let fx = Fixture::new();
    let alleles = fx.write("allele.txt", "A B A");
    let peptides = fx.write("pep.txt", "P1 P2");

    fx.command(&alleles, &peptides).assert().success();

    let rows = read_rows(&fx.path("allele_pep_flur.csv"));
    assert_eq!(
        pairs(&rows),
        vec![("P1", "A"), ("P2", "A"), ("P1", "B"), ("P2", "B")]
    );
}
