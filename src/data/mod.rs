/// Data layer: input parsing, the result table, and the CSV sink.
///
/// Architecture:
/// ```text
///  alleles.txt   peptides.txt
///        │            │
///        ▼            ▼
///   ┌──────────────────────┐
///   │        input         │  split text → Vec<Allele>, Vec<Peptide>
///   └──────────────────────┘
///              │
///              ▼   (predictor fan-out, see `executor`)
///   ┌──────────────────────┐
///   │        model         │  ResultTable, PredictionRow, CellValue
///   └──────────────────────┘
///              │
///              ▼
///   ┌──────────────────────┐
///   │        output        │  derive <alleles>_<peptides>_flur.csv, write CSV
///   └──────────────────────┘
/// ```

pub mod input;
pub mod model;
pub mod output;
