use std::io::Read;

// ---------------------------------------------------------------------------
// CellValue – typed view of a single predictor cell
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value mirroring common Pandas dtypes.
///
/// Tables keep the predictor's raw text so the CSV sink can write it back
/// verbatim; `CellValue` is only built on demand when the driver needs to
/// look at a cell (e.g. to count missing predictions).
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl CellValue {
    /// Guess the type of a raw CSV cell the way `pandas.read_csv` would.
    pub fn parse(s: &str) -> Self {
        if s.is_empty() {
            return CellValue::Null;
        }
        match s {
            "NaN" | "nan" | "NA" | "N/A" | "null" | "None" => return CellValue::Null,
            "True" | "true" => return CellValue::Bool(true),
            "False" | "false" => return CellValue::Bool(false),
            _ => {}
        }
        if let Ok(i) = s.parse::<i64>() {
            return CellValue::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return CellValue::Float(f);
        }
        CellValue::String(s.to_string())
    }

    /// Whether the cell holds no usable value (empty, null-like or NaN).
    pub fn is_missing(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Float(f) => f.is_nan(),
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// PredictionRow – one row of a predictor frame
// ---------------------------------------------------------------------------

/// One predictor row; cells are positional and follow the owning table's
/// column order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PredictionRow {
    pub cells: Vec<String>,
}

impl PredictionRow {
    pub fn new<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PredictionRow {
            cells: cells.into_iter().map(Into::into).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// ResultTable – the assembled prediction frame
// ---------------------------------------------------------------------------

/// An ordered set of prediction rows sharing one column schema.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultTable {
    /// Column names in predictor order.
    pub columns: Vec<String>,
    /// Rows, each with exactly `columns.len()` cells.
    pub rows: Vec<PredictionRow>,
}

impl ResultTable {
    /// A table with a schema and no rows.
    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ResultTable {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row. Short rows are padded with empty cells and long rows are
    /// truncated so the table stays rectangular.
    pub fn push_row(&mut self, mut row: PredictionRow) {
        row.cells.resize(self.columns.len(), String::new());
        self.rows.push(row);
    }

    /// Decode a predictor frame from CSV with a header row.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, csv::Error> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut table = ResultTable {
            columns,
            rows: Vec::new(),
        };
        for record in reader.records() {
            let record = record?;
            table.push_row(PredictionRow::new(record.iter()));
        }
        Ok(table)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Typed view of the cell at (`row`, `column`).
    pub fn value(&self, row: usize, column: &str) -> Option<CellValue> {
        let col = self.column_index(column)?;
        let cell = self.rows.get(row)?.cells.get(col)?;
        Some(CellValue::parse(cell))
    }

    /// Number of rows with at least one missing cell.
    pub fn rows_with_missing(&self) -> usize {
        self.rows
            .iter()
            .filter(|row| row.cells.iter().any(|c| CellValue::parse(c).is_missing()))
            .count()
    }

    /// Row-wise concatenation with `pandas.concat` semantics: the result
    /// schema is the union of all columns in first-appearance order, and
    /// cells for columns a frame lacks are left empty. Frames that share one
    /// schema are appended unchanged.
    pub fn concat(frames: Vec<ResultTable>) -> ResultTable {
        let mut columns: Vec<String> = Vec::new();
        for frame in &frames {
            for col in &frame.columns {
                if !columns.contains(col) {
                    columns.push(col.clone());
                }
            }
        }

        let mut out = ResultTable {
            columns,
            rows: Vec::with_capacity(frames.iter().map(ResultTable::len).sum()),
        };
        for frame in frames {
            if frame.columns == out.columns {
                out.rows.extend(frame.rows);
                continue;
            }
            // Map each output column to its position in this frame, if any.
            let positions: Vec<Option<usize>> = out
                .columns
                .iter()
                .map(|col| frame.column_index(col))
                .collect();
            for row in frame.rows {
                let cells = positions
                    .iter()
                    .map(|pos| {
                        pos.and_then(|i| row.cells.get(i).cloned())
                            .unwrap_or_default()
                    })
                    .collect();
                out.rows.push(PredictionRow { cells });
            }
        }
        out
    }
}
