//! Bin tables and their CSV layout.
//!
//! A table is an ordered list of [`BinRow`]s plus the variables that form its
//! columns. The CSV header is `itar,ihad,<var>_min,<var>_max,...,AUT`; rows keep
//! their insertion order.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::io::{Read, Write};
use std::path::Path;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use ts_core::{Error, Result, SENTINEL_MAX, SENTINEL_MIN, Variable};

/// Constant columns written on every generated row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableDefaults {
    /// Target id.
    pub itar: i32,
    /// Hadron id.
    pub ihad: i32,
    /// Asymmetry written to the `AUT` column.
    #[serde(rename = "AUT")]
    pub aut: f64,
}

impl Default for TableDefaults {
    fn default() -> Self {
        Self { itar: 1, ihad: 1, aut: 0.1 }
    }
}

/// Half-open `[min, max)` bounds of one variable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinBounds {
    /// Inclusive lower bound.
    pub min: f64,
    /// Exclusive upper bound.
    pub max: f64,
}

impl BinBounds {
    /// Bounds of an unconstrained variable.
    pub const UNCONSTRAINED: BinBounds = BinBounds { min: SENTINEL_MIN, max: SENTINEL_MAX };

    /// Midpoint of the bounds.
    pub fn center(&self) -> f64 {
        0.5 * (self.min + self.max)
    }

    /// Whether both bounds are within `tol` of `other`.
    pub fn approx_eq(&self, other: &BinBounds, tol: f64) -> bool {
        (self.min - other.min).abs() <= tol && (self.max - other.max).abs() <= tol
    }
}

// Bounds are compared bit-for-bit so that they can key a hash set.
impl Eq for BinBounds {}

impl Hash for BinBounds {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.min.to_bits().hash(state);
        self.max.to_bits().hash(state);
    }
}

/// One bin definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinRow {
    /// Target id.
    pub itar: i32,
    /// Hadron id.
    pub ihad: i32,
    /// Constrained variables. Anything absent is unconstrained.
    pub bounds: BTreeMap<Variable, BinBounds>,
    /// Asymmetry value.
    pub aut: f64,
}

impl BinRow {
    /// An unconstrained row carrying the default constants.
    pub fn new(defaults: &TableDefaults) -> Self {
        Self { itar: defaults.itar, ihad: defaults.ihad, bounds: BTreeMap::new(), aut: defaults.aut }
    }

    /// Set the bounds of `variable`.
    pub fn with_bounds(mut self, variable: Variable, min: f64, max: f64) -> Self {
        self.bounds.insert(variable, BinBounds { min, max });
        self
    }

    /// Bounds of `variable`, or the sentinels when unconstrained.
    pub fn bounds(&self, variable: Variable) -> BinBounds {
        self.bounds.get(&variable).copied().unwrap_or(BinBounds::UNCONSTRAINED)
    }
}

/// Distinct bin over a set of grid variables.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BinKey(pub Vec<BinBounds>);

/// Ordered list of bin rows with a fixed column set.
#[derive(Debug, Clone, PartialEq)]
pub struct BinTable {
    variables: Vec<Variable>,
    rows: Vec<BinRow>,
}

impl Default for BinTable {
    fn default() -> Self {
        Self::new(Variable::DEFAULT_TABLE.to_vec())
    }
}

impl BinTable {
    /// Empty table with the given columns (deduplicated, canonical order).
    pub fn new(mut variables: Vec<Variable>) -> Self {
        variables.sort();
        variables.dedup();
        Self { variables, rows: Vec::new() }
    }

    /// Append a row. Variables the row constrains that are not yet columns
    /// are added as columns.
    pub fn push(&mut self, row: BinRow) {
        let mut added = false;
        for var in row.bounds.keys() {
            if !self.variables.contains(var) {
                self.variables.push(*var);
                added = true;
            }
        }
        if added {
            self.variables.sort();
        }
        self.rows.push(row);
    }

    /// Column variables, in canonical order.
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// All rows; position is the bin index.
    pub fn rows(&self) -> &[BinRow] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// CSV header for this column set.
    pub fn header(&self) -> Vec<String> {
        let mut header = vec!["itar".to_string(), "ihad".to_string()];
        for v in &self.variables {
            header.push(v.min_column());
            header.push(v.max_column());
        }
        header.push("AUT".to_string());
        header
    }

    /// Write the table as CSV to any writer.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(self.header())?;
        for row in &self.rows {
            let mut record = vec![row.itar.to_string(), row.ihad.to_string()];
            for v in &self.variables {
                let b = row.bounds(*v);
                record.push(format!("{}", b.min));
                record.push(format!("{}", b.max));
            }
            record.push(format!("{}", row.aut));
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Write the table as CSV to `path`.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        self.write_to(file)?;
        log::info!("wrote {} bins to {}", self.len(), path.display());
        Ok(())
    }

    /// Render the table as a CSV string.
    pub fn to_csv_string(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        String::from_utf8(buf).map_err(|e| Error::Computation(format!("CSV is not UTF-8: {e}")))
    }

    /// Parse a table from CSV. Columns are located by name; unknown columns are
    /// ignored and a variable becomes a column when both its `_min` and `_max`
    /// columns are present.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr =
            csv::ReaderBuilder::new().has_headers(true).trim(csv::Trim::All).from_reader(reader);
        let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
        let find = |name: &str| headers.iter().position(|h| h == name);
        let require = |name: &str| {
            find(name).ok_or_else(|| Error::Validation(format!("bin table is missing column '{name}'")))
        };

        let itar_col = require("itar")?;
        let ihad_col = require("ihad")?;
        let aut_col = require("AUT")?;
        let var_cols: Vec<(Variable, usize, usize)> = Variable::ALL
            .into_iter()
            .filter_map(|v| Some((v, find(&v.min_column())?, find(&v.max_column())?)))
            .collect();

        let mut table = Self::new(var_cols.iter().map(|(v, _, _)| *v).collect());
        for (line, record) in rdr.records().enumerate() {
            let record = record?;
            let float = |col: usize| -> Result<f64> {
                let s = record.get(col).ok_or_else(|| {
                    Error::Validation(format!("bin table row {line}: missing field {col}"))
                })?;
                s.parse::<f64>().map_err(|_| {
                    Error::Validation(format!("bin table row {line}: '{s}' is not a number"))
                })
            };
            // Ids are sometimes written as floats ("1.0").
            let int = |col: usize| -> Result<i32> {
                let f = float(col)?;
                if f.fract() != 0.0 || f < i32::MIN as f64 || f > i32::MAX as f64 {
                    return Err(Error::Validation(format!(
                        "bin table row {line}: id {f} is not an integer"
                    )));
                }
                Ok(f as i32)
            };

            let mut row = BinRow {
                itar: int(itar_col)?,
                ihad: int(ihad_col)?,
                bounds: BTreeMap::new(),
                aut: float(aut_col)?,
            };
            for &(v, lo, hi) in &var_cols {
                let b = BinBounds { min: float(lo)?, max: float(hi)? };
                if b != BinBounds::UNCONSTRAINED {
                    row.bounds.insert(v, b);
                }
            }
            table.rows.push(row);
        }
        Ok(table)
    }

    /// Read a table from a CSV file.
    pub fn read_csv(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Distinct bins over `grid`, in first-seen order.
    ///
    /// Only the injection grid variables (`X`, `Q`, `Z`, `PhPerp`) are allowed.
    pub fn unique_bins(&self, grid: &[Variable]) -> Result<Vec<BinKey>> {
        validate_grid(grid)?;
        let keys: IndexSet<BinKey> =
            self.rows.iter().map(|row| BinKey(grid.iter().map(|v| row.bounds(*v)).collect())).collect();
        Ok(keys.into_iter().collect())
    }
}

/// Check that every grid variable is one injections can be gridded over.
pub fn validate_grid(grid: &[Variable]) -> Result<()> {
    if grid.is_empty() {
        return Err(Error::Validation("grid must name at least one variable".into()));
    }
    let invalid: Vec<String> = grid
        .iter()
        .filter(|v| !Variable::INJECTION_GRID.contains(*v))
        .map(|v| v.to_string())
        .collect();
    if !invalid.is_empty() {
        let allowed: Vec<String> = Variable::INJECTION_GRID.iter().map(|v| v.to_string()).collect();
        return Err(Error::Validation(format!(
            "invalid grid variables: {} (allowed: {})",
            invalid.join(", "),
            allowed.join(", ")
        )));
    }
    Ok(())
}
