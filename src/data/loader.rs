// ============================================================
// Layer 4 - Dataset Loader
// ============================================================
// Reads MoleculeNet-style csv files into RawRecords.
//
// A MoleculeNet csv has one smiles column plus one column per
// task. Task cells hold 1 (positive), 0 (negative) or nothing
// (missing). They are converted to the ternary encoding the
// featurizer expects:
//
//   1  → +1.0
//   0  → -1.0
//   "" →  0.0   (missing)
//
// The data path may point at the csv itself, at a directory
// holding it, or at a directory with a `raw/` sub-directory
// (the layout the MoleculeNet archives unpack to).

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use crate::domain::record::RawRecord;
use crate::domain::traits::RecordSource;

// ─── DatasetName ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetName {
    Bace,
    Bbbp,
    Clintox,
    Hiv,
    Muv,
    Sider,
    Tox21,
    Toxcast,
}

impl DatasetName {
    pub const ALL: [DatasetName; 8] = [
        Self::Bace,
        Self::Bbbp,
        Self::Clintox,
        Self::Hiv,
        Self::Muv,
        Self::Sider,
        Self::Tox21,
        Self::Toxcast,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bace    => "bace",
            Self::Bbbp    => "bbbp",
            Self::Clintox => "clintox",
            Self::Hiv     => "hiv",
            Self::Muv     => "muv",
            Self::Sider   => "sider",
            Self::Tox21   => "tox21",
            Self::Toxcast => "toxcast",
        }
    }

    /// Column holding the SMILES string
    pub fn smiles_column(self) -> &'static str {
        match self {
            Self::Bace => "mol",
            _          => "smiles",
        }
    }

    /// Fixed task columns. `None` means every column except the
    /// smiles column is a task (sider, toxcast).
    pub fn fixed_tasks(self) -> Option<&'static [&'static str]> {
        match self {
            Self::Bace    => Some(&["Class"]),
            Self::Bbbp    => Some(&["p_np"]),
            Self::Clintox => Some(&["FDA_APPROVED", "CT_TOX"]),
            Self::Hiv     => Some(&["HIV_active"]),
            Self::Muv     => Some(&[
                "MUV-466", "MUV-548", "MUV-600", "MUV-644", "MUV-652", "MUV-689",
                "MUV-692", "MUV-712", "MUV-713", "MUV-733", "MUV-737", "MUV-810",
                "MUV-832", "MUV-846", "MUV-852", "MUV-858", "MUV-859",
            ]),
            Self::Tox21   => Some(&[
                "NR-AR", "NR-AR-LBD", "NR-AhR", "NR-Aromatase", "NR-ER", "NR-ER-LBD",
                "NR-PPAR-gamma", "SR-ARE", "SR-ATAD5", "SR-HSE", "SR-MMP", "SR-p53",
            ]),
            Self::Sider | Self::Toxcast => None,
        }
    }

    /// Task names for this dataset given the csv header
    pub fn task_names(self, header: &[String]) -> Vec<String> {
        match self.fixed_tasks() {
            Some(tasks) => tasks.iter().map(|t| t.to_string()).collect(),
            None => header
                .iter()
                .filter(|h| h.as_str() != self.smiles_column())
                .cloned()
                .collect(),
        }
    }
}

impl fmt::Display for DatasetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetName {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|d| d.as_str() == s.to_ascii_lowercase())
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|d| d.as_str()).collect();
                format!("unknown dataset '{s}', expected one of: {}", names.join(", "))
            })
    }
}

// ─── Path resolution ──────────────────────────────────────────────────────────
/// Locate the csv for a data path: the path itself if it is a
/// file, else the first `*.csv` (by name) in `<path>/raw` or `<path>`.
pub fn resolve_csv_path(data_path: &Path) -> Result<PathBuf> {
    if data_path.is_file() {
        return Ok(data_path.to_path_buf());
    }

    for dir in [data_path.join("raw"), data_path.to_path_buf()] {
        if !dir.is_dir() {
            continue;
        }
        let mut csvs: Vec<PathBuf> = fs::read_dir(&dir)
            .with_context(|| format!("Cannot read directory '{}'", dir.display()))?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("csv"))
            .collect();
        csvs.sort();
        if let Some(first) = csvs.into_iter().next() {
            return Ok(first);
        }
    }

    bail!("No csv file found at '{}'", data_path.display())
}

fn read_header(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Cannot open '{}'", path.display()))?;
    Ok(reader.headers()?.iter().map(|h| h.trim().to_string()).collect())
}

/// Task names of a dataset, reading the csv header when the
/// dataset has no fixed task list.
pub fn get_task_names(name: DatasetName, data_path: &Path) -> Result<Vec<String>> {
    let csv_path = resolve_csv_path(data_path)?;
    let header = read_header(&csv_path)?;
    Ok(name.task_names(&header))
}

/// Convert one task cell to the ternary label encoding
pub fn parse_label_cell(cell: &str) -> Result<f32> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Ok(0.0);
    }
    let v: f32 = cell
        .parse()
        .with_context(|| format!("Invalid label value '{cell}'"))?;
    Ok(if v == 0.0 { -1.0 } else { v })
}

// ─── CsvRecordSource ──────────────────────────────────────────────────────────
/// Loads RawRecords from a csv file.
/// With `task_names` set, every row gets a label vector in that
/// column order; without, rows are unlabelled (prediction input).
pub struct CsvRecordSource {
    path:          PathBuf,
    smiles_column: String,
    task_names:    Option<Vec<String>>,
}

impl CsvRecordSource {
    pub fn labelled(path: impl Into<PathBuf>, smiles_column: impl Into<String>, task_names: Vec<String>) -> Self {
        Self {
            path:          path.into(),
            smiles_column: smiles_column.into(),
            task_names:    Some(task_names),
        }
    }

    pub fn unlabelled(path: impl Into<PathBuf>, smiles_column: impl Into<String>) -> Self {
        Self {
            path:          path.into(),
            smiles_column: smiles_column.into(),
            task_names:    None,
        }
    }

    /// Source for one of the MoleculeNet datasets
    pub fn for_dataset(name: DatasetName, data_path: &Path, task_names: Vec<String>) -> Result<Self> {
        let path = resolve_csv_path(data_path)?;
        Ok(Self::labelled(path, name.smiles_column(), task_names))
    }
}

fn column_index(header: &[String], column: &str, path: &Path) -> Result<usize> {
    header
        .iter()
        .position(|h| h == column)
        .with_context(|| format!("Column '{}' not found in '{}'", column, path.display()))
}

impl RecordSource for CsvRecordSource {
    fn load_all(&self) -> Result<Vec<RawRecord>> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)
            .with_context(|| format!("Cannot open '{}'", self.path.display()))?;

        let header: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
        let smiles_idx = column_index(&header, &self.smiles_column, &self.path)?;
        let task_idx: Option<Vec<usize>> = self
            .task_names
            .as_ref()
            .map(|tasks| {
                tasks
                    .iter()
                    .map(|t| column_index(&header, t, &self.path))
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?;

        let mut records = Vec::new();
        for (row, result) in reader.records().enumerate() {
            let line = row + 2;
            let rec = result.with_context(|| format!("{}:{}", self.path.display(), line))?;
            let smiles = rec.get(smiles_idx).unwrap_or("").trim().to_string();

            let label = match &task_idx {
                Some(idx) => Some(
                    idx.iter()
                        .map(|&i| parse_label_cell(rec.get(i).unwrap_or("")))
                        .collect::<Result<Vec<f32>>>()
                        .with_context(|| format!("{}:{}", self.path.display(), line))?,
                ),
                None => None,
            };
            records.push(RawRecord { smiles, label });
        }

        tracing::info!("Loaded {} records from '{}'", records.len(), self.path.display());
        Ok(records)
    }
}

/// Load every record of a MoleculeNet dataset with its task labels
pub fn load_raw_records(name: DatasetName, data_path: &Path, task_names: &[String]) -> Result<Vec<RawRecord>> {
    CsvRecordSource::for_dataset(name, data_path, task_names.to_vec())?.load_all()
}
