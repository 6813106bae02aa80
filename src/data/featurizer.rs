// ============================================================
// Layer 4 - Downstream Featurizer
// ============================================================
// Two steps, matching the two halves of the Featurizer trait:
//
//   gen_features:  RawRecord ──parse──► Molecule ──► MoleculeGraphRecord
//                  (None if the SMILES does not parse)
//
//   collate:       [MoleculeGraphRecord] ──► JoinGraph + labels
//
// Labels arrive in the ternary encoding {-1, 0, +1}. Collation
// remaps them onto [0, 1]
//
//      y' = (y + 1) / 2        -1 → 0.0,  0 → 0.5,  +1 → 1.0
//
// and derives a validity mask (y' != 0.5) so the loss and the
// ROC-AUC can ignore missing labels. The mask is only produced
// here; applying it is the consumer's job.
//
// The mode (supervised or inference) is fixed at construction
// and decides both whether labels are copied and whether label
// matrices are built.

use serde::{Deserialize, Serialize};

use crate::chem::{graph::mol_to_graph_data, smiles::parse_smiles};
use crate::domain::graph::{JoinGraph, MolGraph};
use crate::domain::record::{MoleculeGraphRecord, RawRecord};
use crate::domain::traits::Featurizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeaturizerMode {
    /// Labels are required and collated into label/valid matrices
    Supervised,
    /// Labels are ignored
    Inference,
}

/// Row-major `[rows x cols]` matrix of f32.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f32>,
}

/// Remapped labels and their validity mask, same shape
#[derive(Debug, Clone, PartialEq)]
pub struct BatchLabels {
    pub finetune_label: Matrix,
    pub valid:          Matrix,
}

/// Output of `collate`: the joined graph plus optional labels.
/// `smiles[i]` is the molecule of graph `i` and label row `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct CollatedBatch {
    pub graph:  JoinGraph,
    pub labels: Option<BatchLabels>,
    pub smiles: Vec<String>,
}

pub fn remap_label(y: f32) -> f32 {
    (y + 1.0) / 2.0
}

pub fn valid_flag(remapped: f32) -> f32 {
    if remapped != 0.5 { 1.0 } else { 0.0 }
}

/// Stack per-molecule ternary label vectors into remapped label
/// and validity matrices, one row per molecule in input order.
///
/// # Panics
/// Panics if the label vectors have different lengths.
pub fn stack_labels<'a>(labels: impl IntoIterator<Item = &'a [f32]>) -> BatchLabels {
    let mut rows = 0usize;
    let mut cols: Option<usize> = None;
    let mut finetune_label = Vec::new();
    let mut valid = Vec::new();

    for label in labels {
        let width = *cols.get_or_insert(label.len());
        assert_eq!(
            width,
            label.len(),
            "label width {} in row {} does not match {}",
            label.len(),
            rows,
            width
        );
        for &y in label {
            let remapped = remap_label(y);
            finetune_label.push(remapped);
            valid.push(valid_flag(remapped));
        }
        rows += 1;
    }

    let cols = cols.unwrap_or(0);
    BatchLabels {
        finetune_label: Matrix { rows, cols, data: finetune_label },
        valid:          Matrix { rows, cols, data: valid },
    }
}

#[derive(Debug, Clone)]
pub struct DownstreamFeaturizer {
    mode: FeaturizerMode,
}

impl DownstreamFeaturizer {
    pub fn new(mode: FeaturizerMode) -> Self {
        Self { mode }
    }

    pub fn supervised() -> Self {
        Self::new(FeaturizerMode::Supervised)
    }

    pub fn inference() -> Self {
        Self::new(FeaturizerMode::Inference)
    }
}

impl Featurizer for DownstreamFeaturizer {
    type Features = MoleculeGraphRecord;
    type Batch    = CollatedBatch;

    fn gen_features(&self, raw: &RawRecord) -> Option<MoleculeGraphRecord> {
        let mol = match parse_smiles(&raw.smiles) {
            Ok(mol) => mol,
            Err(e) => {
                tracing::debug!("Dropping '{}': {}", raw.smiles, e);
                return None;
            }
        };

        let label = match self.mode {
            FeaturizerMode::Supervised => match &raw.label {
                Some(label) => Some(label.clone()),
                None => {
                    tracing::debug!("Dropping '{}': no label in supervised mode", raw.smiles);
                    return None;
                }
            },
            FeaturizerMode::Inference => None,
        };

        let data = mol_to_graph_data(&mol);
        Some(MoleculeGraphRecord {
            atom_type:      data.atom_type,
            chirality_tag:  data.chirality_tag,
            edges:          data.edges,
            bond_type:      data.bond_type,
            bond_direction: data.bond_direction,
            label,
            smiles:         raw.smiles.clone(),
        })
    }

    fn collate(&self, batch: &[MoleculeGraphRecord]) -> CollatedBatch {
        assert!(!batch.is_empty(), "cannot collate an empty batch");

        let graphs: Vec<MolGraph> = batch.iter().map(MolGraph::from_record).collect();
        let graph = JoinGraph::join(&graphs);

        let labels = match self.mode {
            FeaturizerMode::Supervised => Some(stack_labels(batch.iter().map(|r| {
                match r.label.as_deref() {
                    Some(label) => label,
                    None => panic!("record '{}' reached supervised collation without a label", r.smiles),
                }
            }))),
            FeaturizerMode::Inference => None,
        };

        CollatedBatch {
            graph,
            labels,
            smiles: batch.iter().map(|r| r.smiles.clone()).collect(),
        }
    }
}
