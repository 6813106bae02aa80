// ============================================================
// Layer 4 - Molecule Dataset
// ============================================================
// Featurized molecules held in memory, in source order.
// Featurization runs on rayon's thread pool; the result
// implements Burn's Dataset so the DataLoader can index it.

use burn::data::dataset::Dataset;
use rayon::prelude::*;

use crate::domain::record::{MoleculeGraphRecord, RawRecord};
use crate::domain::traits::Featurizer;

/// Featurized molecules, in source order.
pub struct MoleculeDataset {
    records: Vec<MoleculeGraphRecord>,
}

impl MoleculeDataset {
    /// Featurize raw records in parallel. Records the featurizer
    /// rejects, and molecules with no atoms, are dropped.
    pub fn featurize<F>(raw: &[RawRecord], featurizer: &F) -> Self
    where
        F: Featurizer<Features = MoleculeGraphRecord> + Sync,
    {
        let records: Vec<MoleculeGraphRecord> = raw
            .par_iter()
            .filter_map(|r| featurizer.gen_features(r))
            .filter(|r| r.num_nodes() > 0)
            .collect();

        let dropped = raw.len() - records.len();
        if dropped > 0 {
            tracing::warn!("Dropped {} of {} molecules during featurization", dropped, raw.len());
        }
        Self { records }
    }

    /// New dataset holding the records at `indices`, in that order
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            records: indices.iter().map(|&i| self.records[i].clone()).collect(),
        }
    }

    pub fn records(&self) -> &[MoleculeGraphRecord] { &self.records }

    pub fn smiles(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.smiles.as_str()).collect()
    }

    pub fn record_count(&self) -> usize { self.records.len() }
}

impl Dataset<MoleculeGraphRecord> for MoleculeDataset {
    fn get(&self, index: usize) -> Option<MoleculeGraphRecord> {
        self.records.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}
