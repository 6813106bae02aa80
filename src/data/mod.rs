// ============================================================
// Layer 4 - Data Pipeline
// ============================================================
// Everything from a MoleculeNet csv to tensor batches.
//
//   csv file
//       │
//       ▼
//   CsvRecordSource      → RawRecord { smiles, ternary labels }
//       │
//       ▼
//   DownstreamFeaturizer → MoleculeGraphRecord (gen_features)
//       │                   bad SMILES dropped
//       ▼
//   MoleculeDataset      → implements Burn's Dataset trait
//       │
//       ▼
//   splitter             → train / valid / test indices
//       │
//       ▼
//   MoleculeBatcher      → collate + GraphWrapper::to_feed
//       │
//       ▼
//   DataLoader           → feeds batches to the finetuning loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// MoleculeNet csv loading and dataset/task metadata
pub mod loader;

/// SMILES → graph record, batch collation, label remapping
pub mod featurizer;

/// Implements Burn's Dataset trait for graph records
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Index, random and scaffold splits
pub mod splitter;
