// ============================================================
// Layer 3 - Core Traits (Abstractions)
// ============================================================
// The seams of the pipeline:
//
//   RecordSource   - anything that yields raw SMILES records
//   Featurizer     - raw record -> graph record, and a batch of
//                    graph records -> joined graph + labels
//   GraphFeeder    - join graph -> framework-native feed
//
// The training loop only sees these traits, so a different
// featurizer variant (another label policy, another graph
// layout) plugs in by implementing Featurizer.

use anyhow::Result;

use crate::domain::graph::JoinGraph;
use crate::domain::record::RawRecord;

// ─── RecordSource ─────────────────────────────────────────────────────────────
/// Any component that can load raw molecule records.
///
/// Implementations:
///   - CsvRecordSource → MoleculeNet-style csv files
pub trait RecordSource {
    /// Load every record, in file order.
    fn load_all(&self) -> Result<Vec<RawRecord>>;
}

// ─── Featurizer ───────────────────────────────────────────────────────────────
/// Converts raw records into per-molecule features, and
/// collates a batch of those into one joined batch.
pub trait Featurizer {
    /// Per-molecule output of `gen_features`
    type Features;

    /// Per-batch output of `collate`
    type Batch;

    /// Featurize one record. `None` means "drop this record":
    /// the SMILES could not be parsed, or a required label is
    /// missing. Never panics on bad input.
    fn gen_features(&self, raw: &RawRecord) -> Option<Self::Features>;

    /// Collate a non-empty, ordered batch. Output rows follow
    /// input order.
    fn collate(&self, batch: &[Self::Features]) -> Self::Batch;
}

// ─── GraphFeeder ──────────────────────────────────────────────────────────────
/// Turns a join graph into whatever the model consumes.
///
/// Implementations:
///   - GraphWrapper<B> → Burn tensors on a device
pub trait GraphFeeder {
    type Feed;

    fn to_feed(&self, graph: &JoinGraph) -> Self::Feed;
}
