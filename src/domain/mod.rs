// ============================================================
// Layer 3 - Domain Layer
// ============================================================
// Plain Rust structs and traits that define what the system
// works with: molecules, raw records, per-molecule graph
// records and the joined graph handed to the model.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Everything the featurizer and collator produce is defined
// here, so both can be unit tested without a device.

// Atoms, bonds and their categorical chemistry labels
pub mod molecule;

// Raw SMILES+label input and the featurized graph record
pub mod record;

// Single-molecule graphs and their disjoint union
pub mod graph;

// Core abstractions (traits) that other layers implement
pub mod traits;
