// ============================================================
// Layer 3b - Chemistry
// ============================================================
// Everything that understands molecules rather than tensors:
//
//   smiles.rs       SMILES text  → Molecule (or SmilesError)
//   aromaticity.rs  Kekulé rings → aromatic flags and bonds
//   graph.rs        Molecule     → categorical atom/bond arrays
//   scaffold.rs     Molecule     → Bemis-Murcko scaffold key
//   rings.rs        ring membership and small rings
//   elements.rs     periodic table lookups
//
// No Burn types here. The featurizer in data/ is the only
// consumer of smiles.rs + graph.rs, and the scaffold splitters
// are the only consumer of scaffold.rs.

pub mod aromaticity;
pub mod elements;
pub mod graph;
pub mod rings;
pub mod scaffold;
pub mod smiles;
