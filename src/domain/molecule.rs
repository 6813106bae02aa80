// ============================================================
// Layer 3 - Molecule Domain Type
// ============================================================
// The in-memory molecule produced by the SMILES parser.
// Atoms are stored in the order they appear in the SMILES
// string; bonds reference atoms by index.
//
// Only the information the featurizer and the scaffold
// splitter need is kept: element, aromaticity, chirality,
// charge and bond order/direction. Coordinates are never
// computed.

use serde::{Deserialize, Serialize};

/// Tetrahedral chirality as written in SMILES.
/// `@` is counter-clockwise, `@@` is clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ChiralTag {
    #[default]
    Unspecified,
    Clockwise,
    CounterClockwise,
    Other,
}

impl ChiralTag {
    /// Position in the chirality vocabulary fed to the model
    pub fn index(self) -> i64 {
        match self {
            Self::Unspecified      => 0,
            Self::Clockwise        => 1,
            Self::CounterClockwise => 2,
            Self::Other            => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BondType {
    Single,
    Double,
    Triple,
    Aromatic,
}

impl BondType {
    /// Position in the bond type vocabulary fed to the model
    pub fn index(self) -> i64 {
        match self {
            Self::Single   => 0,
            Self::Double   => 1,
            Self::Triple   => 2,
            Self::Aromatic => 3,
        }
    }

    /// Contribution to the valence of either endpoint.
    /// Aromatic bonds count as one; the other half comes from
    /// the kekulé partner, which we never resolve.
    pub fn valence(self) -> u32 {
        match self {
            Self::Single | Self::Aromatic => 1,
            Self::Double                  => 2,
            Self::Triple                  => 3,
        }
    }
}

/// Cis/trans direction markers (`/` and `\`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BondDirection {
    #[default]
    None,
    EndUpRight,
    EndDownRight,
}

impl BondDirection {
    pub fn index(self) -> i64 {
        match self {
            Self::None         => 0,
            Self::EndUpRight   => 1,
            Self::EndDownRight => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    /// Atomic number, 1..=118. Zero is the `*` wildcard.
    pub atomic_num:    u8,
    /// Mass number written in brackets, e.g. 13 in `[13C]`
    pub isotope:       Option<u16>,
    pub aromatic:      bool,
    pub chirality:     ChiralTag,
    pub formal_charge: i8,
    /// Hydrogen count written inside brackets, e.g. `[NH4+]`.
    /// `None` for organic-subset atoms, whose hydrogens are implicit.
    pub explicit_h:    Option<u8>,
    /// True if the atom was written in bracket form
    pub bracket:       bool,
}

impl Atom {
    pub fn organic(atomic_num: u8, aromatic: bool) -> Self {
        Self {
            atomic_num,
            isotope:       None,
            aromatic,
            chirality:     ChiralTag::Unspecified,
            formal_charge: 0,
            explicit_h:    None,
            bracket:       false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bond {
    pub begin:     usize,
    pub end:       usize,
    pub bond_type: BondType,
    pub direction: BondDirection,
}

impl Bond {
    /// The atom at the other end of this bond, if `atom` is one of its ends
    pub fn other(&self, atom: usize) -> Option<usize> {
        if self.begin == atom {
            Some(self.end)
        } else if self.end == atom {
            Some(self.begin)
        } else {
            None
        }
    }
}

/// A parsed molecule: heavy atoms plus explicit bonds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Molecule {
    pub atoms: Vec<Atom>,
    pub bonds: Vec<Bond>,
}

impl Molecule {
    pub fn num_atoms(&self) -> usize {
        self.atoms.len()
    }

    pub fn num_bonds(&self) -> usize {
        self.bonds.len()
    }

    /// Neighbour lists, one per atom, in bond order
    pub fn adjacency(&self) -> Vec<Vec<usize>> {
        let mut adj = vec![Vec::new(); self.atoms.len()];
        for b in &self.bonds {
            adj[b.begin].push(b.end);
            adj[b.end].push(b.begin);
        }
        adj
    }

    #[cfg(test)]
    pub fn find_bond(&self, a: usize, b: usize) -> Option<&Bond> {
        self.bonds
            .iter()
            .find(|bd| (bd.begin == a && bd.end == b) || (bd.begin == b && bd.end == a))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocab_indices_are_dense() {
        let chir: Vec<i64> = [
            ChiralTag::Unspecified,
            ChiralTag::Clockwise,
            ChiralTag::CounterClockwise,
            ChiralTag::Other,
        ]
        .iter()
        .map(|c| c.index())
        .collect();
        assert_eq!(chir, vec![0, 1, 2, 3]);

        let bt: Vec<i64> = [BondType::Single, BondType::Double, BondType::Triple, BondType::Aromatic]
            .iter()
            .map(|b| b.index())
            .collect();
        assert_eq!(bt, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_adjacency_is_symmetric() {
        let mol = Molecule {
            atoms: vec![Atom::organic(6, false); 3],
            bonds: vec![
                Bond { begin: 0, end: 1, bond_type: BondType::Single, direction: BondDirection::None },
                Bond { begin: 1, end: 2, bond_type: BondType::Double, direction: BondDirection::None },
            ],
        };
        let adj = mol.adjacency();
        assert_eq!(adj[0], vec![1]);
        assert_eq!(adj[1], vec![0, 2]);
        assert_eq!(adj[2], vec![1]);
        assert_eq!(mol.find_bond(2, 1).map(|b| b.bond_type), Some(BondType::Double));
        assert!(mol.find_bond(0, 2).is_none());
    }
}
