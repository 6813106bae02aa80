// ============================================================
// Layer 3b - SMILES Parser
// ============================================================
// SMILES text → Molecule, in a single left-to-right pass.
// Each atom bonds to the "current" atom; `(` saves the current
// atom and `)` restores it; ring closure digits pair atoms that
// are far apart in the string.
//
// After the pass:
//   1. plain `[H]` atoms with one heavy neighbour are folded
//      into that neighbour
//   2. aromatic flags are checked against ring membership
//   3. aliphatic organic-subset atoms are checked for valence
//   4. Kekulé-written aromatic rings are perceived as aromatic
//
// Anything that fails is a SmilesError; callers that only care
// about "usable or not" map it to None.

use std::{
    collections::HashMap,
    iter::Peekable,
    str::CharIndices,
};

use thiserror::Error;

use crate::chem::{aromaticity, elements, rings};
use crate::domain::molecule::{Atom, Bond, BondDirection, BondType, ChiralTag, Molecule};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SmilesError {
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("unexpected end of input")]
    UnexpectedEnd,

    #[error("unmatched ')' at position {0}")]
    UnmatchedClose(usize),

    #[error("branch opened with '(' is never closed")]
    UnclosedBranch,

    #[error("ring bond {0} is never closed")]
    UnclosedRing(u32),

    #[error("ring bond {ring} at position {pos} has no preceding atom")]
    RingWithoutAtom { ring: u32, pos: usize },

    #[error("ring bond {0} closes on the atom that opened it")]
    RingSelfBond(u32),

    #[error("ring bond {0} has conflicting bond symbols")]
    RingBondConflict(u32),

    #[error("atoms {0} and {1} are bonded twice")]
    DuplicateBond(usize, usize),

    #[error("bond symbol at position {0} has no preceding atom")]
    BondWithoutAtom(usize),

    #[error("bond symbol at position {0} is not followed by an atom")]
    DanglingBond(usize),

    #[error("bracket atom at position {0} is not terminated")]
    UnterminatedBracket(usize),

    #[error("unknown element '{0}'")]
    UnknownElement(String),

    #[error("non-ring atom {0} marked aromatic")]
    NonRingAromatic(usize),

    #[error("atom {index} ({symbol}) has valence {valence}, more than the allowed {max}")]
    Valence { index: usize, symbol: &'static str, valence: u32, max: u32 },
}

pub type Result<T> = std::result::Result<T, SmilesError>;

/// Parse a SMILES string. Anything after the first whitespace is treated
/// as a title and ignored. An empty string yields an empty molecule.
pub fn parse_smiles(smiles: &str) -> Result<Molecule> {
    let body = smiles.split_whitespace().next().unwrap_or("");

    let mut parser = Parser::new(body);
    parser.run()?;
    let mut mol = parser.finish()?;

    remove_plain_hydrogens(&mut mol);
    check_aromaticity(&mut mol)?;
    check_valence(&mol)?;
    aromaticity::perceive_aromaticity(&mut mol);
    Ok(mol)
}

#[derive(Debug, Clone, Copy)]
struct PendingBond {
    bond_type: BondType,
    direction: BondDirection,
    pos:       usize,
}

#[derive(Debug, Clone, Copy)]
struct RingOpen {
    atom: usize,
    bond: Option<PendingBond>,
}

struct Parser<'a> {
    chars:    Peekable<CharIndices<'a>>,
    atoms:    Vec<Atom>,
    bonds:    Vec<Bond>,
    current:  Option<usize>,
    pending:  Option<PendingBond>,
    branches: Vec<usize>,
    rings:    HashMap<u32, RingOpen>,
}

impl<'a> Parser<'a> {
    fn new(s: &'a str) -> Self {
        Self {
            chars:    s.char_indices().peekable(),
            atoms:    Vec::new(),
            bonds:    Vec::new(),
            current:  None,
            pending:  None,
            branches: Vec::new(),
            rings:    HashMap::new(),
        }
    }

    fn run(&mut self) -> Result<()> {
        while let Some(&(pos, ch)) = self.chars.peek() {
            match ch {
                '-' | '=' | '#' | ':' | '/' | '\\' => {
                    self.chars.next();
                    self.bond_symbol(ch, pos)?;
                }
                '(' => {
                    self.chars.next();
                    let cur = self.current.ok_or(SmilesError::UnexpectedChar { ch, pos })?;
                    if let Some(p) = self.pending {
                        return Err(SmilesError::DanglingBond(p.pos));
                    }
                    self.branches.push(cur);
                }
                ')' => {
                    self.chars.next();
                    if let Some(p) = self.pending.take() {
                        return Err(SmilesError::DanglingBond(p.pos));
                    }
                    let prev = self.branches.pop().ok_or(SmilesError::UnmatchedClose(pos))?;
                    self.current = Some(prev);
                }
                '.' => {
                    self.chars.next();
                    if let Some(p) = self.pending.take() {
                        return Err(SmilesError::DanglingBond(p.pos));
                    }
                    if !self.branches.is_empty() {
                        return Err(SmilesError::UnexpectedChar { ch, pos });
                    }
                    self.current = None;
                }
                '%' => {
                    self.chars.next();
                    let hi = self.digit()?;
                    let lo = self.digit()?;
                    self.ring_closure(hi * 10 + lo, pos)?;
                }
                '0'..='9' => {
                    self.chars.next();
                    self.ring_closure(ch as u32 - '0' as u32, pos)?;
                }
                '[' => {
                    let atom = self.bracket_atom(pos)?;
                    self.add_atom(atom);
                }
                _ => {
                    let atom = self.organic_atom(ch, pos)?;
                    self.add_atom(atom);
                }
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<Molecule> {
        if let Some(p) = self.pending {
            return Err(SmilesError::DanglingBond(p.pos));
        }
        if !self.branches.is_empty() {
            return Err(SmilesError::UnclosedBranch);
        }
        if let Some(&ring) = self.rings.keys().min() {
            return Err(SmilesError::UnclosedRing(ring));
        }
        Ok(Molecule { atoms: self.atoms, bonds: self.bonds })
    }

    fn digit(&mut self) -> Result<u32> {
        match self.chars.next() {
            Some((_, c)) if c.is_ascii_digit() => Ok(c as u32 - '0' as u32),
            Some((pos, ch)) => Err(SmilesError::UnexpectedChar { ch, pos }),
            None => Err(SmilesError::UnexpectedEnd),
        }
    }

    fn bond_symbol(&mut self, ch: char, pos: usize) -> Result<()> {
        if self.current.is_none() {
            return Err(SmilesError::BondWithoutAtom(pos));
        }
        if self.pending.is_some() {
            return Err(SmilesError::UnexpectedChar { ch, pos });
        }
        let (bond_type, direction) = match ch {
            '=' => (BondType::Double, BondDirection::None),
            '#' => (BondType::Triple, BondDirection::None),
            ':' => (BondType::Aromatic, BondDirection::None),
            '/' => (BondType::Single, BondDirection::EndUpRight),
            '\\' => (BondType::Single, BondDirection::EndDownRight),
            _ => (BondType::Single, BondDirection::None),
        };
        self.pending = Some(PendingBond { bond_type, direction, pos });
        Ok(())
    }

    fn implicit_bond(&self, a: usize, b: usize) -> BondType {
        if self.atoms[a].aromatic && self.atoms[b].aromatic {
            BondType::Aromatic
        } else {
            BondType::Single
        }
    }

    fn add_atom(&mut self, atom: Atom) {
        let idx = self.atoms.len();
        self.atoms.push(atom);

        if let Some(prev) = self.current {
            let (bond_type, direction) = match self.pending.take() {
                Some(p) => (p.bond_type, p.direction),
                None => (self.implicit_bond(prev, idx), BondDirection::None),
            };
            self.bonds.push(Bond { begin: prev, end: idx, bond_type, direction });
        }
        self.current = Some(idx);
    }

    fn ring_closure(&mut self, ring: u32, pos: usize) -> Result<()> {
        let cur = self.current.ok_or(SmilesError::RingWithoutAtom { ring, pos })?;
        let bond = self.pending.take();

        let Some(open) = self.rings.remove(&ring) else {
            self.rings.insert(ring, RingOpen { atom: cur, bond });
            return Ok(());
        };

        if open.atom == cur {
            return Err(SmilesError::RingSelfBond(ring));
        }
        let exists = self.bonds.iter().any(|b| {
            (b.begin == open.atom && b.end == cur) || (b.begin == cur && b.end == open.atom)
        });
        if exists {
            return Err(SmilesError::DuplicateBond(open.atom.min(cur), open.atom.max(cur)));
        }

        let (bond_type, direction) = match (open.bond, bond) {
            (Some(a), Some(b)) if a.bond_type != b.bond_type => {
                return Err(SmilesError::RingBondConflict(ring));
            }
            (Some(p), _) | (None, Some(p)) => (p.bond_type, p.direction),
            (None, None) => (self.implicit_bond(open.atom, cur), BondDirection::None),
        };
        self.bonds.push(Bond { begin: open.atom, end: cur, bond_type, direction });
        Ok(())
    }

    /// Organic-subset atom, written without brackets
    fn organic_atom(&mut self, ch: char, pos: usize) -> Result<Atom> {
        self.chars.next();
        let (z, aromatic) = match ch {
            'B' => {
                if self.next_is('r') {
                    (35, false)
                } else {
                    (5, false)
                }
            }
            'C' => {
                if self.next_is('l') {
                    (17, false)
                } else {
                    (6, false)
                }
            }
            'N' => (7, false),
            'O' => (8, false),
            'P' => (15, false),
            'S' => (16, false),
            'F' => (9, false),
            'I' => (53, false),
            'b' => (5, true),
            'c' => (6, true),
            'n' => (7, true),
            'o' => (8, true),
            'p' => (15, true),
            's' => (16, true),
            '*' => (0, false),
            _ => return Err(SmilesError::UnexpectedChar { ch, pos }),
        };
        Ok(Atom::organic(z, aromatic))
    }

    /// Consume `expected` if it is the next character
    fn next_is(&mut self, expected: char) -> bool {
        if self.chars.peek().map(|&(_, c)| c) == Some(expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn read_number(&mut self) -> Option<u32> {
        let mut value: Option<u32> = None;
        while let Some(c) = self.peek_char().filter(|c| c.is_ascii_digit()) {
            self.chars.next();
            value = Some(value.unwrap_or(0).saturating_mul(10).saturating_add(c as u32 - '0' as u32));
        }
        value
    }

    /// `[isotope? symbol chirality? hcount? charge? class?]`
    fn bracket_atom(&mut self, start: usize) -> Result<Atom> {
        self.chars.next(); // '['

        let isotope = self.read_number().map(|v| v.min(u16::MAX as u32) as u16);
        let (atomic_num, aromatic) = self.bracket_symbol(start)?;

        let mut chirality = ChiralTag::Unspecified;
        if self.next_is('@') {
            chirality = if self.next_is('@') {
                ChiralTag::Clockwise
            } else if matches!(self.peek_char(), Some('T' | 'A' | 'S' | 'O')) {
                // @TH1, @SP2, @OH15 ...: only the class, not the permutation
                self.chars.next();
                self.chars.next();
                self.read_number();
                ChiralTag::Other
            } else {
                ChiralTag::CounterClockwise
            };
        }

        let mut explicit_h = 0u8;
        if self.next_is('H') {
            explicit_h = self.read_number().unwrap_or(1).min(u8::MAX as u32) as u8;
        }

        let mut formal_charge = 0i32;
        for (sign, symbol) in [(1i32, '+'), (-1i32, '-')] {
            if self.next_is(symbol) {
                let mut magnitude = 1i32;
                if let Some(n) = self.read_number() {
                    magnitude = n.min(15) as i32;
                } else {
                    while self.next_is(symbol) {
                        magnitude += 1;
                    }
                }
                formal_charge = sign * magnitude;
                break;
            }
        }

        if self.next_is(':') {
            self.read_number();
        }

        match self.chars.next() {
            Some((_, ']')) => {}
            Some((pos, ch)) => return Err(SmilesError::UnexpectedChar { ch, pos }),
            None => return Err(SmilesError::UnterminatedBracket(start)),
        }

        Ok(Atom {
            atomic_num,
            isotope,
            aromatic,
            chirality,
            formal_charge: formal_charge as i8,
            explicit_h: Some(explicit_h),
            bracket: true,
        })
    }

    fn bracket_symbol(&mut self, start: usize) -> Result<(u8, bool)> {
        let first = match self.chars.next() {
            Some((_, c)) => c,
            None => return Err(SmilesError::UnterminatedBracket(start)),
        };

        if first == '*' {
            return Ok((0, false));
        }

        if first.is_ascii_lowercase() {
            // Aromatic: two-letter forms first (se, as, te), then one letter
            if let Some(second) = self.peek_char().filter(|c| c.is_ascii_lowercase()) {
                let two = format!("{}{}", first.to_ascii_uppercase(), second);
                if let Some(z) = elements::atomic_number(&two).filter(|&z| elements::is_aromatic_capable(z)) {
                    self.chars.next();
                    return Ok((z, true));
                }
            }
            let one = first.to_ascii_uppercase().to_string();
            return match elements::atomic_number(&one) {
                Some(z) if elements::is_aromatic_capable(z) => Ok((z, true)),
                _ => Err(SmilesError::UnknownElement(first.to_string())),
            };
        }

        if !first.is_ascii_uppercase() {
            return Err(SmilesError::UnknownElement(first.to_string()));
        }

        if let Some(second) = self.peek_char().filter(|c| c.is_ascii_lowercase()) {
            let two = format!("{first}{second}");
            if let Some(z) = elements::atomic_number(&two) {
                self.chars.next();
                return Ok((z, false));
            }
        }
        elements::atomic_number(&first.to_string())
            .map(|z| (z, false))
            .ok_or_else(|| SmilesError::UnknownElement(first.to_string()))
    }
}

/// Fold `[H]` atoms that are only decoration on a heavy atom into that
/// atom's hydrogen count. Isotopic, charged, or bridging hydrogens stay.
fn remove_plain_hydrogens(mol: &mut Molecule) {
    let adj = mol.adjacency();
    let removable: Vec<bool> = mol
        .atoms
        .iter()
        .enumerate()
        .map(|(i, a)| {
            a.atomic_num == 1
                && a.isotope.is_none()
                && a.formal_charge == 0
                && a.explicit_h.unwrap_or(0) == 0
                && adj[i].len() == 1
                && mol.atoms[adj[i][0]].atomic_num != 1
        })
        .collect();

    if !removable.iter().any(|&r| r) {
        return;
    }

    for i in (0..removable.len()).filter(|&i| removable[i]) {
        let heavy = adj[i][0];
        if let Some(h) = mol.atoms[heavy].explicit_h.as_mut() {
            *h = h.saturating_add(1);
        }
    }

    let mut new_index = vec![usize::MAX; mol.atoms.len()];
    let mut next = 0usize;
    for (i, &r) in removable.iter().enumerate() {
        if !r {
            new_index[i] = next;
            next += 1;
        }
    }

    mol.bonds.retain(|b| !removable[b.begin] && !removable[b.end]);
    for b in &mut mol.bonds {
        b.begin = new_index[b.begin];
        b.end = new_index[b.end];
    }
    let mut i = 0usize;
    mol.atoms.retain(|_| {
        let keep = !removable[i];
        i += 1;
        keep
    });
}

/// Aromatic atoms must sit in a ring. Implicit aromatic bonds that ended
/// up outside any ring (e.g. between two phenyl rings) are single bonds.
fn check_aromaticity(mol: &mut Molecule) -> Result<()> {
    let ring_bonds = rings::ring_bond_mask(mol);
    let ring_atoms = rings::ring_atom_mask(mol);

    if let Some(i) = mol
        .atoms
        .iter()
        .enumerate()
        .position(|(i, a)| a.aromatic && !ring_atoms[i])
    {
        return Err(SmilesError::NonRingAromatic(i));
    }

    for (b, in_ring) in mol.bonds.iter_mut().zip(ring_bonds) {
        if b.bond_type == BondType::Aromatic && !in_ring {
            b.bond_type = BondType::Single;
        }
    }
    Ok(())
}

fn check_valence(mol: &Molecule) -> Result<()> {
    let mut valence = vec![0u32; mol.num_atoms()];
    for b in &mol.bonds {
        valence[b.begin] += b.bond_type.valence();
        valence[b.end] += b.bond_type.valence();
    }

    for (index, atom) in mol.atoms.iter().enumerate() {
        if atom.bracket || atom.aromatic {
            continue;
        }
        if let Some(max) = elements::organic_max_valence(atom.atomic_num) {
            if valence[index] > max {
                return Err(SmilesError::Valence {
                    index,
                    symbol: elements::symbol(atom.atomic_num),
                    valence: valence[index],
                    max,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elements_of(mol: &Molecule) -> Vec<u8> {
        mol.atoms.iter().map(|a| a.atomic_num).collect()
    }

    #[test]
    fn test_ethanol() {
        let mol = parse_smiles("CCO").unwrap();
        assert_eq!(elements_of(&mol), vec![6, 6, 8]);
        assert_eq!(mol.num_bonds(), 2);
        assert!(mol.bonds.iter().all(|b| b.bond_type == BondType::Single));
    }

    #[test]
    fn test_benzene_is_aromatic_ring() {
        let mol = parse_smiles("c1ccccc1").unwrap();
        assert_eq!(mol.num_atoms(), 6);
        assert_eq!(mol.num_bonds(), 6);
        assert!(mol.atoms.iter().all(|a| a.aromatic));
        assert!(mol.bonds.iter().all(|b| b.bond_type == BondType::Aromatic));
    }

    #[test]
    fn test_branches_and_double_bonds() {
        // acetic acid
        let mol = parse_smiles("CC(=O)O").unwrap();
        assert_eq!(elements_of(&mol), vec![6, 6, 8, 8]);
        assert_eq!(mol.find_bond(1, 2).map(|b| b.bond_type), Some(BondType::Double));
        assert_eq!(mol.find_bond(1, 3).map(|b| b.bond_type), Some(BondType::Single));
    }

    #[test]
    fn test_two_letter_organic_atoms() {
        let mol = parse_smiles("ClCBr").unwrap();
        assert_eq!(elements_of(&mol), vec![17, 6, 35]);
    }

    #[test]
    fn test_bracket_atom_fields() {
        let mol = parse_smiles("[13C@@H](F)(Cl)Br").unwrap();
        let a = &mol.atoms[0];
        assert_eq!(a.atomic_num, 6);
        assert_eq!(a.isotope, Some(13));
        assert_eq!(a.chirality, ChiralTag::Clockwise);
        assert_eq!(a.explicit_h, Some(1));

        let mol = parse_smiles("[NH4+]").unwrap();
        assert_eq!(mol.atoms[0].formal_charge, 1);
        assert_eq!(mol.atoms[0].explicit_h, Some(4));

        let mol = parse_smiles("[O--]").unwrap();
        assert_eq!(mol.atoms[0].formal_charge, -2);
    }

    #[test]
    fn test_single_at_is_counter_clockwise() {
        let mol = parse_smiles("N[C@H](C)C(=O)O").unwrap();
        assert_eq!(mol.atoms[1].chirality, ChiralTag::CounterClockwise);
    }

    #[test]
    fn test_directional_bonds() {
        let mol = parse_smiles("F/C=C/F").unwrap();
        assert_eq!(mol.bonds[0].direction, BondDirection::EndUpRight);
        assert_eq!(mol.bonds[1].bond_type, BondType::Double);
        assert_eq!(mol.bonds[2].direction, BondDirection::EndUpRight);

        let mol = parse_smiles("F/C=C\\F").unwrap();
        assert_eq!(mol.bonds[2].direction, BondDirection::EndDownRight);
    }

    #[test]
    fn test_two_digit_ring_closure() {
        let mol = parse_smiles("C%10CCCC%10").unwrap();
        assert_eq!(mol.num_atoms(), 5);
        assert_eq!(mol.num_bonds(), 5);
    }

    #[test]
    fn test_dot_separated_components() {
        let mol = parse_smiles("[Na+].[Cl-]").unwrap();
        assert_eq!(mol.num_atoms(), 2);
        assert_eq!(mol.num_bonds(), 0);
    }

    #[test]
    fn test_aromatic_bracket_atoms() {
        let mol = parse_smiles("c1cc[nH]c1").unwrap();
        assert_eq!(mol.atoms[3].atomic_num, 7);
        assert!(mol.atoms[3].aromatic);

        let mol = parse_smiles("c1cc[se]c1").unwrap();
        assert_eq!(mol.atoms[3].atomic_num, 34);
    }

    #[test]
    fn test_biphenyl_link_is_single() {
        let mol = parse_smiles("c1ccccc1c1ccccc1").unwrap();
        assert_eq!(mol.find_bond(5, 6).map(|b| b.bond_type), Some(BondType::Single));
    }

    #[test]
    fn test_explicit_hydrogens_are_folded() {
        let mol = parse_smiles("[H]C([H])([H])[H]").unwrap();
        assert_eq!(elements_of(&mol), vec![6]);
        assert_eq!(mol.num_bonds(), 0);

        // molecular hydrogen keeps both atoms
        let mol = parse_smiles("[H][H]").unwrap();
        assert_eq!(mol.num_atoms(), 2);

        // deuterium is kept
        let mol = parse_smiles("[2H]C").unwrap();
        assert_eq!(mol.num_atoms(), 2);
    }

    #[test]
    fn test_title_after_whitespace_is_ignored() {
        let mol = parse_smiles("CCO ethanol").unwrap();
        assert_eq!(mol.num_atoms(), 3);
    }

    #[test]
    fn test_empty_smiles_is_empty_molecule() {
        let mol = parse_smiles("").unwrap();
        assert_eq!(mol.num_atoms(), 0);
    }

    #[test]
    fn test_rejects_malformed_input() {
        let cases = [
            ("not_a_molecule", "garbage"),
            ("C(C", "unclosed branch"),
            ("CC)", "unmatched close"),
            ("C1CC", "unclosed ring"),
            ("C=", "dangling bond"),
            ("=C", "bond without atom"),
            ("[C", "unterminated bracket"),
            ("[Xx]", "unknown element"),
            ("C(C)(C)(C)(C)C", "pentavalent carbon"),
            ("c", "aromatic atom outside ring"),
            ("C11", "ring closure on itself"),
            ("C12CC12", "duplicate bond"),
        ];
        for (smiles, why) in cases {
            assert!(parse_smiles(smiles).is_err(), "{smiles} should fail: {why}");
        }
    }

    #[test]
    fn test_error_reports_position() {
        assert_eq!(
            parse_smiles("CCX"),
            Err(SmilesError::UnexpectedChar { ch: 'X', pos: 2 })
        );
        assert_eq!(parse_smiles("CC)"), Err(SmilesError::UnmatchedClose(2)));
    }
}
