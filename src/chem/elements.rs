// ============================================================
// Layer 3b - Periodic Table
// ============================================================
// Element symbol ↔ atomic number lookups, default valences of
// the organic subset, and which elements may be aromatic.

const SYMBOLS: [&str; 118] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl",
    "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As",
    "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In",
    "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb",
    "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl",
    "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk",
    "Cf", "Es", "Fm", "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn", "Nh",
    "Fl", "Mc", "Lv", "Ts", "Og",
];

pub const MAX_ATOMIC_NUM: u8 = 118;

/// Atomic number for a capitalised element symbol, e.g. "Cl" -> 17.
pub fn atomic_number(symbol: &str) -> Option<u8> {
    SYMBOLS
        .iter()
        .position(|&s| s == symbol)
        .map(|i| (i + 1) as u8)
}

/// Element symbol for an atomic number; `*` for the wildcard atom.
pub fn symbol(atomic_num: u8) -> &'static str {
    match atomic_num {
        0 => "*",
        z if z <= MAX_ATOMIC_NUM => SYMBOLS[z as usize - 1],
        _ => "?",
    }
}

/// Default valence of an aliphatic organic-subset atom.
/// Bracket atoms and aromatic atoms are never checked.
pub fn organic_max_valence(atomic_num: u8) -> Option<u32> {
    match atomic_num {
        5  => Some(3), // B
        6  => Some(4), // C
        7  => Some(3), // N
        8  => Some(2), // O
        9  => Some(1), // F
        15 => Some(5), // P
        16 => Some(6), // S
        17 => Some(1), // Cl
        35 => Some(1), // Br
        53 => Some(1), // I
        _  => None,
    }
}

/// Elements allowed as lowercase aromatic symbols inside brackets
pub fn is_aromatic_capable(atomic_num: u8) -> bool {
    matches!(atomic_num, 5 | 6 | 7 | 8 | 15 | 16 | 33 | 34 | 52)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_common_elements() {
        for (sym, z) in [("H", 1), ("C", 6), ("Cl", 17), ("Br", 35), ("Og", 118)] {
            assert_eq!(atomic_number(sym), Some(z));
            assert_eq!(symbol(z), sym);
        }
    }

    #[test]
    fn test_unknown_symbol() {
        assert_eq!(atomic_number("Xx"), None);
        assert_eq!(atomic_number("cl"), None);
    }
}
