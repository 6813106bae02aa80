// ============================================================
// Layer 4 - Train/Valid/Test Splitter
// ============================================================
// Splits a featurized dataset into train, valid and test index
// lists. Four strategies:
//
//   index            - contiguous blocks in file order
//   random           - seeded permutation, then contiguous blocks
//   scaffold         - molecules grouped by Bemis-Murcko scaffold,
//                      largest groups go to train first, so valid
//                      and test hold rarer scaffolds
//   random_scaffold  - scaffold groups in seeded random order,
//                      valid and test are filled first up to their
//                      size, the rest goes to train
//
// Scaffold strategies never put two molecules with the same
// scaffold into different splits.
//
// Reference: Wu et al. (2018), MoleculeNet, Chem. Sci. 9, 513

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, str::FromStr};

use crate::chem::scaffold::scaffold_key;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitType {
    Random,
    Index,
    Scaffold,
    RandomScaffold,
}

impl SplitType {
    pub const ALL: [SplitType; 4] = [Self::Random, Self::Index, Self::Scaffold, Self::RandomScaffold];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Random         => "random",
            Self::Index          => "index",
            Self::Scaffold       => "scaffold",
            Self::RandomScaffold => "random_scaffold",
        }
    }
}

impl fmt::Display for SplitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SplitType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown split type '{s}', expected random, index, scaffold or random_scaffold"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitFractions {
    pub train: f64,
    pub valid: f64,
    pub test:  f64,
}

impl Default for SplitFractions {
    fn default() -> Self {
        Self { train: 0.8, valid: 0.1, test: 0.1 }
    }
}

impl SplitFractions {
    fn check(&self) {
        let total = self.train + self.valid + self.test;
        assert!(
            (total - 1.0).abs() < 1e-6,
            "split fractions must sum to 1, got {total}"
        );
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub valid: Vec<usize>,
    pub test:  Vec<usize>,
}

/// Split `smiles.len()` molecules. Only the scaffold strategies
/// look at the SMILES strings.
pub fn split(split_type: SplitType, smiles: &[&str], fractions: SplitFractions, seed: u64) -> SplitIndices {
    fractions.check();
    let out = match split_type {
        SplitType::Index          => index_split(smiles.len(), fractions),
        SplitType::Random         => random_split(smiles.len(), fractions, seed),
        SplitType::Scaffold       => scaffold_split(smiles, fractions),
        SplitType::RandomScaffold => random_scaffold_split(smiles, fractions, seed),
    };
    tracing::debug!(
        "{} split: {} train, {} valid, {} test",
        split_type,
        out.train.len(),
        out.valid.len(),
        out.test.len()
    );
    out
}

fn cut(order: Vec<usize>, fractions: SplitFractions) -> SplitIndices {
    let n = order.len();
    let train_cutoff = (fractions.train * n as f64) as usize;
    let valid_cutoff = ((fractions.train + fractions.valid) * n as f64) as usize;
    let valid_cutoff = valid_cutoff.clamp(train_cutoff, n);

    SplitIndices {
        train: order[..train_cutoff].to_vec(),
        valid: order[train_cutoff..valid_cutoff].to_vec(),
        test:  order[valid_cutoff..].to_vec(),
    }
}

pub fn index_split(n: usize, fractions: SplitFractions) -> SplitIndices {
    cut((0..n).collect(), fractions)
}

pub fn random_split(n: usize, fractions: SplitFractions, seed: u64) -> SplitIndices {
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));
    cut(order, fractions)
}

/// Indices grouped by scaffold key, groups in order of first
/// appearance, indices ascending within a group. Unparseable
/// SMILES each form their own group.
pub fn scaffold_groups(smiles: &[&str]) -> Vec<Vec<usize>> {
    let mut by_key: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();

    for (i, s) in smiles.iter().enumerate() {
        let key = match scaffold_key(s, true) {
            Ok(key) => key,
            Err(e) => {
                tracing::debug!("No scaffold for '{}': {}", s, e);
                groups.push(vec![i]);
                continue;
            }
        };
        match by_key.get(&key) {
            Some(&g) => groups[g].push(i),
            None => {
                by_key.insert(key, groups.len());
                groups.push(vec![i]);
            }
        }
    }
    groups
}

pub fn scaffold_split(smiles: &[&str], fractions: SplitFractions) -> SplitIndices {
    let n = smiles.len() as f64;
    let train_cutoff = fractions.train * n;
    let valid_cutoff = (fractions.train + fractions.valid) * n;

    let mut groups = scaffold_groups(smiles);
    // largest first, ties broken by later first index
    groups.sort_by(|a, b| (b.len(), b[0]).cmp(&(a.len(), a[0])));

    let mut out = SplitIndices::default();
    for group in groups {
        let size = group.len();
        if (out.train.len() + size) as f64 > train_cutoff {
            if (out.train.len() + out.valid.len() + size) as f64 > valid_cutoff {
                out.test.extend(group);
            } else {
                out.valid.extend(group);
            }
        } else {
            out.train.extend(group);
        }
    }
    out
}

pub fn random_scaffold_split(smiles: &[&str], fractions: SplitFractions, seed: u64) -> SplitIndices {
    let n = smiles.len() as f64;
    let max_valid = (fractions.valid * n).floor() as usize;
    let max_test = (fractions.test * n).floor() as usize;

    let mut groups = scaffold_groups(smiles);
    groups.shuffle(&mut StdRng::seed_from_u64(seed));

    let mut out = SplitIndices::default();
    for group in groups {
        if out.valid.len() + group.len() <= max_valid {
            out.valid.extend(group);
        } else if out.test.len() + group.len() <= max_test {
            out.test.extend(group);
        } else {
            out.train.extend(group);
        }
    }
    out
}
