//! Gene types, hits and the per-file gene catalog.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::errors::ClonekitError;

/// Reference gene segment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GeneType {
    Variable,
    Diversity,
    Joining,
    Constant,
}

impl GeneType {
    /// All gene types in reference order (V, D, J, C).
    pub const ALL: [GeneType; 4] =
        [GeneType::Variable, GeneType::Diversity, GeneType::Joining, GeneType::Constant];

    /// Position of this gene type in [`GeneType::ALL`].
    #[must_use]
    pub fn ordinal(self) -> usize {
        self as usize
    }

    /// Single-letter name.
    #[must_use]
    pub fn letter(self) -> char {
        match self {
            GeneType::Variable => 'V',
            GeneType::Diversity => 'D',
            GeneType::Joining => 'J',
            GeneType::Constant => 'C',
        }
    }
}

impl fmt::Display for GeneType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Receptor chain, derived from the gene name prefix (e.g. `TRBV12-3` → `TRB`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Chain {
    TRA,
    TRB,
    TRG,
    TRD,
    IGH,
    IGK,
    IGL,
}

impl Chain {
    /// Parses the chain from a gene name; `None` for unrecognised names.
    #[must_use]
    pub fn from_gene_name(gene: &str) -> Option<Chain> {
        gene.get(..3).and_then(|prefix| prefix.parse().ok())
    }
}

impl FromStr for Chain {
    type Err = ClonekitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TRA" => Ok(Chain::TRA),
            "TRB" => Ok(Chain::TRB),
            "TRG" => Ok(Chain::TRG),
            "TRD" => Ok(Chain::TRD),
            "IGH" => Ok(Chain::IGH),
            "IGK" => Ok(Chain::IGK),
            "IGL" => Ok(Chain::IGL),
            _ => Err(ClonekitError::InvalidParameter {
                parameter: "chain".to_string(),
                reason: format!("unknown chain '{s}'"),
            }),
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A single gene hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub gene: String,
    pub score: f32,
}

impl Hit {
    #[must_use]
    pub fn new(gene: impl Into<String>, score: f32) -> Self {
        Self { gene: gene.into(), score }
    }

    /// Chain of the hit gene, if recognisable.
    #[must_use]
    pub fn chain(&self) -> Option<Chain> {
        Chain::from_gene_name(&self.gene)
    }
}

/// Hits for each gene type, best hit first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneHits {
    hits: [Vec<Hit>; 4],
}

impl GeneHits {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy with the hits for `gene_type` replaced.
    #[must_use]
    pub fn with(mut self, gene_type: GeneType, hits: Vec<Hit>) -> Self {
        self.hits[gene_type.ordinal()] = hits;
        self
    }

    #[must_use]
    pub fn get(&self, gene_type: GeneType) -> &[Hit] {
        &self.hits[gene_type.ordinal()]
    }

    #[must_use]
    pub fn best(&self, gene_type: GeneType) -> Option<&Hit> {
        self.hits[gene_type.ordinal()].first()
    }

    /// Every gene name referenced by these hits.
    pub fn genes(&self) -> impl Iterator<Item = &str> {
        self.hits.iter().flatten().map(|h| h.gene.as_str())
    }

    /// True when the top-`level` hits of `gene_type` share at least one gene.
    ///
    /// A level of zero always matches; an empty hit list only matches another empty list.
    #[must_use]
    pub fn same_top_hits(&self, other: &GeneHits, gene_type: GeneType, level: usize) -> bool {
        if level == 0 {
            return true;
        }
        let (a, b) = (self.get(gene_type), other.get(gene_type));
        if a.is_empty() || b.is_empty() {
            return a.is_empty() && b.is_empty();
        }
        a.iter().take(level).any(|x| b.iter().take(level).any(|y| x.gene == y.gene))
    }

    /// Unions the hits of `other` into `self`, keeping the best score per gene.
    #[must_use]
    pub fn merged_with(&self, other: &GeneHits) -> GeneHits {
        let mut result = GeneHits::new();
        for gene_type in GeneType::ALL {
            let mut combined: Vec<Hit> = self.get(gene_type).to_vec();
            for hit in other.get(gene_type) {
                match combined.iter_mut().find(|h| h.gene == hit.gene) {
                    Some(existing) if existing.score < hit.score => existing.score = hit.score,
                    Some(_) => {}
                    None => combined.push(hit.clone()),
                }
            }
            combined.sort_by(|a, b| b.score.total_cmp(&a.score));
            result.hits[gene_type.ordinal()] = combined;
        }
        result
    }

    /// Converts hits into catalog indices for encoding.
    pub(crate) fn to_indices(
        &self,
        catalog: &GeneCatalog,
    ) -> Result<[Vec<(u32, f32)>; 4], ClonekitError> {
        let mut out: [Vec<(u32, f32)>; 4] = Default::default();
        for (slot, hits) in out.iter_mut().zip(self.hits.iter()) {
            for hit in hits {
                slot.push((catalog.index_of(&hit.gene)?, hit.score));
            }
        }
        Ok(out)
    }

    /// Rebuilds hits from catalog indices.
    pub(crate) fn from_indices(
        indices: [Vec<(u32, f32)>; 4],
        catalog: &GeneCatalog,
    ) -> Result<GeneHits, ClonekitError> {
        let mut hits: [Vec<Hit>; 4] = Default::default();
        for (slot, entries) in hits.iter_mut().zip(indices) {
            for (index, score) in entries {
                slot.push(Hit::new(catalog.name(index)?, score));
            }
        }
        Ok(GeneHits { hits })
    }
}

/// Ordered list of genes referenced by a file; hits are stored as indices into it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct GeneCatalog {
    names: Vec<String>,
    lookup: AHashMap<String, u32>,
}

impl From<Vec<String>> for GeneCatalog {
    fn from(names: Vec<String>) -> Self {
        GeneCatalog::new(names)
    }
}

impl From<GeneCatalog> for Vec<String> {
    fn from(catalog: GeneCatalog) -> Self {
        catalog.names
    }
}

impl GeneCatalog {
    /// Builds a catalog from names, dropping duplicates but keeping first-seen order.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut catalog = GeneCatalog::default();
        for name in names {
            catalog.push(name.into());
        }
        catalog
    }

    fn push(&mut self, name: String) {
        if !self.lookup.contains_key(&name) {
            self.lookup.insert(name.clone(), self.names.len() as u32);
            self.names.push(name);
        }
    }

    /// Union of two catalogs, `self` first.
    #[must_use]
    pub fn union(&self, other: &GeneCatalog) -> GeneCatalog {
        GeneCatalog::new(self.names.iter().chain(other.names.iter()).cloned())
    }

    pub fn index_of(&self, gene: &str) -> Result<u32, ClonekitError> {
        self.lookup.get(gene).copied().ok_or_else(|| ClonekitError::UnknownGene { gene: gene.to_string() })
    }

    pub fn name(&self, index: u32) -> Result<&str, ClonekitError> {
        self.names
            .get(index as usize)
            .map(String::as_str)
            .ok_or_else(|| ClonekitError::UnknownGene { gene: format!("#{index}") })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Shares the catalog with codecs.
    #[must_use]
    pub fn shared(&self) -> Arc<GeneCatalog> {
        Arc::new(self.clone())
    }
}
