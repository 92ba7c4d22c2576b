//! Record types stored in clonekit files.
//!
//! Alignment and clone records share the [`VdjObject`] view (gene hits plus an optional
//! junction), which is all the chain-usage and filtering code needs.

pub mod alignment;
pub mod clone;
pub mod genes;
pub mod tags;
pub mod tree;

pub use alignment::{AlignmentRecord, UNASSIGNED_CLONE};
pub use clone::{CloneRecord, CloneSet};
pub use genes::{Chain, GeneCatalog, GeneHits, GeneType, Hit};
pub use tags::{TagCount, TagInfo, TagKind, TagTuple, TagsInfo};
pub use tree::{TreeNode, TreeNodeClone, TreeNodeRow, TreeRecord};

const STOP_CODONS: [&[u8]; 3] = [b"TAA", b"TAG", b"TGA"];

/// Common view over records carrying gene hits and a junction.
pub trait VdjObject {
    fn hits(&self) -> &GeneHits;

    fn junction(&self) -> Option<&str>;

    /// Chain of the best hit of `gene_type`.
    fn chain_of(&self, gene_type: GeneType) -> Option<Chain> {
        self.hits().best(gene_type).and_then(Hit::chain)
    }

    /// Chains of the best V and J hits; `None` when either is missing.
    fn vj_chains(&self) -> Option<(Chain, Chain)> {
        Some((self.chain_of(GeneType::Variable)?, self.chain_of(GeneType::Joining)?))
    }

    /// Junction length is not a multiple of three.
    fn is_out_of_frame(&self) -> bool {
        self.junction().is_some_and(|j| j.len() % 3 != 0)
    }

    /// In-frame translation of the junction contains a stop codon.
    fn has_stops(&self) -> bool {
        self.junction().is_some_and(|j| {
            j.as_bytes()
                .chunks_exact(3)
                .any(|codon| STOP_CODONS.iter().any(|s| codon.eq_ignore_ascii_case(s)))
        })
    }

    /// Out of frame or containing stops.
    fn is_non_functional(&self) -> bool {
        self.is_out_of_frame() || self.has_stops()
    }
}
