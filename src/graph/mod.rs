//! Core graph data structures

mod access;
mod association;
mod candidate;
mod element;


pub use access::AccessPattern;
pub use association::{clamp_strength, Association, AssociationId, EMBEDDING_SIMILARITY};
pub use candidate::{ElementPair, MergeCandidate};
pub use element::{
    concat_json, Element, ElementId, ElementType, UnknownElementType, MERGED_AT_KEY,
    MERGED_INTO_KEY,
};
