//! Query types and result structures

use crate::graph::{Element, ElementId};
use serde::{Deserialize, Serialize};

/// How associations contribute to adjacency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Follow associations source -> target
    #[default]
    Outgoing,
    /// Every association links both endpoints
    Undirected,
}

/// A simple path between two elements.
///
/// `elements` starts at the source and ends at the target; no element
/// appears twice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphPath {
    pub elements: Vec<ElementId>,
    /// Hop count (`elements.len() - 1`)
    pub length: usize,
}

impl GraphPath {
    pub fn new(elements: Vec<ElementId>) -> Self {
        let length = elements.len().saturating_sub(1);
        Self { elements, length }
    }

    pub fn source(&self) -> Option<&ElementId> {
        self.elements.first()
    }

    pub fn target(&self) -> Option<&ElementId> {
        self.elements.last()
    }
}

/// A closed walk that starts and ends at the same element.
///
/// `elements` includes the origin at both ends, so a self-loop is
/// `[x, x]` with length 1.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cycle {
    pub elements: Vec<ElementId>,
    pub length: usize,
}

impl Cycle {
    pub fn new(elements: Vec<ElementId>) -> Self {
        let length = elements.len().saturating_sub(1);
        Self { elements, length }
    }

    pub fn origin(&self) -> Option<&ElementId> {
        self.elements.first()
    }

    /// Elements strictly between the two occurrences of the origin
    pub fn interior(&self) -> &[ElementId] {
        if self.elements.len() < 2 {
            &[]
        } else {
            &self.elements[1..self.elements.len() - 1]
        }
    }
}

/// An element discovered by neighbourhood expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Reach {
    /// Minimum number of hops from the origin
    pub depth: usize,
    pub id: ElementId,
}

/// A connected element with its minimum discovery depth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectedElement {
    pub element: Element,
    pub depth: usize,
}
