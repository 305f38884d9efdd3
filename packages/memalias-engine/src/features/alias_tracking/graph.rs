//! Alias graph
//!
//! Directed edges from a reference or pointer binding to the storage it
//! designates. A binding has at most one outgoing edge. Reference edges are
//! written once and never replaced; pointer edges are replaced on every
//! reassignment and removed when the pointer is set to null.

use crate::shared::models::{Address, BindingId, HeapObjectId};
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AliasNode {
    Binding(BindingId),
    Heap(HeapObjectId),
}

impl AliasNode {
    pub fn from_address(address: Address) -> Option<Self> {
        match address {
            Address::Null => None,
            Address::Stack(id) => Some(AliasNode::Binding(id)),
            Address::Heap(id) => Some(AliasNode::Heap(id)),
        }
    }

    pub fn address(self) -> Address {
        match self {
            AliasNode::Binding(id) => Address::Stack(id),
            AliasNode::Heap(id) => Address::Heap(id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AliasEdge {
    Reference,
    Pointer,
}

#[derive(Debug, Clone, Default)]
pub struct AliasGraph {
    graph: DiGraphMap<AliasNode, AliasEdge>,
}

impl AliasGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the permanent edge of a reference.
    ///
    /// Returns `false` and leaves the graph unchanged if `from` already has an
    /// outgoing edge.
    pub fn add_reference(&mut self, from: BindingId, to: Address) -> bool {
        let source = AliasNode::Binding(from);
        if self.target_of(from).is_some() {
            return false;
        }
        match AliasNode::from_address(to) {
            Some(target) => {
                self.graph.add_edge(source, target, AliasEdge::Reference);
                true
            }
            None => false,
        }
    }

    /// Point `from` at a new target, dropping its previous pointer edge.
    ///
    /// Returns `false` if `from` is a reference; its edge is left untouched.
    pub fn set_pointer(&mut self, from: BindingId, to: Address) -> bool {
        let source = AliasNode::Binding(from);
        if let Some((old, edge)) = self.target_of(from) {
            if edge == AliasEdge::Reference {
                return false;
            }
            self.graph.remove_edge(source, old);
        }
        if let Some(target) = AliasNode::from_address(to) {
            self.graph.add_edge(source, target, AliasEdge::Pointer);
        }
        true
    }

    /// Current outgoing edge of a binding
    pub fn target_of(&self, from: BindingId) -> Option<(AliasNode, AliasEdge)> {
        let source = AliasNode::Binding(from);
        if !self.graph.contains_node(source) {
            return None;
        }
        self.graph
            .neighbors_directed(source, Direction::Outgoing)
            .next()
            .and_then(|target| {
                self.graph
                    .edge_weight(source, target)
                    .map(|edge| (target, *edge))
            })
    }

    /// Bindings whose edge designates `node`
    pub fn sources_of(&self, node: AliasNode) -> Vec<BindingId> {
        if !self.graph.contains_node(node) {
            return Vec::new();
        }
        let mut sources: Vec<BindingId> = self
            .graph
            .neighbors_directed(node, Direction::Incoming)
            .filter_map(|source| match source {
                AliasNode::Binding(id) => Some(id),
                AliasNode::Heap(_) => None,
            })
            .collect();
        sources.sort();
        sources
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}
