//! Node abstraction.
//!
//! # Responsibilities
//! - Represent a single RPC node by its immutable address
//! - Hold the configured pool and hand out randomized probe orders

use rand::seq::SliceRandom;
use std::fmt;
use std::sync::Arc;

/// An RPC endpoint eligible for forwarding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Node {
    address: Arc<str>,
}

impl Node {
    pub fn new(address: impl Into<Arc<str>>) -> Self {
        Self {
            address: address.into(),
        }
    }

    /// Full URL of the node.
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}

/// The configured pool of interchangeable nodes.
#[derive(Debug, Clone)]
pub struct NodePool {
    nodes: Vec<Node>,
}

impl NodePool {
    pub fn new<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        Self {
            nodes: addresses.into_iter().map(Node::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Addresses in configured order, for the `__servers__` listing.
    pub fn addresses(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.address().to_string()).collect()
    }

    /// A fresh uniformly shuffled copy of the pool.
    pub fn shuffled(&self) -> Vec<Node> {
        let mut nodes = self.nodes.clone();
        nodes.shuffle(&mut rand::thread_rng());
        nodes
    }
}
