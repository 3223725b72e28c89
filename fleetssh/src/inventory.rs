//! Sources of target nodes.

use log::info;

use crate::job::NodeDescriptor;

/// Something that can list the nodes to run against.
pub trait NodeInventory {
    /// Nodes in inventory order, leaving out any whose name is in `exclude`.
    fn nodes(&self, exclude: &[String]) -> Vec<NodeDescriptor>;
}

/// A fixed, in-memory node list.
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    nodes: Vec<NodeDescriptor>,
}

impl StaticInventory {
    pub fn new(nodes: Vec<NodeDescriptor>) -> Self {
        Self { nodes }
    }

    /// Parse `name address` pairs, one per line.
    ///
    /// Blank lines and lines starting with `#` are ignored. A line holding
    /// a single token uses it as both name and address.
    pub fn parse(text: &str) -> Self {
        let nodes = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| {
                let mut fields = line.split_whitespace();
                let name = fields.next().unwrap_or_default();
                let address = fields.next().unwrap_or(name);
                NodeDescriptor::new(name, address)
            })
            .collect();
        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl NodeInventory for StaticInventory {
    fn nodes(&self, exclude: &[String]) -> Vec<NodeDescriptor> {
        self.nodes
            .iter()
            .filter(|node| {
                let excluded = exclude.iter().any(|name| name == node.name());
                if excluded {
                    info!("Excluding node {}", node);
                }
                !excluded
            })
            .cloned()
            .collect()
    }
}
