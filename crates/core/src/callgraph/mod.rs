//! Static call graph.
//!
//! A directed multigraph keyed by `FunctionId`. Synthetic nodes stand for
//! dynamic dispatch sites and must be purged with `delete_synthetic_nodes`
//! before anything walks the graph.

pub mod cha;

use std::collections::HashMap;

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::model::FunctionId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallNode {
    pub id: FunctionId,
    pub synthetic: bool,
}

/// One call site, caller to callee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallEdge {
    /// Line of the call expression in the caller's file.
    pub line: usize,
    order: usize,
}

#[derive(Debug, Default)]
pub struct CallGraph {
    graph: StableDiGraph<CallNode, CallEdge>,
    index: HashMap<FunctionId, NodeIndex>,
    next_order: usize,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Node of a real function, created on first use.
    pub fn add_function(&mut self, id: FunctionId) -> NodeIndex {
        self.add_node(id, false)
    }

    pub fn add_synthetic(&mut self, id: FunctionId) -> NodeIndex {
        self.add_node(id, true)
    }

    fn add_node(&mut self, id: FunctionId, synthetic: bool) -> NodeIndex {
        if let Some(&ix) = self.index.get(&id) {
            return ix;
        }
        let ix = self.graph.add_node(CallNode { id: id.clone(), synthetic });
        self.index.insert(id, ix);
        ix
    }

    pub fn add_edge(&mut self, caller: NodeIndex, callee: NodeIndex, line: usize) {
        let order = self.next_order;
        self.next_order += 1;
        self.graph.add_edge(caller, callee, CallEdge { line, order });
    }

    pub fn find(&self, id: &FunctionId) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    pub fn node(&self, ix: NodeIndex) -> Option<&CallNode> {
        self.graph.node_weight(ix)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn synthetic_count(&self) -> usize {
        self.graph.node_weights().filter(|n| n.synthetic).count()
    }

    /// Out-edge callees of `ix` in edge insertion order. A callee reached by
    /// several call sites appears once per site.
    pub fn callees(&self, ix: NodeIndex) -> Vec<NodeIndex> {
        self.sorted_edges(ix, Direction::Outgoing).into_iter().map(|(_, other, _)| other).collect()
    }

    /// Callers of `ix` in edge insertion order, one entry per call site.
    pub fn callers(&self, ix: NodeIndex) -> Vec<NodeIndex> {
        self.sorted_edges(ix, Direction::Incoming).into_iter().map(|(_, other, _)| other).collect()
    }

    fn sorted_edges(&self, ix: NodeIndex, dir: Direction) -> Vec<(usize, NodeIndex, CallEdge)> {
        let mut edges: Vec<(usize, NodeIndex, CallEdge)> = self
            .graph
            .edges_directed(ix, dir)
            .map(|e| {
                let other = match dir {
                    Direction::Outgoing => e.target(),
                    Direction::Incoming => e.source(),
                };
                (e.weight().order, other, *e.weight())
            })
            .collect();
        edges.sort_by_key(|(order, _, _)| *order);
        edges
    }

    /// Remove every synthetic node, connecting each of its callers to each of
    /// its callees first so reachability through it is preserved. Returns the
    /// number of nodes removed.
    pub fn delete_synthetic_nodes(&mut self) -> usize {
        let synthetic: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|&ix| self.graph[ix].synthetic)
            .collect();

        for &ix in &synthetic {
            let incoming = self.sorted_edges(ix, Direction::Incoming);
            let outgoing = self.sorted_edges(ix, Direction::Outgoing);
            for (_, caller, site) in &incoming {
                for (_, callee, _) in &outgoing {
                    // Self-loops on the synthetic node vanish with it.
                    if *caller == ix || *callee == ix {
                        continue;
                    }
                    self.add_edge(*caller, *callee, site.line);
                }
            }
            if let Some(node) = self.graph.remove_node(ix) {
                self.index.remove(&node.id);
            }
        }
        synthetic.len()
    }
}
