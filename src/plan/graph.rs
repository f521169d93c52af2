//! Pointer dependency graph between plan steps.
//!
//! Execution is always strictly sequential; the graph only reports which steps
//! feed which, and which steps could in principle run side by side.

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};

use super::Plan;
use super::pointer::Pointer;

/// Directed graph with an edge `a -> b` when step `b` reads step `a`'s result.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<usize, ()>,
    /// `(step, from)` pairs whose pointer does not reference an earlier step.
    dangling: Vec<(usize, u64)>,
}

impl DependencyGraph {
    /// Collect pointers from top-level args and from compute `inputs` arrays.
    pub fn build(plan: &Plan) -> Self {
        let mut graph = DiGraph::with_capacity(plan.len(), plan.len());
        let nodes: Vec<NodeIndex> = (0..plan.len()).map(|i| graph.add_node(i)).collect();
        let mut dangling = Vec::new();

        for (index, step) in plan.iter().enumerate() {
            let mut pointers: Vec<Pointer> = step.top_level_pointers().map(|(_, p)| p).collect();
            if let Some(inputs) = step.args.get("inputs").and_then(|v| v.as_array()) {
                pointers.extend(inputs.iter().filter_map(|v| Pointer::detect(v)?.ok()));
            }

            for pointer in pointers {
                match usize::try_from(pointer.from) {
                    Ok(from) if from < index => {
                        if graph.find_edge(nodes[from], nodes[index]).is_none() {
                            graph.add_edge(nodes[from], nodes[index], ());
                        }
                    }
                    _ => dangling.push((index, pointer.from)),
                }
            }
        }

        Self { graph, dangling }
    }

    pub fn step_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Steps whose results `step` reads, ascending.
    pub fn dependencies(&self, step: usize) -> Vec<usize> {
        self.neighbors(step, Direction::Incoming)
    }

    /// Steps that read `step`'s result, ascending.
    pub fn dependents(&self, step: usize) -> Vec<usize> {
        self.neighbors(step, Direction::Outgoing)
    }

    /// Pointers that can never resolve: they reference the step itself or a later one.
    pub fn dangling(&self) -> &[(usize, u64)] {
        &self.dangling
    }

    /// Group steps into layers: every step sits one layer after its deepest
    /// dependency, so steps sharing a layer do not depend on each other.
    pub fn layers(&self) -> Vec<Vec<usize>> {
        let mut depth = vec![0usize; self.step_count()];
        // Edges only ever point forward, so index order is a topological order.
        for step in 0..self.step_count() {
            depth[step] = self
                .dependencies(step)
                .into_iter()
                .map(|dep| depth[dep] + 1)
                .max()
                .unwrap_or(0);
        }

        let mut layers: Vec<Vec<usize>> = Vec::new();
        for (step, d) in depth.into_iter().enumerate() {
            if layers.len() <= d {
                layers.resize_with(d + 1, Vec::new);
            }
            layers[d].push(step);
        }
        layers
    }

    fn neighbors(&self, step: usize, direction: Direction) -> Vec<usize> {
        if step >= self.step_count() {
            return Vec::new();
        }
        let mut out: Vec<usize> = self
            .graph
            .neighbors_directed(NodeIndex::new(step), direction)
            .map(|n| self.graph[n])
            .collect();
        out.sort_unstable();
        out
    }
}
