// src/resolver/graph.rs

//! Dependency graph with dynamic vertex addition
//!
//! Vertices are plain indices handed out by [`DependencyGraph::add_vertex`];
//! callers keep their own index -> package mapping. An edge `from -> to`
//! means `from` depends on `to`.

use std::collections::{BTreeSet, VecDeque};

/// Directed graph of package dependencies
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Outgoing edges per vertex
    edges: Vec<BTreeSet<usize>>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vertex and return its index
    pub fn add_vertex(&mut self) -> usize {
        self.edges.push(BTreeSet::new());
        self.edges.len() - 1
    }

    /// Number of vertices
    pub fn order(&self) -> usize {
        self.edges.len()
    }

    /// Number of edges
    pub fn size(&self) -> usize {
        self.edges.iter().map(|e| e.len()).sum()
    }

    /// Add a directed edge
    ///
    /// Returns false, leaving the graph unchanged, if either vertex does not exist.
    pub fn add_edge(&mut self, from: usize, to: usize) -> bool {
        if to >= self.edges.len() {
            return false;
        }
        match self.edges.get_mut(from) {
            Some(targets) => {
                targets.insert(to);
                true
            }
            None => false,
        }
    }

    /// Add an edge unless it would close a cycle
    ///
    /// Returns false, leaving the graph unchanged, if the edge is rejected or
    /// names a missing vertex.
    pub fn add_edge_checked(&mut self, from: usize, to: usize) -> bool {
        let existed = self.has_edge(from, to);
        if !self.add_edge(from, to) {
            return false;
        }
        if self.is_acyclic() {
            return true;
        }
        if !existed {
            self.edges[from].remove(&to);
        }
        false
    }

    pub fn has_edge(&self, from: usize, to: usize) -> bool {
        self.edges.get(from).is_some_and(|e| e.contains(&to))
    }

    /// Direct dependencies of a vertex
    pub fn dependencies(&self, vertex: usize) -> impl Iterator<Item = usize> + '_ {
        self.edges.get(vertex).into_iter().flatten().copied()
    }

    /// Check whether the graph has no directed cycle, self-loops included
    pub fn is_acyclic(&self) -> bool {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            OnStack,
            Done,
        }

        let mut marks = vec![Mark::Unvisited; self.edges.len()];

        for start in 0..self.edges.len() {
            if marks[start] != Mark::Unvisited {
                continue;
            }

            // Iterative DFS: (vertex, remaining successors)
            let mut stack = vec![(start, self.edges[start].iter())];
            marks[start] = Mark::OnStack;

            while let Some((vertex, successors)) = stack.last_mut() {
                match successors.next() {
                    Some(&next) => match marks[next] {
                        Mark::OnStack => return false,
                        Mark::Unvisited => {
                            marks[next] = Mark::OnStack;
                            stack.push((next, self.edges[next].iter()));
                        }
                        Mark::Done => {}
                    },
                    None => {
                        marks[*vertex] = Mark::Done;
                        stack.pop();
                    }
                }
            }
        }

        true
    }

    /// Order vertices so every dependency precedes its dependents (Kahn's algorithm)
    ///
    /// Returns None if the graph has a cycle.
    pub fn topological_order(&self) -> Option<Vec<usize>> {
        let n = self.edges.len();

        // A vertex becomes ready once all of its dependencies are placed
        let mut pending: Vec<usize> = self.edges.iter().map(|e| e.len()).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (from, targets) in self.edges.iter().enumerate() {
            for &to in targets {
                dependents[to].push(from);
            }
        }

        let mut queue: VecDeque<usize> = (0..n).filter(|&v| pending[v] == 0).collect();
        let mut order = Vec::with_capacity(n);

        while let Some(vertex) = queue.pop_front() {
            order.push(vertex);
            for &dependent in &dependents[vertex] {
                pending[dependent] -= 1;
                if pending[dependent] == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        (order.len() == n).then_some(order)
    }
}
