//! core::graph
//!
//! Token dependency graph representation and operations.
//!
//! # Architecture
//!
//! The dependency graph is a DAG where:
//! - Nodes are token names
//! - Edges point from a dependent token to the tokens it depends on
//! - Roots are literal tokens (no outgoing edges)
//!
//! A reverse relation (dependency to dependents) is kept alongside the
//! forward one and both are updated together on every mutation.
//!
//! # Invariants
//!
//! - Graph must be acyclic, enforced at edge insertion
//! - A rejected edge leaves the graph unchanged
//! - Iteration order is insertion order, so traversals are reproducible

use std::collections::VecDeque;
use std::fmt;

use indexmap::{IndexMap, IndexSet};
use thiserror::Error;

use super::types::TokenName;

/// An ordered path of token names, rendered as `a -> b -> a`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CyclePath(pub Vec<TokenName>);

impl CyclePath {
    /// The names along the path.
    pub fn names(&self) -> &[TokenName] {
        &self.0
    }
}

impl fmt::Display for CyclePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for name in &self.0 {
            if !first {
                f.write_str(" -> ")?;
            }
            write!(f, "{name}")?;
            first = false;
        }
        Ok(())
    }
}

/// Errors from graph operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    /// Inserting the edge would close a cycle. The graph was not modified.
    #[error("circular dependency: {cycle}")]
    CircularDependency { cycle: CyclePath },

    /// A cycle was found while sorting. Unreachable while edge insertion
    /// is the only way to add edges.
    #[error("cycle detected during topological sort: {cycle}")]
    CycleDetected { cycle: CyclePath },

    #[error("token not in graph: {0}")]
    UnknownNode(TokenName),
}

/// Traversal marks for the depth-first topological sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Visited,
}

/// The dependency relation between tokens.
///
/// Owns names only, never token values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    /// Dependencies of each node, keyed in node insertion order
    dependencies: IndexMap<TokenName, IndexSet<TokenName>>,
    /// Dependents of each node (derived from `dependencies`)
    dependents: IndexMap<TokenName, IndexSet<TokenName>>,
}

impl DependencyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node with no edges. Idempotent.
    pub fn add_node(&mut self, name: TokenName) {
        self.dependents.entry(name.clone()).or_default();
        self.dependencies.entry(name).or_default();
    }

    /// Add an edge meaning "`dependent` is computed from `dependency`".
    ///
    /// The cycle check runs before any mutation: if `dependent` is already
    /// reachable from `dependency`, the edge is rejected and the graph is
    /// left untouched. Self-loops are rejected as one-node cycles. Both
    /// endpoints are registered as nodes; re-adding an existing edge is a
    /// no-op.
    ///
    /// # Example
    ///
    /// ```
    /// use rafters_tokens::core::graph::{DependencyGraph, GraphError};
    /// use rafters_tokens::core::types::TokenName;
    ///
    /// let mut graph = DependencyGraph::new();
    /// let a = TokenName::new("a").unwrap();
    /// let b = TokenName::new("b").unwrap();
    ///
    /// graph.add_edge(&b, &a).unwrap();
    /// let err = graph.add_edge(&a, &b).unwrap_err();
    /// assert!(matches!(err, GraphError::CircularDependency { .. }));
    /// assert_eq!(err.to_string(), "circular dependency: a -> b -> a");
    /// ```
    pub fn add_edge(
        &mut self,
        dependent: &TokenName,
        dependency: &TokenName,
    ) -> Result<(), GraphError> {
        if let Some(cycle) = self.would_create_cycle(dependent, dependency) {
            tracing::debug!(%dependent, %dependency, %cycle, "rejected dependency edge");
            return Err(GraphError::CircularDependency { cycle });
        }

        self.add_node(dependent.clone());
        self.add_node(dependency.clone());
        self.dependencies
            .entry(dependent.clone())
            .or_default()
            .insert(dependency.clone());
        self.dependents
            .entry(dependency.clone())
            .or_default()
            .insert(dependent.clone());
        Ok(())
    }

    /// Check whether adding `dependent -> dependency` would close a cycle.
    ///
    /// Returns the cycle path `[dependent, dependency, ..., dependent]` if
    /// it would. Read-only.
    pub fn would_create_cycle(
        &self,
        dependent: &TokenName,
        dependency: &TokenName,
    ) -> Option<CyclePath> {
        if dependent == dependency {
            return Some(CyclePath(vec![dependent.clone(), dependent.clone()]));
        }

        self.path(dependency, dependent).map(|path| {
            let mut cycle = Vec::with_capacity(path.len() + 1);
            cycle.push(dependent.clone());
            cycle.extend(path);
            CyclePath(cycle)
        })
    }

    /// Shortest forward path from `from` to `to`, both ends included.
    fn path(&self, from: &TokenName, to: &TokenName) -> Option<Vec<TokenName>> {
        let mut came_from: IndexMap<&TokenName, &TokenName> = IndexMap::new();
        let mut queue = VecDeque::from([from]);
        let mut seen: IndexSet<&TokenName> = IndexSet::from([from]);

        while let Some(current) = queue.pop_front() {
            if current == to {
                let mut path = vec![current.clone()];
                let mut cursor = current;
                while let Some(prev) = came_from.get(cursor) {
                    path.push((*prev).clone());
                    cursor = *prev;
                }
                path.reverse();
                return Some(path);
            }
            for next in self.dependencies.get(current).into_iter().flatten() {
                if seen.insert(next) {
                    came_from.insert(next, current);
                    queue.push_back(next);
                }
            }
        }
        None
    }

    /// Remove a node and every edge touching it.
    ///
    /// Returns `false` if the node was not present.
    pub fn remove_token(&mut self, name: &TokenName) -> bool {
        let Some(deps) = self.dependencies.shift_remove(name) else {
            return false;
        };
        for dep in &deps {
            if let Some(set) = self.dependents.get_mut(dep) {
                set.shift_remove(name);
            }
        }
        if let Some(dependents) = self.dependents.shift_remove(name) {
            for dependent in &dependents {
                if let Some(set) = self.dependencies.get_mut(dependent) {
                    set.shift_remove(name);
                }
            }
        }
        true
    }

    /// Remove the outgoing edges of a node, keeping the node itself.
    ///
    /// Returns the removed dependency set so callers can restore it.
    pub fn clear_dependencies(&mut self, name: &TokenName) -> IndexSet<TokenName> {
        let removed = self
            .dependencies
            .get_mut(name)
            .map(std::mem::take)
            .unwrap_or_default();
        for dep in &removed {
            if let Some(set) = self.dependents.get_mut(dep) {
                set.shift_remove(name);
            }
        }
        removed
    }

    /// Whether the node exists.
    pub fn contains(&self, name: &TokenName) -> bool {
        self.dependencies.contains_key(name)
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.dependencies.values().map(IndexSet::len).sum()
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &TokenName> {
        self.dependencies.keys()
    }

    /// All edges as `(dependent, dependency)` pairs.
    pub fn edges(&self) -> impl Iterator<Item = (&TokenName, &TokenName)> {
        self.dependencies
            .iter()
            .flat_map(|(from, deps)| deps.iter().map(move |to| (from, to)))
    }

    /// Direct dependencies of a node.
    pub fn dependencies(&self, name: &TokenName) -> Option<&IndexSet<TokenName>> {
        self.dependencies.get(name)
    }

    /// Direct dependents of a node.
    pub fn dependents(&self, name: &TokenName) -> Option<&IndexSet<TokenName>> {
        self.dependents.get(name)
    }

    /// Every token that depends on `name`, directly or transitively.
    ///
    /// Uses breadth-first traversal over the reverse relation. `name`
    /// itself is not included.
    ///
    /// # Example
    ///
    /// ```
    /// use rafters_tokens::core::graph::DependencyGraph;
    /// use rafters_tokens::core::types::TokenName;
    ///
    /// let mut graph = DependencyGraph::new();
    /// let a = TokenName::new("a").unwrap();
    /// let b = TokenName::new("b").unwrap();
    /// let c = TokenName::new("c").unwrap();
    ///
    /// graph.add_edge(&b, &a).unwrap();
    /// graph.add_edge(&c, &b).unwrap();
    ///
    /// let closure = graph.transitive_dependents(&a);
    /// assert!(closure.contains(&b));
    /// assert!(closure.contains(&c));
    /// assert!(!closure.contains(&a));
    /// ```
    pub fn transitive_dependents(&self, name: &TokenName) -> IndexSet<TokenName> {
        let mut result = IndexSet::new();
        let mut queue = VecDeque::new();

        if let Some(direct) = self.dependents(name) {
            queue.extend(direct.iter());
        }

        while let Some(current) = queue.pop_front() {
            if result.insert(current.clone()) {
                if let Some(next) = self.dependents(current) {
                    queue.extend(next.iter());
                }
            }
        }

        result.shift_remove(name);
        result
    }

    /// Compute an order in which every node follows all its dependencies.
    ///
    /// Depth-first post-order with three-color marking. Roots are visited
    /// in node insertion order and each node's dependencies in edge
    /// insertion order, so the output is reproducible for the same load
    /// order.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::CycleDetected` if a node is reached while it is
    /// still being visited.
    ///
    /// # Example
    ///
    /// ```
    /// use rafters_tokens::core::graph::DependencyGraph;
    /// use rafters_tokens::core::types::TokenName;
    ///
    /// let mut graph = DependencyGraph::new();
    /// let primary = TokenName::new("primary").unwrap();
    /// let hover = TokenName::new("hover").unwrap();
    ///
    /// graph.add_node(primary.clone());
    /// graph.add_edge(&hover, &primary).unwrap();
    ///
    /// assert_eq!(graph.topological_sort().unwrap(), vec![primary, hover]);
    /// ```
    pub fn topological_sort(&self) -> Result<Vec<TokenName>, GraphError> {
        let names: Vec<&TokenName> = self.dependencies.keys().collect();
        let mut marks = vec![Mark::Unvisited; names.len()];
        let mut order = Vec::with_capacity(self.dependencies.len());

        for root in 0..names.len() {
            if marks[root] != Mark::Unvisited {
                continue;
            }

            // Explicit stack of (node index, next dependency position) so
            // long chains cannot overflow the call stack.
            let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
            marks[root] = Mark::Visiting;

            while let Some(frame) = stack.last_mut() {
                let (node, cursor) = *frame;
                let deps = &self.dependencies[node];

                if let Some(dep) = deps.get_index(cursor) {
                    frame.1 += 1;
                    let Some(dep_idx) = self.dependencies.get_index_of(dep) else {
                        continue;
                    };
                    match marks[dep_idx] {
                        Mark::Visited => {}
                        Mark::Unvisited => {
                            marks[dep_idx] = Mark::Visiting;
                            stack.push((dep_idx, 0));
                        }
                        Mark::Visiting => {
                            let start = stack
                                .iter()
                                .position(|(idx, _)| *idx == dep_idx)
                                .unwrap_or(0);
                            let mut cycle: Vec<TokenName> = stack[start..]
                                .iter()
                                .map(|(idx, _)| names[*idx].clone())
                                .collect();
                            cycle.push(names[dep_idx].clone());
                            return Err(GraphError::CycleDetected {
                                cycle: CyclePath(cycle),
                            });
                        }
                    }
                } else {
                    marks[node] = Mark::Visited;
                    order.push(names[node].clone());
                    stack.pop();
                }
            }
        }

        Ok(order)
    }

    /// Insert an edge without the cycle check, to reach the cycle branch
    /// of [`Self::topological_sort`] in tests.
    #[cfg(test)]
    fn insert_edge_unchecked(&mut self, dependent: &TokenName, dependency: &TokenName) {
        self.add_node(dependent.clone());
        self.add_node(dependency.clone());
        self.dependencies[dependent].insert(dependency.clone());
        self.dependents[dependency].insert(dependent.clone());
    }
}
