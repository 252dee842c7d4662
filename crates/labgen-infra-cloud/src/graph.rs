//! Dependency graph over declared resources
//!
//! Edges come from property wiring only: a node depends on every resource
//! whose outputs appear in its inputs.

use crate::error::{CloudError, Result};
use crate::resource::ResourceSet;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// Directed acyclic graph of resource names
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    indices: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph for a resource set
    ///
    /// Fails if a node references a resource that was never declared.
    pub fn from_resources(resources: &ResourceSet) -> Result<Self> {
        let mut graph = Self::new();
        for resource in resources.iter() {
            graph.add_node(&resource.id);
        }
        for resource in resources.iter() {
            for dependency in resource.dependencies() {
                if resources.get(&dependency).is_none() {
                    return Err(CloudError::UnknownReference {
                        resource: resource.id.clone(),
                        target: dependency,
                    });
                }
                graph.add_dependency(&resource.id, &dependency);
            }
        }
        Ok(graph)
    }

    pub fn add_node(&mut self, name: &str) -> NodeIndex {
        if let Some(index) = self.indices.get(name) {
            return *index;
        }
        let index = self.graph.add_node(name.to_string());
        self.indices.insert(name.to_string(), index);
        index
    }

    /// Record that `dependent` reads outputs of `dependency`
    ///
    /// The edge points from `dependency` to `dependent` so that a
    /// topological sort yields dependencies first.
    pub fn add_dependency(&mut self, dependent: &str, dependency: &str) {
        let from = self.add_node(dependency);
        let to = self.add_node(dependent);
        self.graph.update_edge(from, to, ());
    }

    /// Names of the direct dependencies of a node
    pub fn dependencies_of(&self, name: &str) -> Vec<String> {
        let Some(index) = self.indices.get(name) else {
            return Vec::new();
        };
        let mut names: Vec<String> = self
            .graph
            .neighbors_directed(*index, petgraph::Direction::Incoming)
            .filter_map(|i| self.graph.node_weight(i).cloned())
            .collect();
        names.sort();
        names
    }

    /// Resource names with dependencies before dependents
    ///
    /// Ties are broken by name so the order is stable across runs.
    pub fn resolve_order(&self) -> Result<Vec<String>> {
        // toposort only reports cycles; ordering is Kahn's over a sorted ready set
        if let Err(cycle) = petgraph::algo::toposort(&self.graph, None) {
            let name = self
                .graph
                .node_weight(cycle.node_id())
                .cloned()
                .unwrap_or_default();
            return Err(CloudError::CyclicDependency(name));
        }

        let mut in_degree: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|i| {
                let degree = self
                    .graph
                    .neighbors_directed(i, petgraph::Direction::Incoming)
                    .count();
                (i, degree)
            })
            .collect();

        let mut ready: std::collections::BTreeMap<String, NodeIndex> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(i, _)| (self.graph[*i].clone(), *i))
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some((name, index)) = ready.pop_first() {
            order.push(name);
            for next in self
                .graph
                .neighbors_directed(index, petgraph::Direction::Outgoing)
            {
                if let Some(degree) = in_degree.get_mut(&next) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(self.graph[next].clone(), next);
                    }
                }
            }
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceConfig;
    use serde_json::json;

    #[test]
    fn test_empty_graph_resolves_to_empty() {
        let graph = DependencyGraph::new();
        assert!(graph.resolve_order().unwrap().is_empty());
    }

    #[test]
    fn test_linear_dependency_chain() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("app", "plan");
        graph.add_dependency("plan", "rg");

        let order = graph.resolve_order().unwrap();
        assert_eq!(order, vec!["rg", "plan", "app"]);
    }

    #[test]
    fn test_diamond_dependency_is_stable() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("app", "plan");
        graph.add_dependency("app", "image");
        graph.add_dependency("plan", "rg");
        graph.add_dependency("image", "rg");

        let order = graph.resolve_order().unwrap();
        assert_eq!(order, vec!["rg", "image", "plan", "app"]);
        assert_eq!(graph.dependencies_of("app"), vec!["image", "plan"]);
    }

    #[test]
    fn test_cycle_detection() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("a", "b");
        graph.add_dependency("b", "a");

        let result = graph.resolve_order();
        assert!(matches!(result, Err(CloudError::CyclicDependency(_))));
    }

    #[test]
    fn test_from_resources_unknown_reference() {
        let mut set = ResourceSet::new();
        set.add(ResourceConfig::new(
            "test:index:Thing",
            "app",
            "test",
            json!({"plan": {"$output": {"resource": "plan", "attribute": "id"}}}),
        ))
        .unwrap();

        let result = DependencyGraph::from_resources(&set);
        assert!(matches!(result, Err(CloudError::UnknownReference { .. })));
    }
}
