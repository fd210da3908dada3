//! crates/study_material_core/src/dependency_graph.rs
//!
//! Explicit adjacency view of section dependencies, used to reject operations
//! that would introduce a dependency cycle of any length.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::Section;

/// Directed graph where an edge `a -> b` means section `a` depends on section `b`.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: BTreeMap<String, BTreeSet<String>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

impl DependencyGraph {
    pub fn from_sections(sections: &[Section]) -> Self {
        let mut graph = Self::default();
        for section in sections {
            graph.set_dependencies(&section.id, section.dependencies.iter().cloned());
        }
        graph
    }

    /// Replaces the outgoing edges of `node`.
    pub fn set_dependencies<I>(&mut self, node: &str, dependencies: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.edges
            .insert(node.to_string(), dependencies.into_iter().collect());
    }

    pub fn dependencies_of(&self, node: &str) -> impl Iterator<Item = &str> {
        self.edges
            .get(node)
            .into_iter()
            .flat_map(|deps| deps.iter().map(String::as_str))
    }

    /// Returns one cycle as a path of node ids (first node repeated at the end),
    /// or `None` if the graph is acyclic.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let mut marks: BTreeMap<&str, Mark> = BTreeMap::new();
        let mut stack: Vec<&str> = Vec::new();

        for start in self.edges.keys() {
            if marks.contains_key(start.as_str()) {
                continue;
            }
            if let Some(cycle) = self.visit(start, &mut marks, &mut stack) {
                return Some(cycle);
            }
        }
        None
    }

    fn visit<'a>(
        &'a self,
        node: &'a str,
        marks: &mut BTreeMap<&'a str, Mark>,
        stack: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        marks.insert(node, Mark::Visiting);
        stack.push(node);

        for next in self.dependencies_of(node) {
            match marks.get(next) {
                Some(Mark::Visiting) => {
                    let start = stack.iter().position(|n| *n == next).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        stack[start..].iter().map(|n| n.to_string()).collect();
                    cycle.push(next.to_string());
                    return Some(cycle);
                }
                Some(Mark::Done) => {}
                None => {
                    if let Some(cycle) = self.visit(next, marks, stack) {
                        return Some(cycle);
                    }
                }
            }
        }

        stack.pop();
        marks.insert(node, Mark::Done);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Section, SectionType};

    fn section(id: &str, deps: &[&str]) -> Section {
        Section::new(SectionType::Text, id)
            .with_id(id)
            .with_dependencies(deps.iter().copied())
    }

    #[test]
    fn test_acyclic_chain() {
        let graph = DependencyGraph::from_sections(&[
            section("a", &[]),
            section("b", &["a"]),
            section("c", &["a", "b"]),
        ]);
        assert!(graph.find_cycle().is_none());
    }

    #[test]
    fn test_three_node_cycle() {
        let mut graph = DependencyGraph::from_sections(&[
            section("a", &[]),
            section("b", &["a"]),
            section("c", &["b"]),
        ]);
        graph.set_dependencies("a", vec!["c".to_string()]);

        let cycle = graph.find_cycle().expect("cycle expected");
        assert_eq!(cycle.first(), cycle.last());
        assert_eq!(cycle.len(), 4);
    }

    #[test]
    fn test_self_loop_is_cycle() {
        let graph = DependencyGraph::from_sections(&[section("a", &["a"])]);
        assert_eq!(graph.find_cycle(), Some(vec!["a".to_string(), "a".to_string()]));
    }
}
