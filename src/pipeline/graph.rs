// src/pipeline/graph.rs

//! Producer/consumer graph over a pipeline's direct children.
//!
//! Nodes are child names; an edge `producer -> consumer` carries the
//! artifacts the consumer takes from that producer. Used for inspection
//! (`--dry-run`, tests), not for scheduling.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo::{has_path_connecting, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::artifact::Artifact;
use crate::errors::{NeuroflowError, Result};

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<String, BTreeSet<Artifact>>,
    index: BTreeMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Build from `(name, inputs, outputs)` in declared order.
    ///
    /// An input produced by several earlier children resolves to the most
    /// downstream one when they form a chain; producers on independent
    /// branches are a conflict.
    pub fn build<'a, I>(children: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, BTreeSet<Artifact>, BTreeSet<Artifact>)>,
    {
        let mut dag = DependencyGraph::default();
        let mut produced: Vec<(NodeIndex, BTreeSet<Artifact>)> = Vec::new();

        for (name, inputs, outputs) in children {
            let consumer = dag.graph.add_node(name.to_string());
            dag.index.entry(name.to_string()).or_insert(consumer);

            for input in &inputs {
                let candidates: Vec<NodeIndex> = produced
                    .iter()
                    .filter(|(_, outs)| outs.contains(input))
                    .map(|(node, _)| *node)
                    .collect();

                let producer = match candidates.as_slice() {
                    [] => continue,
                    [single] => *single,
                    _ => dag.most_downstream(name, input, &candidates)?,
                };

                match dag.graph.find_edge(producer, consumer) {
                    Some(edge) => {
                        dag.graph[edge].insert(input.clone());
                    }
                    None => {
                        dag.graph
                            .add_edge(producer, consumer, BTreeSet::from([input.clone()]));
                    }
                }
            }

            produced.push((consumer, outputs));
        }

        Ok(dag)
    }

    fn most_downstream(&self, consumer: &str, input: &Artifact, candidates: &[NodeIndex]) -> Result<NodeIndex> {
        candidates
            .iter()
            .copied()
            .find(|&latest| {
                candidates
                    .iter()
                    .all(|&other| other == latest || has_path_connecting(&self.graph, other, latest, None))
            })
            .ok_or_else(|| {
                let names: Vec<&str> = candidates.iter().map(|n| self.graph[*n].as_str()).collect();
                NeuroflowError::Validation(format!(
                    "input {input} of '{consumer}' is produced by independent steps: {}",
                    names.join(", ")
                ))
            })
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.graph.node_weights().map(String::as_str)
    }

    pub fn producers_of(&self, name: &str) -> Vec<&str> {
        self.neighbors(name, Direction::Incoming)
    }

    pub fn consumers_of(&self, name: &str) -> Vec<&str> {
        self.neighbors(name, Direction::Outgoing)
    }

    /// Artifacts flowing along `producer -> consumer`, if that edge exists.
    pub fn artifacts_between(&self, producer: &str, consumer: &str) -> Option<&BTreeSet<Artifact>> {
        let from = *self.index.get(producer)?;
        let to = *self.index.get(consumer)?;
        self.graph.find_edge(from, to).map(|edge| &self.graph[edge])
    }

    pub fn edges(&self) -> Vec<(&str, &str, &BTreeSet<Artifact>)> {
        self.graph
            .edge_references()
            .map(|edge| {
                (
                    self.graph[edge.source()].as_str(),
                    self.graph[edge.target()].as_str(),
                    edge.weight(),
                )
            })
            .collect()
    }

    pub fn topological_order(&self) -> Result<Vec<&str>> {
        toposort(&self.graph, None)
            .map(|order| order.into_iter().map(|n| self.graph[n].as_str()).collect())
            .map_err(|cycle| {
                NeuroflowError::Validation(format!(
                    "dependency cycle involving '{}'",
                    self.graph[cycle.node_id()]
                ))
            })
    }

    fn neighbors(&self, name: &str, direction: Direction) -> Vec<&str> {
        let Some(node) = self.index.get(name) else {
            return Vec::new();
        };
        let mut names: Vec<&str> = self
            .graph
            .neighbors_directed(*node, direction)
            .map(|n| self.graph[n].as_str())
            .collect();
        names.sort_unstable();
        names
    }
}
