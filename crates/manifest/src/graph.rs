// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dependency DAG construction and topological validation (§4.5).

use crate::manifest::Manifest;
use indexmap::IndexMap;
use std::collections::{HashSet, VecDeque};
use thiserror::Error;

/// A cyclic dependency detected at startup. Fatal: the orchestrator aborts
/// before any state is written (§4.5, §7, §8 boundary case).
#[derive(Debug, Error, PartialEq, Eq)]
#[error("cyclic dependency detected among stories: {}", cycle.join(" -> "))]
pub struct CycleError {
    /// The story IDs forming the cycle, in dependency order, with the first
    /// ID repeated at the end to make the cycle explicit in the message.
    pub cycle: Vec<String>,
}

/// The dependency graph induced by every story's `depends_on` list.
///
/// Built once at startup from the manifest; `dependents` is the reverse edge
/// set used by the scheduler's failure-propagation pass (§4.5).
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// story id -> ids it depends on
    pub dependencies: IndexMap<String, Vec<String>>,
    /// story id -> ids that depend on it (reverse edges)
    pub dependents: IndexMap<String, Vec<String>>,
}

impl DependencyGraph {
    pub fn from_manifest(manifest: &Manifest) -> Self {
        let mut dependencies = IndexMap::new();
        let mut dependents: IndexMap<String, Vec<String>> = IndexMap::new();

        for story in &manifest.stories {
            dependencies.insert(story.id.clone(), story.depends_on.clone());
            dependents.entry(story.id.clone()).or_default();
        }
        for story in &manifest.stories {
            for dep in &story.depends_on {
                dependents.entry(dep.clone()).or_default().push(story.id.clone());
            }
        }

        Self { dependencies, dependents }
    }

    /// Kahn's algorithm: peel off nodes with zero remaining in-degree until
    /// none remain. Anything left over is part of (or downstream of) a cycle.
    pub fn topological_order(&self) -> Result<Vec<String>, CycleError> {
        // in_degree[id] = number of dependencies id itself has.
        let mut in_degree: IndexMap<&str, usize> = self
            .dependencies
            .iter()
            .map(|(id, deps)| (id.as_str(), deps.len()))
            .collect();

        let mut queue: VecDeque<String> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(id, _)| id.to_string())
            .collect();
        queue.make_contiguous().sort();

        let mut order = Vec::with_capacity(self.dependencies.len());
        let mut remaining = in_degree;

        while let Some(id) = queue.pop_front() {
            order.push(id.clone());
            if let Some(dependents) = self.dependents.get(&id) {
                let mut newly_free = Vec::new();
                for dependent in dependents {
                    if let Some(deg) = remaining.get_mut(dependent.as_str()) {
                        *deg -= 1;
                        if *deg == 0 {
                            newly_free.push(dependent.clone());
                        }
                    }
                }
                newly_free.sort();
                for id in newly_free {
                    queue.push_back(id);
                }
            }
        }

        if order.len() == self.dependencies.len() {
            return Ok(order);
        }

        Err(CycleError { cycle: self.find_a_cycle(&order) })
    }

    /// Enumerate one concrete cycle among the nodes that Kahn's algorithm
    /// could not order, for the diagnostic message (§8 scenario 6).
    fn find_a_cycle(&self, ordered: &[String]) -> Vec<String> {
        let ordered: HashSet<&str> = ordered.iter().map(|s| s.as_str()).collect();
        let stuck: HashSet<&str> = self
            .dependencies
            .keys()
            .map(|s| s.as_str())
            .filter(|id| !ordered.contains(id))
            .collect();

        let Some(start) = stuck.iter().min().copied() else {
            return Vec::new();
        };

        let mut path = vec![start.to_string()];
        let mut visited: HashSet<String> = std::iter::once(start.to_string()).collect();
        let mut current = start.to_string();

        loop {
            let deps = self
                .dependencies
                .get(current.as_str())
                .map(|v| v.as_slice())
                .unwrap_or(&[]);
            let Some(next) = deps.iter().find(|d| stuck.contains(d.as_str())) else {
                path.push(start.to_string());
                return path;
            };

            if next.as_str() == start {
                path.push(start.to_string());
                return path;
            }
            if !visited.insert(next.clone()) {
                // Walked into a different cycle than `start`'s; still report it.
                path.push(next.clone());
                return path;
            }
            path.push(next.clone());
            current = next.clone();
        }
    }
}
