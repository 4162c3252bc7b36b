//! Fill-order resolution over foreign-key edges.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A table together with the raw names of the tables it references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableNode {
    pub name: String,
    pub references: Vec<String>,
}

impl TableNode {
    pub fn new(name: impl Into<String>, references: Vec<String>) -> Self {
        Self {
            name: name.into(),
            references,
        }
    }
}

/// What to do when the foreign-key graph contains a cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePolicy {
    /// Drop the edge that closes the cycle and keep going.
    #[default]
    Break,
    /// Fail with [`Error::InvalidSchema`].
    Reject,
}

/// A foreign-key edge from a referencing table to a referenced one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

/// Outcome of resolving a fill order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Table names, referenced tables first.
    pub order: Vec<String>,
    /// Edges whose target is not a known table.
    pub dropped_edges: Vec<Edge>,
    /// Cycles broken under [`CyclePolicy::Break`], each closed on its first table.
    pub broken_cycles: Vec<Vec<String>>,
}

/// Resolve a fill order by depth-first expansion of reference chains.
///
/// Every input table is used as a root in input order. A table's references
/// are walked last-to-first; a table is scheduled once all of its references
/// are scheduled, and never twice (names compare case-insensitively).
pub fn resolve_fill_order(nodes: &[TableNode], policy: CyclePolicy) -> Result<Resolution> {
    let mut resolver = Resolver::new(nodes, policy);
    for idx in 0..nodes.len() {
        resolver.visit(idx)?;
    }
    Ok(resolver.resolution)
}

struct Resolver<'a> {
    nodes: &'a [TableNode],
    policy: CyclePolicy,
    index: HashMap<String, usize>,
    scheduled: HashSet<String>,
    branch: Vec<usize>,
    resolution: Resolution,
}

impl<'a> Resolver<'a> {
    fn new(nodes: &'a [TableNode], policy: CyclePolicy) -> Self {
        let mut index = HashMap::new();
        for (idx, node) in nodes.iter().enumerate() {
            index.entry(node.name.to_lowercase()).or_insert(idx);
        }
        Self {
            nodes,
            policy,
            index,
            scheduled: HashSet::new(),
            branch: Vec::new(),
            resolution: Resolution::default(),
        }
    }

    fn visit(&mut self, idx: usize) -> Result<()> {
        let node = &self.nodes[idx];
        if self.scheduled.contains(&node.name.to_lowercase()) {
            return Ok(());
        }

        self.branch.push(idx);
        for reference in node.references.iter().rev() {
            let Some(&target) = self.index.get(&reference.to_lowercase()) else {
                self.resolution.dropped_edges.push(Edge {
                    from: node.name.clone(),
                    to: reference.clone(),
                });
                continue;
            };

            if self
                .scheduled
                .contains(&self.nodes[target].name.to_lowercase())
            {
                continue;
            }

            if let Some(start) = self.branch.iter().position(|&on_branch| on_branch == target) {
                let mut cycle: Vec<String> = self.branch[start..]
                    .iter()
                    .map(|&member| self.nodes[member].name.clone())
                    .collect();
                cycle.push(self.nodes[target].name.clone());
                match self.policy {
                    CyclePolicy::Reject => {
                        return Err(Error::InvalidSchema(format!(
                            "foreign key cycle: {}",
                            cycle.join(" -> ")
                        )));
                    }
                    CyclePolicy::Break => {
                        self.resolution.broken_cycles.push(cycle);
                        continue;
                    }
                }
            }

            self.visit(target)?;
        }
        self.branch.pop();

        if self.scheduled.insert(node.name.to_lowercase()) {
            self.resolution.order.push(node.name.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, references: &[&str]) -> TableNode {
        TableNode::new(
            name,
            references.iter().map(|reference| reference.to_string()).collect(),
        )
    }

    fn position(order: &[String], name: &str) -> usize {
        order
            .iter()
            .position(|item| item.eq_ignore_ascii_case(name))
            .unwrap_or_else(|| panic!("{name} missing from {order:?}"))
    }

    #[test]
    fn orders_dependencies_first() {
        let nodes = vec![
            node("orders", &["users", "products"]),
            node("order_items", &["orders", "products"]),
            node("users", &[]),
            node("products", &["categories"]),
            node("categories", &[]),
        ];
        let resolution = resolve_fill_order(&nodes, CyclePolicy::Break).expect("resolve");
        let order = &resolution.order;
        assert_eq!(order.len(), nodes.len());
        for node in &nodes {
            for reference in &node.references {
                assert!(position(order, reference) < position(order, &node.name));
            }
        }
        assert!(resolution.dropped_edges.is_empty());
        assert!(resolution.broken_cycles.is_empty());
    }

    #[test]
    fn traversal_order_breaks_ties() {
        let nodes = vec![node("orders", &["users", "products"]), node("users", &[]), node("products", &[])];
        let resolution = resolve_fill_order(&nodes, CyclePolicy::Break).expect("resolve");
        assert_eq!(resolution.order, vec!["products", "users", "orders"]);
    }

    #[test]
    fn schedules_each_table_once_case_insensitively() {
        let nodes = vec![
            node("Users", &[]),
            node("orders", &["USERS", "users"]),
            node("users", &[]),
        ];
        let resolution = resolve_fill_order(&nodes, CyclePolicy::Break).expect("resolve");
        assert_eq!(resolution.order, vec!["Users", "orders"]);
    }

    #[test]
    fn drops_unknown_references() {
        let nodes = vec![node("orders", &["ghost", "users"]), node("users", &[])];
        let resolution = resolve_fill_order(&nodes, CyclePolicy::Break).expect("resolve");
        assert_eq!(resolution.order, vec!["users", "orders"]);
        assert_eq!(
            resolution.dropped_edges,
            vec![Edge {
                from: "orders".to_string(),
                to: "ghost".to_string()
            }]
        );
    }

    #[test]
    fn breaks_two_table_cycle() {
        let nodes = vec![node("a", &["b"]), node("b", &["a"])];
        let resolution = resolve_fill_order(&nodes, CyclePolicy::Break).expect("resolve");
        assert_eq!(resolution.order, vec!["b", "a"]);
        assert_eq!(resolution.broken_cycles, vec![vec!["a", "b", "a"]]);
    }

    #[test]
    fn breaks_self_reference() {
        let nodes = vec![node("employees", &["employees"])];
        let resolution = resolve_fill_order(&nodes, CyclePolicy::Break).expect("resolve");
        assert_eq!(resolution.order, vec!["employees"]);
        assert_eq!(resolution.broken_cycles, vec![vec!["employees", "employees"]]);
    }

    #[test]
    fn rejects_cycle_when_strict() {
        let nodes = vec![node("a", &["b"]), node("b", &["c"]), node("c", &["a"])];
        let err = resolve_fill_order(&nodes, CyclePolicy::Reject).expect_err("cycle");
        match err {
            Error::InvalidSchema(message) => {
                assert_eq!(message, "foreign key cycle: a -> b -> c -> a");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
