use std::collections::BTreeMap;

use rand::RngCore;
use serde_json::Value;

use tablefill_core::Values;

use crate::errors::GenerationError;
use crate::generators::GeneratedValue;
use crate::rng::Draw;

/// Candidate values of a column, resolved once per table.
#[derive(Debug, Clone, PartialEq)]
pub enum ValuePool {
    /// Drawn uniformly.
    List(Vec<GeneratedValue>),
    /// Drawn with probability `weight / total`, entries in key order.
    Weighted { entries: Vec<(String, f64)>, total: f64 },
}

impl ValuePool {
    /// Resolve a column's `values`, following pointers into `pools`.
    pub fn resolve(
        values: &Values,
        pools: &BTreeMap<String, Vec<Value>>,
        column: &str,
    ) -> Result<Self, GenerationError> {
        let pool = match values {
            Values::Pointer(name) => {
                let items = pools.get(name).ok_or_else(|| {
                    GenerationError::invalid(column, format!("unknown value pool {name}"))
                })?;
                ValuePool::List(items.iter().map(GeneratedValue::from_json).collect())
            }
            Values::List(items) => {
                ValuePool::List(items.iter().map(GeneratedValue::from_json).collect())
            }
            Values::Ratio(weights) => {
                if let Some((key, weight)) = weights
                    .iter()
                    .find(|(_, weight)| !weight.is_finite() || **weight < 0.0)
                {
                    return Err(GenerationError::invalid(
                        column,
                        format!("invalid weight {weight} for {key}"),
                    ));
                }
                let entries: Vec<(String, f64)> = weights
                    .iter()
                    .map(|(key, weight)| (key.clone(), *weight))
                    .collect();
                let total = entries.iter().map(|(_, weight)| weight).sum::<f64>();
                if !entries.is_empty() && total <= 0.0 {
                    return Err(GenerationError::invalid(column, "ratio weights sum to zero"));
                }
                ValuePool::Weighted { entries, total }
            }
        };

        if pool.is_empty() {
            return Err(GenerationError::invalid(column, "value pool is empty"));
        }
        Ok(pool)
    }

    pub fn len(&self) -> usize {
        match self {
            ValuePool::List(items) => items.len(),
            ValuePool::Weighted { entries, .. } => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Candidates as text, in pool order.
    pub fn labels(&self) -> Vec<String> {
        match self {
            ValuePool::List(items) => items.iter().map(GeneratedValue::to_csv).collect(),
            ValuePool::Weighted { entries, .. } => {
                entries.iter().map(|(key, _)| key.clone()).collect()
            }
        }
    }

    /// Values `draw` can return, in pool order; zero-weight entries never are.
    pub fn members(&self) -> Vec<GeneratedValue> {
        match self {
            ValuePool::List(items) => items.clone(),
            ValuePool::Weighted { entries, .. } => entries
                .iter()
                .filter(|(_, weight)| *weight > 0.0)
                .map(|(key, _)| GeneratedValue::Text(key.clone()))
                .collect(),
        }
    }

    pub fn draw(&self, rng: &mut dyn RngCore) -> GeneratedValue {
        match self {
            ValuePool::List(items) => items
                .get(rng.index(items.len()))
                .cloned()
                .unwrap_or(GeneratedValue::Null),
            ValuePool::Weighted { entries, total } => {
                let target = rng.real01() * total;
                let mut cumulative = 0.0;
                for (key, weight) in entries {
                    cumulative += weight;
                    if target < cumulative {
                        return GeneratedValue::Text(key.clone());
                    }
                }
                entries
                    .iter()
                    .rev()
                    .find(|(_, weight)| *weight > 0.0)
                    .map(|(key, _)| GeneratedValue::Text(key.clone()))
                    .unwrap_or(GeneratedValue::Null)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::Mt19937;
    use serde_json::json;

    #[test]
    fn resolves_pointer_pools() {
        let mut pools = BTreeMap::new();
        pools.insert("sizes".to_string(), vec![json!("s"), json!("m")]);
        let pool = ValuePool::resolve(&Values::Pointer("sizes".to_string()), &pools, "size")
            .expect("pool");
        assert_eq!(pool.labels(), vec!["s", "m"]);

        let err = ValuePool::resolve(&Values::Pointer("colors".to_string()), &pools, "color")
            .expect_err("unknown pool");
        assert!(err.to_string().contains("unknown value pool colors"));
    }

    #[test]
    fn rejects_empty_lists_and_zero_weights() {
        let pools = BTreeMap::new();
        assert!(ValuePool::resolve(&Values::List(Vec::new()), &pools, "c").is_err());

        let mut weights = BTreeMap::new();
        weights.insert("a".to_string(), 0.0);
        assert!(ValuePool::resolve(&Values::Ratio(weights), &pools, "c").is_err());
    }

    #[test]
    fn ratio_draws_follow_weights() {
        let mut weights = BTreeMap::new();
        weights.insert("closed".to_string(), 1.0);
        weights.insert("open".to_string(), 3.0);
        let pool =
            ValuePool::resolve(&Values::Ratio(weights), &BTreeMap::new(), "status").expect("pool");

        let mut rng = Mt19937::new(42);
        let draws = 20_000;
        let open = (0..draws)
            .filter(|_| pool.draw(&mut rng) == GeneratedValue::Text("open".to_string()))
            .count();
        let share = open as f64 / draws as f64;
        assert!((share - 0.75).abs() < 0.02, "share = {share}");
    }

    #[test]
    fn zero_weight_entries_are_never_drawn() {
        let mut weights = BTreeMap::new();
        weights.insert("never".to_string(), 0.0);
        weights.insert("always".to_string(), 2.0);
        let pool =
            ValuePool::resolve(&Values::Ratio(weights), &BTreeMap::new(), "c").expect("pool");
        let mut rng = Mt19937::new(3);
        for _ in 0..500 {
            assert_eq!(pool.draw(&mut rng), GeneratedValue::Text("always".to_string()));
        }
    }
}
