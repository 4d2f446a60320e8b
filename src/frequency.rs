use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{fields::Attributes, value::AttributeValue};

pub const DEFAULT_TOP_VALUES: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

/// Value distribution of one field across a layer.
///
/// `sorted_values` is ordered by descending count, ties kept in order of
/// first occurrence, and capped at the requested top-N. `unique_count`
/// counts every distinct bucket, including those cut by the cap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldStats {
    pub field: String,
    pub total_features: usize,
    pub valid_count: usize,
    pub unique_count: usize,
    pub sorted_values: Vec<ValueCount>,
}

impl FieldStats {
    /// Share of valid values held by `count`, as a percentage rounded to one
    /// decimal place. `None` when there are no valid values.
    pub fn percentage(&self, count: usize) -> Option<f64> {
        if self.valid_count == 0 {
            return None;
        }
        let percent = count as f64 / self.valid_count as f64 * 100.0;
        Some((percent * 10.0).round() / 10.0)
    }

    pub fn is_truncated(&self) -> bool {
        self.unique_count > self.sorted_values.len()
    }

    pub fn render_rows(&self) -> Vec<Vec<String>> {
        self.sorted_values
            .iter()
            .map(|entry| {
                let percent = self
                    .percentage(entry.count)
                    .map(|p| format!("{p:.1}%"))
                    .unwrap_or_default();
                vec![
                    self.field.clone(),
                    entry.value.clone(),
                    entry.count.to_string(),
                    percent,
                ]
            })
            .collect()
    }
}

/// Computes the distribution of `field_name` using the default top-20 cap.
pub fn compute_stats<'a>(
    features: impl IntoIterator<Item = &'a Attributes>,
    field_name: &str,
) -> Option<FieldStats> {
    compute_stats_with_limit(features, field_name, DEFAULT_TOP_VALUES)
}

/// Computes the distribution of `field_name`, keeping at most `top` buckets
/// (`0` keeps all). Returns `None` when there are no features.
pub fn compute_stats_with_limit<'a>(
    features: impl IntoIterator<Item = &'a Attributes>,
    field_name: &str,
    top: usize,
) -> Option<FieldStats> {
    let mut accumulator = FrequencyAccumulator::default();
    for attributes in features {
        accumulator.ingest(attributes.get(field_name));
    }
    if accumulator.total == 0 {
        return None;
    }
    Some(accumulator.finish(field_name, top))
}

#[derive(Debug, Default)]
struct FrequencyAccumulator {
    total: usize,
    valid: usize,
    positions: HashMap<String, usize>,
    buckets: Vec<ValueCount>,
}

impl FrequencyAccumulator {
    fn ingest(&mut self, value: Option<&AttributeValue>) {
        self.total += 1;
        let Some(key) = value.and_then(AttributeValue::tally_key) else {
            return;
        };
        self.valid += 1;
        match self.positions.get(&key) {
            Some(&idx) => self.buckets[idx].count += 1,
            None => {
                self.positions.insert(key.clone(), self.buckets.len());
                self.buckets.push(ValueCount {
                    value: key,
                    count: 1,
                });
            }
        }
    }

    fn finish(self, field_name: &str, top: usize) -> FieldStats {
        let unique_count = self.buckets.len();
        let mut items = self.buckets;
        // stable: equal counts keep first-occurrence order
        items.sort_by(|a, b| b.count.cmp(&a.count));
        if top > 0 && items.len() > top {
            items.truncate(top);
        }
        FieldStats {
            field: field_name.to_string(),
            total_features: self.total,
            valid_count: self.valid,
            unique_count,
            sorted_values: items,
        }
    }
}
