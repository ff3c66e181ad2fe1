//! Schema Cache (component E)
//!
//! Emergent structural templates folded from repeated instance patterns,
//! kept under a size bound by evicting the least useful schema — frequency
//! weighted by the inverse of its compression ratio.

use crate::attr::{generalize, match_pattern, Attribute, AttrPattern, Bindings};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

fn now_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[derive(Debug, Clone)]
pub struct Schema {
    pub name: String,
    pub template: AttrPattern,
    pub instances: Vec<Attribute>,
    pub frequency: usize,
    pub compression_ratio: f64,
    pub discovered_at: f64,
    pub last_updated: f64,
    pub tags: Vec<String>,
}

impl Schema {
    fn update_with_instance(&mut self, instance: Attribute) {
        self.instances.push(instance);
        self.frequency += 1;
        self.last_updated = now_seconds();
        self.recompute_compression_ratio();
    }

    fn recompute_compression_ratio(&mut self) {
        if self.instances.is_empty() {
            self.compression_ratio = 1.0;
            return;
        }
        let individual_size: usize = self
            .instances
            .iter()
            .map(|i| i.to_compact_string().len())
            .sum();
        let template_size = self.template.template.to_compact_string().len();
        self.compression_ratio = if individual_size > 0 {
            template_size as f64 / individual_size as f64
        } else {
            1.0
        };
    }

    /// Frequency weighted by the inverse of compression ratio — schemas
    /// that are both common and compact score highest.
    fn usefulness(&self) -> f64 {
        self.frequency as f64 * (1.0 / self.compression_ratio.max(0.01))
    }
}

/// One step in a schema's evolution history: the template it replaced, and
/// when.
#[derive(Debug, Clone)]
pub struct SchemaEvolutionStep {
    pub timestamp: f64,
    pub previous_template: AttrPattern,
}

/// Snapshot statistics over the schema cache.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaStatistics {
    pub total_schemas: usize,
    pub average_frequency: f64,
    pub average_compression_ratio: f64,
    pub total_instances_covered: usize,
    pub evolved_schemas: usize,
    pub capacity: usize,
}

pub struct SchemaCache {
    schemas: HashMap<String, Schema>,
    evolution: HashMap<String, Vec<SchemaEvolutionStep>>,
    min_frequency: usize,
    max_schemas: usize,
}

impl SchemaCache {
    pub fn new(min_frequency: usize, max_schemas: usize) -> Self {
        Self {
            schemas: HashMap::new(),
            evolution: HashMap::new(),
            min_frequency,
            max_schemas: max_schemas.max(1),
        }
    }

    /// Discover a schema generalizing `instances`, evicting the least
    /// useful existing schema if the cache is now over capacity.
    pub fn discover_schema(
        &mut self,
        instances: Vec<Attribute>,
        name: Option<String>,
    ) -> Option<Schema> {
        if instances.len() < self.min_frequency {
            return None;
        }

        let template = generalize(&instances)?;
        let name = name.unwrap_or_else(|| {
            let signature = &template.template.to_compact_string();
            let truncated: String = signature.chars().take(50).collect();
            format!("schema_{truncated}_{}", instances.len())
        });

        let individual_size: usize = instances.iter().map(|i| i.to_compact_string().len()).sum();
        let template_size = template.template.to_compact_string().len();
        let compression_ratio = if individual_size > 0 {
            template_size as f64 / individual_size as f64
        } else {
            1.0
        };

        let now = now_seconds();
        let schema = Schema {
            name: name.clone(),
            template,
            frequency: instances.len(),
            instances,
            compression_ratio,
            discovered_at: now,
            last_updated: now,
            tags: Vec::new(),
        };

        self.schemas.insert(name.clone(), schema.clone());

        if self.schemas.len() > self.max_schemas {
            self.evict_least_useful();
        }

        self.schemas.get(&name).cloned()
    }

    fn evict_least_useful(&mut self) {
        let worst = self
            .schemas
            .values()
            .min_by(|a, b| a.usefulness().partial_cmp(&b.usefulness()).unwrap())
            .map(|s| s.name.clone());

        if let Some(name) = worst {
            self.schemas.remove(&name);
            self.evolution.remove(&name);
        }
    }

    /// Schemas whose template matches `attr`, most frequent first.
    pub fn find_matching_schemas(&self, attr: &Attribute) -> Vec<(&Schema, Bindings)> {
        let mut matches: Vec<(&Schema, Bindings)> = self
            .schemas
            .values()
            .filter_map(|s| {
                let result = match_pattern(&s.template, attr);
                result.success.then_some((s, result.bindings))
            })
            .collect();
        matches.sort_by(|a, b| b.0.frequency.cmp(&a.0.frequency));
        matches
    }

    /// Update every schema matching any of `new_instances`; returns the
    /// distinct set of schema names touched.
    pub fn update_schemas(&mut self, new_instances: &[Attribute]) -> Vec<String> {
        let mut updated = std::collections::HashSet::new();
        for instance in new_instances {
            let matching_names: Vec<String> = self
                .find_matching_schemas(instance)
                .into_iter()
                .map(|(s, _)| s.name.clone())
                .collect();
            for name in matching_names {
                if let Some(schema) = self.schemas.get_mut(&name) {
                    schema.update_with_instance(instance.clone());
                }
                updated.insert(name);
            }
        }
        updated.into_iter().collect()
    }

    /// Re-derive a schema's template from its full instance set plus
    /// `new_instances`; records an evolution step only if the template
    /// actually changed.
    pub fn evolve_schema(&mut self, name: &str, new_instances: Vec<Attribute>) -> bool {
        let Some(schema) = self.schemas.get(name) else {
            return false;
        };

        let mut all_instances = schema.instances.clone();
        all_instances.extend(new_instances.iter().cloned());

        let Some(new_template) = generalize(&all_instances) else {
            return false;
        };

        let unchanged = new_template.template.to_compact_string()
            == schema.template.template.to_compact_string();

        let schema = self.schemas.get_mut(name).expect("checked above");
        if unchanged {
            for instance in new_instances {
                schema.update_with_instance(instance);
            }
            return true;
        }

        let previous_template = schema.template.clone();
        self.evolution.entry(name.to_string()).or_default().push(SchemaEvolutionStep {
            timestamp: now_seconds(),
            previous_template,
        });

        schema.template = new_template;
        for instance in new_instances {
            schema.update_with_instance(instance);
        }
        true
    }

    /// Compress instances into schema-reference strings, falling back to a
    /// raw compact-string form when no schema matches.
    pub fn compress_instances(&self, instances: &[Attribute]) -> Vec<String> {
        instances
            .iter()
            .map(|instance| {
                let matches = self.find_matching_schemas(instance);
                match matches.first() {
                    Some((schema, bindings)) => {
                        let mut pairs: Vec<String> = bindings
                            .iter()
                            .map(|(k, v)| format!("{k}={}", v_to_string(v)))
                            .collect();
                        pairs.sort();
                        format!("{}({})", schema.name, pairs.join(","))
                    }
                    None => format!("raw({})", instance.to_compact_string()),
                }
            })
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(name)
    }

    pub fn by_frequency(&self, min_freq: usize) -> Vec<&Schema> {
        self.schemas.values().filter(|s| s.frequency >= min_freq).collect()
    }

    pub fn most_compressive(&self, limit: usize) -> Vec<&Schema> {
        let mut schemas: Vec<&Schema> = self.schemas.values().collect();
        schemas.sort_by(|a, b| a.compression_ratio.partial_cmp(&b.compression_ratio).unwrap());
        schemas.truncate(limit);
        schemas
    }

    /// Remove schemas with poor compression or low frequency. Returns the
    /// number removed.
    pub fn prune_ineffective(&mut self, min_compression_ratio: f64, min_frequency: usize) -> usize {
        let to_remove: Vec<String> = self
            .schemas
            .values()
            .filter(|s| s.compression_ratio > min_compression_ratio || s.frequency < min_frequency)
            .map(|s| s.name.clone())
            .collect();

        for name in &to_remove {
            self.schemas.remove(name);
            self.evolution.remove(name);
        }

        to_remove.len()
    }

    /// The minimum instance count required to discover a new schema.
    pub fn min_frequency(&self) -> usize {
        self.min_frequency
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    pub fn statistics(&self) -> SchemaStatistics {
        if self.schemas.is_empty() {
            return SchemaStatistics {
                total_schemas: 0,
                average_frequency: 0.0,
                average_compression_ratio: 0.0,
                total_instances_covered: 0,
                evolved_schemas: 0,
                capacity: self.max_schemas,
            };
        }

        let total_schemas = self.schemas.len();
        let total_instances: usize = self.schemas.values().map(|s| s.instances.len()).sum();
        let average_frequency =
            self.schemas.values().map(|s| s.frequency as f64).sum::<f64>() / total_schemas as f64;
        let average_compression_ratio = self.schemas.values().map(|s| s.compression_ratio).sum::<f64>()
            / total_schemas as f64;

        SchemaStatistics {
            total_schemas,
            average_frequency,
            average_compression_ratio,
            total_instances_covered: total_instances,
            evolved_schemas: self.evolution.len(),
            capacity: self.max_schemas,
        }
    }
}

fn v_to_string(value: &crate::attr::AttributeValue) -> String {
    match value {
        crate::attr::AttributeValue::Atom { data } => data.to_compact_string(),
        crate::attr::AttributeValue::Variable { name } => format!("?{name}"),
        crate::attr::AttributeValue::Nested { .. } => "<nested>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::Atom;

    fn rpm(value: i64) -> Attribute {
        Attribute::atom("rpm", Atom::Int(value))
    }

    #[test]
    fn discover_schema_requires_min_frequency() {
        let mut cache = SchemaCache::new(3, 10);
        assert!(cache.discover_schema(vec![rpm(1), rpm(2)], None).is_none());
    }

    #[test]
    fn discover_and_match_schema() {
        let mut cache = SchemaCache::new(2, 10);
        let schema = cache.discover_schema(vec![rpm(1), rpm(2)], Some("s1".into())).unwrap();
        assert_eq!(schema.frequency, 2);

        let matches = cache.find_matching_schemas(&rpm(3));
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn update_schemas_increments_frequency() {
        let mut cache = SchemaCache::new(2, 10);
        cache.discover_schema(vec![rpm(1), rpm(2)], Some("s1".into()));
        let updated = cache.update_schemas(&[rpm(3)]);
        assert_eq!(updated, vec!["s1".to_string()]);
        assert_eq!(cache.get("s1").unwrap().frequency, 3);
    }

    #[test]
    fn eviction_drops_least_useful_when_over_capacity() {
        let mut cache = SchemaCache::new(2, 1);
        cache.discover_schema(vec![rpm(1), rpm(2)], Some("s1".into()));
        cache.discover_schema(vec![rpm(3), rpm(4)], Some("s2".into()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn prune_ineffective_removes_low_frequency() {
        let mut cache = SchemaCache::new(2, 10);
        cache.discover_schema(vec![rpm(1), rpm(2)], Some("s1".into()));
        let removed = cache.prune_ineffective(1.0, 5);
        assert_eq!(removed, 1);
    }

    #[test]
    fn compress_instances_falls_back_to_raw() {
        let cache = SchemaCache::new(2, 10);
        let compressed = cache.compress_instances(&[rpm(1)]);
        assert_eq!(compressed, vec!["raw(rpm:1)".to_string()]);
    }
}
