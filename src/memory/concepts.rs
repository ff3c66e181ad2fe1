//! Concept Store (component D)
//!
//! Generalized patterns discovered from episodic observations, reinforced
//! as matching instances recur, and organized into a shallow parent/child
//! hierarchy.

use crate::attr::{generalize, match_pattern, Attribute, AttrPattern, Bindings};
use std::collections::{HashMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};

fn now_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// A generalized concept extracted from matching instances.
#[derive(Debug, Clone)]
pub struct Concept {
    pub name: String,
    pub pattern: AttrPattern,
    pub instances: Vec<Attribute>,
    pub confidence: f64,
    pub created_at: f64,
    pub last_reinforced: f64,
}

impl Concept {
    /// Reinforce with a new matching instance; confidence approaches 1.0
    /// as instances accumulate past 10.
    pub fn reinforce(&mut self, instance: Attribute) {
        self.instances.push(instance);
        self.last_reinforced = now_seconds();
        self.confidence = (self.instances.len() as f64 / 10.0).min(1.0);
    }

    /// Fraction of the pattern's compact-string length that is variable
    /// placeholders — a rough measure of how much the pattern generalizes.
    pub fn generalization_strength(&self) -> f64 {
        if self.instances.len() < 2 {
            return 0.0;
        }
        let variables = self.pattern.extract_variables();
        let rendered_len = self.pattern.template.to_compact_string().len().max(1);
        variables.len() as f64 / rendered_len as f64
    }
}

/// A suggestion to create a new concept, carrying its source key as a
/// structured field rather than requiring callers to re-parse it out of a
/// generated name string.
#[derive(Debug, Clone)]
pub struct ConceptSuggestion {
    pub name: String,
    pub key: String,
    pub instances: Vec<Attribute>,
}

/// Snapshot statistics over the concept store.
#[derive(Debug, Clone, PartialEq)]
pub struct ConceptStatistics {
    pub total_concepts: usize,
    pub average_confidence: f64,
    pub total_instances: usize,
    pub hierarchical_concepts: usize,
    pub high_confidence: usize,
    pub medium_confidence: usize,
    pub low_confidence: usize,
}

#[derive(Default)]
pub struct ConceptStore {
    concepts: HashMap<String, Concept>,
    hierarchy: HashMap<String, HashSet<String>>,
    instance_to_concepts: HashMap<String, HashSet<String>>,
}

impl ConceptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a concept generalizing `instances`, rejecting it if it can't
    /// clear `min_confidence`.
    pub fn create_concept(
        &mut self,
        name: impl Into<String>,
        instances: Vec<Attribute>,
        min_confidence: f64,
    ) -> Option<Concept> {
        if instances.len() < 2 {
            return None;
        }

        let pattern = generalize(&instances)?;
        let confidence = (instances.len() as f64 / 5.0).min(1.0);
        if confidence < min_confidence {
            return None;
        }

        let name = name.into();
        let now = now_seconds();
        let concept = Concept {
            name: name.clone(),
            pattern,
            instances: instances.clone(),
            confidence,
            created_at: now,
            last_reinforced: now,
        };

        for instance in &instances {
            self.instance_to_concepts
                .entry(instance.to_compact_string())
                .or_default()
                .insert(name.clone());
        }
        self.concepts.insert(name, concept.clone());
        Some(concept)
    }

    /// Concepts whose pattern matches `attr`, most confident first.
    pub fn find_matching_concepts(&self, attr: &Attribute) -> Vec<(&Concept, Bindings)> {
        let mut matches: Vec<(&Concept, Bindings)> = self
            .concepts
            .values()
            .filter_map(|c| {
                let result = match_pattern(&c.pattern, attr);
                result.success.then_some((c, result.bindings))
            })
            .collect();
        matches.sort_by(|a, b| b.0.confidence.partial_cmp(&a.0.confidence).unwrap());
        matches
    }

    /// Reinforce every concept whose pattern matches `attr`; returns the
    /// names reinforced.
    pub fn reinforce_concepts(&mut self, attr: &Attribute) -> Vec<String> {
        let matching: Vec<String> = self
            .find_matching_concepts(attr)
            .into_iter()
            .map(|(c, _)| c.name.clone())
            .collect();

        for name in &matching {
            if let Some(concept) = self.concepts.get_mut(name) {
                concept.reinforce(attr.clone());
            }
            self.instance_to_concepts
                .entry(attr.to_compact_string())
                .or_default()
                .insert(name.clone());
        }

        matching
    }

    /// Suggest new concepts from recent instances grouped by key, skipping
    /// groups already covered by an existing concept.
    pub fn suggest_new_concepts(
        &self,
        recent: &[Attribute],
        min_instances: usize,
    ) -> Vec<ConceptSuggestion> {
        if recent.len() < min_instances {
            return Vec::new();
        }

        let mut by_key: HashMap<String, Vec<Attribute>> = HashMap::new();
        for instance in recent {
            by_key.entry(instance.key.clone()).or_default().push(instance.clone());
        }

        let mut suggestions = Vec::new();
        for (key, instances) in by_key {
            if instances.len() < min_instances {
                continue;
            }
            let already_covered = instances
                .iter()
                .take(2)
                .any(|instance| !self.find_matching_concepts(instance).is_empty());
            if already_covered {
                continue;
            }
            suggestions.push(ConceptSuggestion {
                name: format!("concept_{key}_{}", now_seconds() as i64),
                key,
                instances,
            });
        }
        suggestions
    }

    /// Generalize a parent concept over the union of two or more child
    /// concepts' instances.
    pub fn create_hierarchical_concept(
        &mut self,
        parent_name: impl Into<String>,
        child_concepts: &[String],
    ) -> Option<Concept> {
        if child_concepts.len() < 2 {
            return None;
        }

        let mut all_instances = Vec::new();
        for child in child_concepts {
            if let Some(concept) = self.concepts.get(child) {
                all_instances.extend(concept.instances.clone());
            }
        }
        if all_instances.len() < 2 {
            return None;
        }

        let parent_name = parent_name.into();
        let parent = self.create_concept(parent_name.clone(), all_instances, 0.0)?;
        self.hierarchy
            .insert(parent_name, child_concepts.iter().cloned().collect());
        Some(parent)
    }

    pub fn get(&self, name: &str) -> Option<&Concept> {
        self.concepts.get(name)
    }

    pub fn all(&self) -> Vec<&Concept> {
        self.concepts.values().collect()
    }

    pub fn by_confidence(&self, min_confidence: f64) -> Vec<&Concept> {
        self.concepts
            .values()
            .filter(|c| c.confidence >= min_confidence)
            .collect()
    }

    /// Remove concepts that are old and weak, or simply very weak,
    /// regardless of age. Returns the number removed.
    pub fn prune_weak_concepts(&mut self, min_confidence: f64, max_age_hours: f64) -> usize {
        let now = now_seconds();
        let max_age_seconds = max_age_hours * 3600.0;

        let to_remove: Vec<String> = self
            .concepts
            .iter()
            .filter(|(_, c)| {
                let age = now - c.created_at;
                (c.confidence < min_confidence && age > max_age_seconds) || c.confidence < 0.1
            })
            .map(|(name, _)| name.clone())
            .collect();

        for name in &to_remove {
            self.concepts.remove(name);
            self.hierarchy.remove(name);
            for covered in self.instance_to_concepts.values_mut() {
                covered.remove(name);
            }
        }

        to_remove.len()
    }

    pub fn statistics(&self) -> ConceptStatistics {
        if self.concepts.is_empty() {
            return ConceptStatistics {
                total_concepts: 0,
                average_confidence: 0.0,
                total_instances: 0,
                hierarchical_concepts: 0,
                high_confidence: 0,
                medium_confidence: 0,
                low_confidence: 0,
            };
        }

        let total_concepts = self.concepts.len();
        let total_instances: usize = self.concepts.values().map(|c| c.instances.len()).sum();
        let average_confidence =
            self.concepts.values().map(|c| c.confidence).sum::<f64>() / total_concepts as f64;

        ConceptStatistics {
            total_concepts,
            average_confidence,
            total_instances,
            hierarchical_concepts: self.hierarchy.len(),
            high_confidence: self.concepts.values().filter(|c| c.confidence > 0.8).count(),
            medium_confidence: self
                .concepts
                .values()
                .filter(|c| (0.5..=0.8).contains(&c.confidence))
                .count(),
            low_confidence: self.concepts.values().filter(|c| c.confidence < 0.5).count(),
        }
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
    fn create_concept_requires_min_confidence() {
        let mut store = ConceptStore::new();
        let instances = vec![rpm(1), rpm(2)];
        // 2 instances => confidence 0.4, below a 0.5 threshold.
        assert!(store.create_concept("c1", instances, 0.5).is_none());
    }

    #[test]
    fn create_and_reinforce_concept() {
        let mut store = ConceptStore::new();
        let instances = vec![rpm(1), rpm(2), rpm(3)];
        let concept = store.create_concept("c1", instances, 0.3).unwrap();
        assert!((concept.confidence - 0.6).abs() < 1e-9);

        let reinforced = store.reinforce_concepts(&rpm(4));
        assert_eq!(reinforced, vec!["c1".to_string()]);
        assert_eq!(store.get("c1").unwrap().instances.len(), 4);
    }

    #[test]
    fn suggest_new_concepts_skips_covered_groups() {
        let mut store = ConceptStore::new();
        store.create_concept("c1", vec![rpm(1), rpm(2)], 0.0);

        let recent = vec![rpm(1), rpm(2), rpm(3)];
        let suggestions = store.suggest_new_concepts(&recent, 3);
        assert!(suggestions.is_empty());
    }

    #[test]
    fn suggest_new_concepts_reports_key() {
        let store = ConceptStore::new();
        let recent = vec![rpm(1), rpm(2), rpm(3)];
        let suggestions = store.suggest_new_concepts(&recent, 3);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].key, "rpm");
    }

    #[test]
    fn prune_removes_very_low_confidence_regardless_of_age() {
        let mut store = ConceptStore::new();
        store.create_concept("c1", vec![rpm(1), rpm(2)], 0.0);
        let removed = store.prune_weak_concepts(0.5, 24.0);
        assert_eq!(removed, 1);
        assert!(store.get("c1").is_none());
    }

    #[test]
    fn hierarchical_concept_generalizes_children() {
        let mut store = ConceptStore::new();
        store.create_concept("child_a", vec![rpm(1), rpm(2)], 0.0);
        store.create_concept("child_b", vec![rpm(3), rpm(4)], 0.0);

        let parent = store
            .create_hierarchical_concept("parent", &["child_a".to_string(), "child_b".to_string()])
            .unwrap();
        assert_eq!(parent.instances.len(), 4);
        assert_eq!(store.statistics().hierarchical_concepts, 1);
    }
}
