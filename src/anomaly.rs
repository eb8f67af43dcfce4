//! Per-attribute outlier detection with snapshot-replace semantics.
//!
//! One model is fitted per attribute name from the full reading history,
//! using a fixed contamination fraction: the fitted model keeps the central
//! `[c/2, 1 - c/2]` quantile envelope of its training values and flags
//! anything outside it. The whole model set lives behind a single `Arc`
//! that is swapped wholesale on retrain, so concurrent scorers always see
//! either the old complete set or the new one — never a mix.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use crate::models::{AttributeValue, Reading};

/// Training fallback when an attribute has no history yet. Keeps scoring
/// well-defined from the first reading onward.
const COLD_START_SEED: f64 = 22.0;

// ---

/// A fitted single-attribute outlier model. Pure to consume; its fit is a
/// snapshot of the history at training time.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlierModel {
    // ---
    lo: f64,
    hi: f64,
}

impl OutlierModel {
    /// Fit from training values. Non-finite values are dropped; an empty
    /// (or fully non-finite) sample falls back to the cold-start seed.
    fn fit(values: &[f64], contamination: f64) -> Self {
        // ---
        let mut sample: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if sample.is_empty() {
            sample.push(COLD_START_SEED);
        }
        sample.sort_by(|a, b| a.total_cmp(b));

        let half = (contamination / 2.0).clamp(0.0, 0.5);
        Self {
            lo: quantile(&sample, half),
            hi: quantile(&sample, 1.0 - half),
        }
    }

    /// True iff the value falls outside the trained inlier envelope.
    /// Boundary values are inliers.
    pub fn is_outlier(&self, value: f64) -> bool {
        value < self.lo || value > self.hi
    }
}

/// Linear-interpolation quantile over a sorted, non-empty sample.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    // ---
    let pos = q * (sorted.len() - 1) as f64;
    let idx = pos.floor() as usize;
    let frac = pos - idx as f64;
    if idx + 1 < sorted.len() {
        sorted[idx] + frac * (sorted[idx + 1] - sorted[idx])
    } else {
        sorted[idx]
    }
}

/// Immutable set of fitted models, keyed by attribute name.
pub type ModelSet = HashMap<String, OutlierModel>;

// ---

/// Shared store holding the current [`ModelSet`] snapshot.
///
/// Scoring takes a brief read lock to clone the `Arc`; retraining builds
/// the replacement set off-lock and installs it with a single write.
pub struct ModelStore {
    // ---
    contamination: f64,
    current: RwLock<Arc<ModelSet>>,
}

impl ModelStore {
    pub fn new(contamination: f64) -> Self {
        // ---
        Self {
            contamination,
            current: RwLock::new(Arc::new(ModelSet::new())),
        }
    }

    /// Current snapshot. Cheap; callers may hold it as long as they like
    /// without blocking a concurrent retrain.
    pub fn snapshot(&self) -> Arc<ModelSet> {
        // ---
        Arc::clone(&self.current.read().unwrap_or_else(|e| e.into_inner()))
    }

    /// Refit one model per attribute from the full reading history and
    /// install the result atomically.
    ///
    /// `known_attributes` are schema-declared names that must have a model
    /// even with no history yet (cold start). Attribute values that do not
    /// coerce to a float contribute nothing to their sample. Returns the
    /// number of fitted models.
    pub fn retrain<I>(&self, known_attributes: I, history: &[Reading]) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        // ---
        let mut names: BTreeSet<String> = known_attributes.into_iter().collect();
        let mut samples: HashMap<String, Vec<f64>> = HashMap::new();

        for reading in history {
            for (name, value) in &reading.attributes {
                names.insert(name.clone());
                if let Some(v) = value.as_f64() {
                    samples.entry(name.clone()).or_default().push(v);
                }
            }
        }

        let next: ModelSet = names
            .into_iter()
            .map(|name| {
                let values = samples.remove(&name).unwrap_or_default();
                let model = OutlierModel::fit(&values, self.contamination);
                (name, model)
            })
            .collect();

        let count = next.len();
        let next = Arc::new(next);
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = next;

        tracing::info!(models = count, "anomaly model set retrained");
        count
    }

    /// True iff a model exists for `attribute` and classifies `value` as an
    /// outlier. Unknown attributes and non-coercible values are skipped
    /// silently.
    pub fn score(&self, attribute: &str, value: &AttributeValue) -> bool {
        // ---
        let Some(v) = value.as_f64() else {
            return false;
        };
        self.snapshot()
            .get(attribute)
            .is_some_and(|model| model.is_outlier(v))
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn reading(attrs: &[(&str, f64)]) -> Reading {
        // ---
        Reading {
            id: Uuid::new_v4(),
            sensor_id: "s1".into(),
            attributes: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), AttributeValue::Number(*v)))
                .collect(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn empty_history_falls_back_to_single_point_fit() {
        // ---
        let store = ModelStore::new(0.1);
        let count = store.retrain(vec!["temp".to_string()], &[]);
        assert_eq!(count, 1);

        // Scoring must answer without panicking; the seed itself is an inlier.
        assert!(!store.score("temp", &AttributeValue::Number(COLD_START_SEED)));
        assert!(store.score("temp", &AttributeValue::Number(1000.0)));
    }

    #[test]
    fn trained_envelope_flags_extremes_only() {
        // ---
        let store = ModelStore::new(0.1);
        let history: Vec<Reading> = (0..50)
            .map(|i| reading(&[("temp", 20.0 + (i % 10) as f64 * 0.5)]))
            .collect();
        store.retrain(std::iter::empty(), &history);

        assert!(!store.score("temp", &AttributeValue::Number(22.0)));
        assert!(store.score("temp", &AttributeValue::Number(1000.0)));
        assert!(store.score("temp", &AttributeValue::Number(-40.0)));
    }

    #[test]
    fn unknown_attribute_is_never_flagged() {
        // ---
        let store = ModelStore::new(0.1);
        store.retrain(std::iter::empty(), &[reading(&[("temp", 21.0)])]);

        assert!(!store.score("humidity", &AttributeValue::Number(1e9)));
    }

    #[test]
    fn non_coercible_value_is_skipped() {
        // ---
        let store = ModelStore::new(0.1);
        store.retrain(std::iter::empty(), &[reading(&[("temp", 21.0)])]);

        assert!(!store.score("temp", &AttributeValue::Text("offline".into())));
    }

    #[test]
    fn retrain_replaces_the_whole_set() {
        // ---
        let store = ModelStore::new(0.1);
        store.retrain(
            std::iter::empty(),
            &[reading(&[("temp", 21.0), ("humidity", 50.0)])],
        );
        assert!(store.score("humidity", &AttributeValue::Number(1e6)));

        // Second fit without humidity history or declaration drops its model.
        store.retrain(std::iter::empty(), &[reading(&[("temp", 21.0)])]);
        assert!(!store.score("humidity", &AttributeValue::Number(1e6)));
    }

    #[test]
    fn snapshot_is_stable_across_retrain() {
        // ---
        let store = ModelStore::new(0.1);
        store.retrain(vec!["temp".to_string()], &[]);

        let before = store.snapshot();
        store.retrain(
            std::iter::empty(),
            &[reading(&[("temp", 21.0), ("humidity", 50.0)])],
        );

        // The old snapshot is untouched; the new one has both models.
        assert_eq!(before.len(), 1);
        assert_eq!(store.snapshot().len(), 2);
    }

    #[test]
    fn bool_history_coerces_to_zero_one() {
        // ---
        let store = ModelStore::new(0.1);
        let mut r = reading(&[]);
        r.attributes
            .insert("door_open".into(), AttributeValue::Bool(false));
        let history: Vec<Reading> = (0..20).map(|_| r.clone()).collect();
        store.retrain(std::iter::empty(), &history);

        assert!(!store.score("door_open", &AttributeValue::Bool(false)));
        assert!(store.score("door_open", &AttributeValue::Bool(true)));
    }
}
