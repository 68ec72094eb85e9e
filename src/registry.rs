// 🗂️ Registry - discovery and lookup for one entity type
// One instance per entity type, constructed explicitly and passed to whatever
// needs it. Loading happens through an explicit DefinitionSource manifest,
// never by scanning the filesystem, so tests can build isolated registries.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::entities::{codes_equal, normalize_code, Entity, Kpi};

// ============================================================================
// COLLISION POLICY
// ============================================================================

/// What to do when two definitions carry the same code.
///
/// Production data shows first-registered-wins; whether that was intent or an
/// artifact of load order is unknowable from the data, so the policy is
/// configurable instead of hard-coded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollisionPolicy {
    /// Keep the first-registered definition, reject the later one (default)
    #[default]
    FirstWins,
    /// Replace the earlier definition with the later one
    LastWins,
    /// Treat any collision as a hard load failure
    Reject,
}

// ============================================================================
// LOAD REPORT
// ============================================================================

/// A definition that could not be loaded. Skipped, never fatal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadFailure {
    /// Position of the record in the source
    pub index: usize,
    pub reason: String,
}

/// A duplicate code observed at insert time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collision {
    pub code: String,
    /// Which definition survived, per the active policy
    pub resolution: CollisionResolution,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionResolution {
    KeptFirst,
    KeptLast,
}

/// Batch outcome of a `load_all` pass. Bad records never halt the rest of
/// the source; they end up here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped: Vec<LoadFailure>,
    pub collisions: Vec<Collision>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.collisions.is_empty()
    }
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Only raised under `CollisionPolicy::Reject`
    #[error("duplicate code '{code}' rejected at load time")]
    DuplicateCode { code: String },

    #[error("definition source failed: {0}")]
    Source(#[from] anyhow::Error),
}

// ============================================================================
// DEFINITION SOURCE
// ============================================================================

/// Explicit manifest of definitions for one entity type.
///
/// Each record is either a parsed entity or a per-record failure reason;
/// a record that cannot even be read fails closed without poisoning its
/// neighbours.
pub trait DefinitionSource<T> {
    fn load(&self) -> anyhow::Result<Vec<Result<T, String>>>;
}

/// Manifest over an in-memory list of authored definitions.
pub struct StaticSource<T> {
    definitions: Vec<T>,
}

impl<T: Clone> StaticSource<T> {
    pub fn new(definitions: Vec<T>) -> Self {
        StaticSource { definitions }
    }
}

impl<T: Clone> DefinitionSource<T> for StaticSource<T> {
    fn load(&self) -> anyhow::Result<Vec<Result<T, String>>> {
        Ok(self.definitions.iter().cloned().map(Ok).collect())
    }
}

/// Manifest backed by a JSON file holding an array of definition records.
/// One implementation of the source interface; the registry itself never
/// touches the filesystem.
pub struct JsonManifestSource<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonManifestSource<T> {
    pub fn new(path: impl AsRef<Path>) -> Self {
        JsonManifestSource {
            path: path.as_ref().to_path_buf(),
            _marker: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> DefinitionSource<T> for JsonManifestSource<T> {
    fn load(&self) -> anyhow::Result<Vec<Result<T, String>>> {
        use anyhow::Context;

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read manifest: {:?}", self.path))?;

        let records: Vec<serde_json::Value> = serde_json::from_str(&content)
            .with_context(|| format!("manifest is not a JSON array: {:?}", self.path))?;

        let outcomes = records
            .into_iter()
            .map(|record| {
                // A definition without a usable code fails closed before
                // we even attempt to deserialize it.
                match record.get("code").and_then(|c| c.as_str()) {
                    None => return Err("definition is missing a 'code' field".to_string()),
                    Some(code) if code.trim().is_empty() => {
                        return Err("definition has an empty 'code' field".to_string())
                    }
                    Some(_) => {}
                }
                serde_json::from_value(record).map_err(|e| format!("malformed definition: {e}"))
            })
            .collect();

        Ok(outcomes)
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// In-memory container owning all definitions of one entity type.
///
/// Populated once during the single-threaded load phase; read-only
/// afterwards, so it needs no internal locking.
pub struct Registry<T: Entity> {
    entries: HashMap<String, T>,
    policy: CollisionPolicy,
    loaded: bool,
    last_report: Option<LoadReport>,
}

impl<T: Entity> Registry<T> {
    /// Empty registry with the default first-wins collision policy
    pub fn new() -> Self {
        Registry::with_policy(CollisionPolicy::FirstWins)
    }

    pub fn with_policy(policy: CollisionPolicy) -> Self {
        Registry {
            entries: HashMap::new(),
            policy,
            loaded: false,
            last_report: None,
        }
    }

    /// Load every definition the source offers.
    ///
    /// Idempotent: once loaded, further calls return the previous report
    /// without touching the source. Use `force_reload` to start over.
    pub fn load_all(
        &mut self,
        source: &dyn DefinitionSource<T>,
    ) -> Result<LoadReport, RegistryError> {
        if self.loaded {
            return Ok(self
                .last_report
                .clone()
                .unwrap_or_default());
        }
        self.load_inner(source)
    }

    /// Discard loaded state and pull everything from the source again.
    pub fn force_reload(
        &mut self,
        source: &dyn DefinitionSource<T>,
    ) -> Result<LoadReport, RegistryError> {
        self.entries.clear();
        self.loaded = false;
        self.last_report = None;
        self.load_inner(source)
    }

    fn load_inner(
        &mut self,
        source: &dyn DefinitionSource<T>,
    ) -> Result<LoadReport, RegistryError> {
        let mut report = LoadReport::default();

        // Inserts go into a scratch map committed only on success, so a
        // Reject failure leaves the registry exactly as it was and a
        // corrected source can be retried.
        let mut staged = self.entries.clone();

        for (index, outcome) in source.load()?.into_iter().enumerate() {
            match outcome {
                Ok(entity) => {
                    Self::insert_entry(&mut staged, self.policy, entity, index, &mut report)?
                }
                Err(reason) => {
                    warn!(entity_type = %T::ENTITY_TYPE, index, %reason, "skipping definition");
                    report.skipped.push(LoadFailure { index, reason });
                }
            }
        }

        info!(
            entity_type = %T::ENTITY_TYPE,
            loaded = report.loaded,
            skipped = report.skipped.len(),
            collisions = report.collisions.len(),
            "registry load complete"
        );

        self.entries = staged;
        self.loaded = true;
        self.last_report = Some(report.clone());
        Ok(report)
    }

    fn insert_entry(
        entries: &mut HashMap<String, T>,
        policy: CollisionPolicy,
        entity: T,
        index: usize,
        report: &mut LoadReport,
    ) -> Result<(), RegistryError> {
        let raw_code = entity.code().trim();
        if raw_code.is_empty() {
            report.skipped.push(LoadFailure {
                index,
                reason: "definition has an empty code".to_string(),
            });
            return Ok(());
        }

        let key = normalize_code(raw_code);
        if entries.contains_key(&key) {
            warn!(entity_type = %T::ENTITY_TYPE, code = %key, ?policy, "code collision");
            match policy {
                CollisionPolicy::FirstWins => {
                    report.collisions.push(Collision {
                        code: key,
                        resolution: CollisionResolution::KeptFirst,
                    });
                }
                CollisionPolicy::LastWins => {
                    entries.insert(key.clone(), entity);
                    report.collisions.push(Collision {
                        code: key,
                        resolution: CollisionResolution::KeptLast,
                    });
                }
                CollisionPolicy::Reject => {
                    return Err(RegistryError::DuplicateCode { code: key });
                }
            }
            return Ok(());
        }

        entries.insert(key, entity);
        report.loaded += 1;
        Ok(())
    }

    /// Register a single definition outside of a manifest load.
    /// Collisions follow the registry's policy; the report covers just this
    /// insert.
    pub fn register(&mut self, entity: T) -> Result<LoadReport, RegistryError> {
        let mut report = LoadReport::default();
        Self::insert_entry(&mut self.entries, self.policy, entity, 0, &mut report)?;
        Ok(report)
    }

    /// Exact lookup by code, case-insensitive. Missing codes are a normal
    /// condition - callers must check.
    pub fn get(&self, code: &str) -> Option<&T> {
        self.entries.get(&normalize_code(code))
    }

    /// Mutable lookup. Only the single-threaded setup phase uses this.
    pub fn get_mut(&mut self, code: &str) -> Option<&mut T> {
        self.entries.get_mut(&normalize_code(code))
    }

    pub fn contains(&self, code: &str) -> bool {
        self.entries.contains_key(&normalize_code(code))
    }

    /// All definitions in stable order: `display_order` first (unordered
    /// entries sink to the end), then code.
    pub fn get_all(&self) -> Vec<&T> {
        let mut all: Vec<&T> = self.entries.values().collect();
        all.sort_by(|a, b| {
            let oa = a.display_order().unwrap_or(i32::MAX);
            let ob = b.display_order().unwrap_or(i32::MAX);
            oa.cmp(&ob)
                .then_with(|| normalize_code(a.code()).cmp(&normalize_code(b.code())))
        });
        all
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn policy(&self) -> CollisionPolicy {
        self.policy
    }
}

impl<T: Entity> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// KPI REGISTRY VIEWS
// ============================================================================

impl Registry<Kpi> {
    /// KPIs in a category. Linear scan - registries hold hundreds of
    /// entries, not millions, and are populated once.
    pub fn get_by_category(&self, category: &str) -> Vec<&Kpi> {
        self.get_all()
            .into_iter()
            .filter(|k| k.category.eq_ignore_ascii_case(category))
            .collect()
    }

    /// KPIs owned by a module. This is the derived reverse of
    /// `Kpi.modules` - modules store no KPI list of their own, so the two
    /// directions cannot drift.
    pub fn get_by_module(&self, module_code: &str) -> Vec<&Kpi> {
        self.get_all()
            .into_iter()
            .filter(|k| k.owned_by_module(module_code))
            .collect()
    }

    /// KPIs whose formula reads from an object model. Derived reverse of
    /// `Kpi.required_objects`.
    pub fn kpis_for_object(&self, object_code: &str) -> Vec<&Kpi> {
        self.get_all()
            .into_iter()
            .filter(|k| k.requires_object(object_code))
            .collect()
    }

    /// KPIs linked to a benchmark code.
    pub fn kpis_with_benchmark(&self, benchmark_code: &str) -> Vec<&Kpi> {
        self.get_all()
            .into_iter()
            .filter(|k| k.benchmarks.iter().any(|b| codes_equal(b, benchmark_code)))
            .collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{default_kpis, AggregationMethod, Kpi, Module};

    fn kpi(code: &str, order: i32) -> Kpi {
        Kpi::new(code, code).with_display_order(order)
    }

    #[test]
    fn test_load_then_get_round_trip() {
        let mut registry: Registry<Kpi> = Registry::new();
        let source = StaticSource::new(default_kpis());

        let report = registry.load_all(&source).unwrap();

        assert!(report.is_clean());
        assert_eq!(report.loaded, default_kpis().len());
        for definition in default_kpis() {
            let found = registry.get(&definition.code);
            assert!(found.is_some(), "missing {}", definition.code);
            assert_eq!(found.unwrap().code, definition.code);
        }
    }

    #[test]
    fn test_get_is_case_insensitive() {
        let mut registry: Registry<Kpi> = Registry::new();
        registry
            .load_all(&StaticSource::new(vec![kpi("FILL_RATE", 1)]))
            .unwrap();

        assert!(registry.get("fill_rate").is_some());
        assert!(registry.get(" FILL_RATE ").is_some());
        assert!(registry.get("FULL_RATE").is_none());
    }

    #[test]
    fn test_duplicate_code_first_wins_and_is_reported() {
        // Scenario B: two definitions both carrying FILL_RATE
        let first = Kpi::new("FILL_RATE", "Fill Rate (original)")
            .with_aggregation(AggregationMethod::Percentage);
        let second = Kpi::new("FILL_RATE", "Fill Rate (re-import)");

        let mut registry: Registry<Kpi> = Registry::new();
        let report = registry
            .load_all(&StaticSource::new(vec![first, second]))
            .unwrap();

        assert_eq!(report.loaded, 1);
        assert_eq!(report.collisions.len(), 1, "exactly one collision reported");
        assert_eq!(report.collisions[0].code, "FILL_RATE");
        assert_eq!(report.collisions[0].resolution, CollisionResolution::KeptFirst);

        let all = registry.get_all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Fill Rate (original)", "first-registered wins");
    }

    #[test]
    fn test_duplicate_code_last_wins() {
        let mut registry: Registry<Kpi> = Registry::with_policy(CollisionPolicy::LastWins);
        registry
            .load_all(&StaticSource::new(vec![
                Kpi::new("FILL_RATE", "old"),
                Kpi::new("fill_rate", "new"),
            ]))
            .unwrap();

        assert_eq!(registry.count(), 1);
        assert_eq!(registry.get("FILL_RATE").unwrap().name, "new");
    }

    #[test]
    fn test_duplicate_code_reject_policy_fails_load() {
        let mut registry: Registry<Kpi> = Registry::with_policy(CollisionPolicy::Reject);
        let result = registry.load_all(&StaticSource::new(vec![
            Kpi::new("FILL_RATE", "a"),
            Kpi::new("FILL_RATE", "b"),
        ]));

        assert!(matches!(
            result,
            Err(RegistryError::DuplicateCode { code }) if code == "FILL_RATE"
        ));
    }

    #[test]
    fn test_failed_reject_load_leaves_registry_untouched() {
        let mut registry: Registry<Kpi> = Registry::with_policy(CollisionPolicy::Reject);

        // Bad manifest: duplicate code partway through
        let result = registry.load_all(&StaticSource::new(vec![
            Kpi::new("A", "first"),
            Kpi::new("B", "second"),
            Kpi::new("A", "duplicate"),
        ]));
        assert!(matches!(
            result,
            Err(RegistryError::DuplicateCode { ref code }) if code == "A"
        ));

        // Nothing from the failed pass may persist
        assert_eq!(registry.count(), 0);
        assert!(!registry.is_loaded());

        // A corrected source then loads cleanly, including code A
        let report = registry
            .load_all(&StaticSource::new(vec![
                Kpi::new("A", "first"),
                Kpi::new("B", "second"),
            ]))
            .unwrap();
        assert_eq!(report.loaded, 2);
        assert!(registry.get("A").is_some());
    }

    #[test]
    fn test_empty_code_fails_closed() {
        let mut registry: Registry<Kpi> = Registry::new();
        let report = registry
            .load_all(&StaticSource::new(vec![
                Kpi::new("", "nameless"),
                Kpi::new("WIN_RATE", "Win Rate"),
            ]))
            .unwrap();

        assert_eq!(report.loaded, 1, "good record still loads");
        assert_eq!(report.skipped.len(), 1);
        assert!(registry.get("WIN_RATE").is_some());
    }

    #[test]
    fn test_load_all_is_idempotent() {
        let mut registry: Registry<Kpi> = Registry::new();
        let source = StaticSource::new(vec![kpi("A", 1), kpi("B", 2)]);

        let first = registry.load_all(&source).unwrap();
        assert_eq!(first.loaded, 2);

        // Second call returns the loaded state, does not reload
        let second = registry.load_all(&source).unwrap();
        assert_eq!(second.loaded, 2);
        assert_eq!(registry.count(), 2);
    }

    #[test]
    fn test_force_reload_replaces_state() {
        let mut registry: Registry<Kpi> = Registry::new();
        registry
            .load_all(&StaticSource::new(vec![kpi("A", 1)]))
            .unwrap();
        assert_eq!(registry.count(), 1);

        let report = registry
            .force_reload(&StaticSource::new(vec![kpi("B", 1), kpi("C", 2)]))
            .unwrap();
        assert_eq!(report.loaded, 2);
        assert!(registry.get("A").is_none());
        assert!(registry.get("B").is_some());
    }

    #[test]
    fn test_get_all_stable_ordering() {
        let mut registry: Registry<Kpi> = Registry::new();
        registry
            .load_all(&StaticSource::new(vec![
                Kpi::new("ZULU", "z"), // no display_order: sorts after ordered entries, by code
                kpi("CHARLIE", 2),
                kpi("ALPHA", 1),
                Kpi::new("BRAVO", "b"),
            ]))
            .unwrap();

        let codes: Vec<&str> = registry.get_all().iter().map(|k| k.code.as_str()).collect();
        assert_eq!(codes, vec!["ALPHA", "CHARLIE", "BRAVO", "ZULU"]);
    }

    #[test]
    fn test_kpi_filters() {
        let mut registry: Registry<Kpi> = Registry::new();
        registry
            .load_all(&StaticSource::new(default_kpis()))
            .unwrap();

        let inventory = registry.get_by_category("Inventory");
        assert!(inventory.iter().all(|k| k.category == "Inventory"));
        assert!(inventory.iter().any(|k| k.code == "FILL_RATE"));

        let owned = registry.get_by_module("INVENTORY_MGMT");
        assert!(!owned.is_empty());
        assert!(owned.iter().all(|k| k.owned_by_module("INVENTORY_MGMT")));

        let order_readers = registry.kpis_for_object("ORDER");
        assert!(order_readers.iter().any(|k| k.code == "FILL_RATE"));
    }

    #[test]
    fn test_json_manifest_source_skips_bad_records() {
        let manifest = r#"[
            {"code": "FILL_RATE", "name": "Fill Rate"},
            {"name": "no code at all"},
            {"code": "   ", "name": "blank code"},
            {"code": "WIN_RATE", "name": "Win Rate"}
        ]"#;

        let path = std::env::temp_dir().join(format!(
            "kpi_manifest_{}.json",
            uuid::Uuid::new_v4()
        ));
        std::fs::write(&path, manifest).unwrap();

        let source: JsonManifestSource<Kpi> = JsonManifestSource::new(&path);
        let mut registry: Registry<Kpi> = Registry::new();
        let report = registry.load_all(&source).unwrap();

        std::fs::remove_file(&path).ok();

        assert_eq!(report.loaded, 2);
        assert_eq!(report.skipped.len(), 2);
        assert!(registry.get("FILL_RATE").is_some());
        assert!(registry.get("WIN_RATE").is_some());
    }

    #[test]
    fn test_json_manifest_source_missing_file_is_source_error() {
        let source: JsonManifestSource<Module> =
            JsonManifestSource::new("/definitely/not/here.json");
        let mut registry: Registry<Module> = Registry::new();
        assert!(matches!(
            registry.load_all(&source),
            Err(RegistryError::Source(_))
        ));
    }
}
