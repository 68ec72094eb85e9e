// 🎯 Calculation Orchestrator - Route KPI calculations to domain handlers
// Handlers are registered per domain key; the KPI-to-domain routing table is
// derived from KPI module ownership, never maintained by hand. Results can
// optionally be cached with a TTL, with per-key single-flight so concurrent
// requests for the same KPI and parameters compute once.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::entities::{normalize_code, AggregationMethod, Kpi, Module, TimePeriod};
use crate::registry::Registry;

// ============================================================================
// PARAMETERS AND RESULTS
// ============================================================================

/// Free-form calculation inputs. Handlers decide what they require.
pub type CalculationParams = HashMap<String, serde_json::Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculationResult {
    pub kpi_code: String,
    pub value: f64,
    pub aggregation: AggregationMethod,
    pub period: TimePeriod,
}

// ============================================================================
// HANDLER TRAIT
// ============================================================================

/// A domain calculation engine. One handler serves every KPI routed to its
/// domain key.
pub trait CalculationHandler: Send + Sync {
    /// Domain key this handler serves (e.g. "supply_chain")
    fn domain(&self) -> &'static str;

    /// Reject unusable parameters before any computation happens.
    /// The rejection reason is surfaced to the caller verbatim.
    fn validate(&self, params: &CalculationParams) -> Result<(), String>;

    /// Compute the KPI. `required_objects` carries the object models the
    /// KPI declares, so the handler knows which data sources to consult.
    fn calculate(
        &self,
        kpi_code: &str,
        params: &CalculationParams,
        required_objects: &[String],
    ) -> Result<CalculationResult, String>;
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum CalculationError {
    #[error("routing table not loaded; call load_mappings first")]
    MappingsNotLoaded,

    #[error("unknown KPI '{code}'")]
    UnknownKpi { code: String },

    #[error("KPI '{code}' is not routed to any domain")]
    UnroutedKpi { code: String },

    #[error("no handler registered for domain '{domain}'")]
    NoHandler { domain: String },

    #[error("parameters rejected by '{domain}' handler: {reason}")]
    Rejected { domain: String, reason: String },

    #[error("'{domain}' handler failed: {message}")]
    HandlerFailed { domain: String, message: String },
}

// ============================================================================
// ROUTING
// ============================================================================

#[derive(Debug, Clone)]
struct Route {
    domain: String,
    required_objects: Vec<String>,
}

/// Outcome of building the routing table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingReport {
    pub routed: usize,

    /// KPI codes with no resolvable owning module
    pub unrouted: Vec<String>,
}

// ============================================================================
// RESULT CACHE
// ============================================================================

struct CachedEntry {
    result: CalculationResult,
    computed_at: Instant,
}

struct ResultCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CachedEntry>>,
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ResultCache {
    fn new(ttl: Duration) -> Self {
        ResultCache {
            ttl,
            entries: Mutex::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    fn get_fresh(&self, key: &str) -> Option<CalculationResult> {
        let entries = self.entries.lock().ok()?;
        let entry = entries.get(key)?;
        if entry.computed_at.elapsed() < self.ttl {
            Some(entry.result.clone())
        } else {
            None
        }
    }

    fn insert(&self, key: String, result: CalculationResult) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                key,
                CachedEntry {
                    result,
                    computed_at: Instant::now(),
                },
            );
        }
    }

    /// Per-key guard so concurrent misses for the same key compute once
    fn key_guard(&self, key: &str) -> Option<Arc<Mutex<()>>> {
        let mut inflight = self.inflight.lock().ok()?;
        Some(
            inflight
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone(),
        )
    }

    fn release_guard(&self, key: &str) {
        if let Ok(mut inflight) = self.inflight.lock() {
            inflight.remove(key);
        }
    }
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

pub struct Orchestrator {
    handlers: HashMap<String, Box<dyn CalculationHandler>>,
    routes: HashMap<String, Route>,
    unrouted: HashSet<String>,
    loaded: bool,
    cache: Option<ResultCache>,
}

impl Orchestrator {
    pub fn new() -> Self {
        Orchestrator {
            handlers: HashMap::new(),
            routes: HashMap::new(),
            unrouted: HashSet::new(),
            loaded: false,
            cache: None,
        }
    }

    /// Enable result caching with the given TTL
    pub fn with_cache(mut self, ttl: Duration) -> Self {
        self.cache = Some(ResultCache::new(ttl));
        self
    }

    /// Register a handler under a domain key. Registering the same key
    /// twice replaces the previous handler.
    pub fn register_handler(&mut self, handler: Box<dyn CalculationHandler>) {
        let domain = handler.domain().to_string();
        info!(domain = %domain, "calculation handler registered");
        self.handlers.insert(domain, handler);
    }

    /// Build the KPI routing table from KPI module ownership: each KPI is
    /// routed to the domain of its first owning module that resolves in the
    /// module registry. KPIs with no resolvable owner are reported, not
    /// dropped silently, and calculating them yields `UnroutedKpi`.
    pub fn load_mappings(
        &mut self,
        kpis: &Registry<Kpi>,
        modules: &Registry<Module>,
    ) -> MappingReport {
        self.routes.clear();
        self.unrouted.clear();

        let mut unrouted = Vec::new();

        for kpi in kpis.get_all() {
            let domain = kpi
                .modules
                .iter()
                .find_map(|module_code| modules.get(module_code))
                .map(|module| module.domain.clone());

            match domain {
                Some(domain) => {
                    self.routes.insert(
                        normalize_code(&kpi.code),
                        Route {
                            domain,
                            required_objects: kpi.required_objects.clone(),
                        },
                    );
                }
                None => {
                    warn!(kpi = %kpi.code, "no owning module resolves; KPI left unrouted");
                    self.unrouted.insert(normalize_code(&kpi.code));
                    unrouted.push(kpi.code.clone());
                }
            }
        }

        self.loaded = true;
        unrouted.sort();

        info!(
            routed = self.routes.len(),
            unrouted = unrouted.len(),
            "KPI routing table loaded"
        );

        MappingReport {
            routed: self.routes.len(),
            unrouted,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Domain a KPI is routed to, if any
    pub fn route_for(&self, kpi_code: &str) -> Option<&str> {
        self.routes
            .get(&normalize_code(kpi_code))
            .map(|route| route.domain.as_str())
    }

    /// Calculate one KPI. Validation happens before computation, and
    /// rejection reasons pass through to the caller.
    pub fn calculate(
        &self,
        kpi_code: &str,
        params: &CalculationParams,
    ) -> Result<CalculationResult, CalculationError> {
        if !self.loaded {
            return Err(CalculationError::MappingsNotLoaded);
        }

        let code = normalize_code(kpi_code);
        let route = match self.routes.get(&code) {
            Some(route) => route,
            None if self.unrouted.contains(&code) => {
                return Err(CalculationError::UnroutedKpi { code })
            }
            None => return Err(CalculationError::UnknownKpi { code }),
        };

        let handler = self
            .handlers
            .get(&route.domain)
            .ok_or_else(|| CalculationError::NoHandler {
                domain: route.domain.clone(),
            })?;

        let cache_key = cache_key(&code, params);

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get_fresh(&cache_key) {
                debug!(kpi = %code, "cache hit");
                return Ok(hit);
            }

            if let Some(guard) = cache.key_guard(&cache_key) {
                let _held = guard.lock();

                // Another caller may have computed while we waited
                if let Some(hit) = cache.get_fresh(&cache_key) {
                    cache.release_guard(&cache_key);
                    return Ok(hit);
                }

                let result = self.dispatch(handler.as_ref(), &code, params, route);
                if let Ok(result) = &result {
                    cache.insert(cache_key.clone(), result.clone());
                }
                cache.release_guard(&cache_key);
                return result;
            }
        }

        self.dispatch(handler.as_ref(), &code, params, route)
    }

    fn dispatch(
        &self,
        handler: &dyn CalculationHandler,
        code: &str,
        params: &CalculationParams,
        route: &Route,
    ) -> Result<CalculationResult, CalculationError> {
        handler
            .validate(params)
            .map_err(|reason| CalculationError::Rejected {
                domain: route.domain.clone(),
                reason,
            })?;

        handler
            .calculate(code, params, &route.required_objects)
            .map_err(|message| CalculationError::HandlerFailed {
                domain: route.domain.clone(),
                message,
            })
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

/// Canonical cache key: normalized code plus params serialized with sorted
/// keys, so semantically equal parameter maps share an entry.
fn cache_key(code: &str, params: &CalculationParams) -> String {
    let sorted: BTreeMap<&String, &serde_json::Value> = params.iter().collect();
    let params_json = serde_json::to_string(&sorted).unwrap_or_default();
    format!("{code}|{params_json}")
}

// ============================================================================
// TESTS
// ============================================================================
