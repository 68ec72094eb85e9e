// 🔀 Relationship Map - declarative association tables + setup procedures
// Associations are data: a table says which codes link to which, a setup
// procedure applies it against two populated registries. Membership checks
// compare codes, never object identity, so re-running a setup is a no-op.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::entities::{Benchmark, Kpi, Module, ObjectModel, ValueChain};
use crate::registry::Registry;

// ============================================================================
// RELATIONSHIP KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    /// value chain contains module
    Contains,
    /// KPI has benchmark reference point
    Benchmarks,
    /// KPI formula requires object model
    Requires,
}

impl RelationshipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipKind::Contains => "contains",
            RelationshipKind::Benchmarks => "benchmarks",
            RelationshipKind::Requires => "requires",
        }
    }
}

impl std::fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ASSOCIATION TABLE
// ============================================================================

/// One declared association: a from-code and everything it links to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociationEntry {
    pub from_code: String,
    pub to_codes: Vec<String>,
}

/// A declarative many-to-many association table for one relationship kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociationTable {
    pub kind: RelationshipKind,
    pub entries: Vec<AssociationEntry>,
}

impl AssociationTable {
    pub fn new(kind: RelationshipKind) -> Self {
        AssociationTable {
            kind,
            entries: Vec::new(),
        }
    }

    pub fn link<S: Into<String>>(
        mut self,
        from_code: impl Into<String>,
        to_codes: impl IntoIterator<Item = S>,
    ) -> Self {
        self.entries.push(AssociationEntry {
            from_code: from_code.into(),
            to_codes: to_codes.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Every (from, to) pair the table declares
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().flat_map(|entry| {
            entry
                .to_codes
                .iter()
                .map(move |to| (entry.from_code.as_str(), to.as_str()))
        })
    }
}

// ============================================================================
// WIRING REPORT
// ============================================================================

/// A pair the setup could not wire. Skipped and reported, never fatal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedPair {
    pub from_code: String,
    pub to_code: String,
    pub reason: String,
}

/// Batch outcome of one setup run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WiringReport {
    pub kind: RelationshipKind,
    /// Pairs newly wired by this run
    pub linked: usize,
    /// Pairs that were already wired - the idempotence path
    pub already_present: usize,
    pub skipped: Vec<SkippedPair>,
}

impl WiringReport {
    fn new(kind: RelationshipKind) -> Self {
        WiringReport {
            kind,
            linked: 0,
            already_present: 0,
            skipped: Vec::new(),
        }
    }

    fn skip(&mut self, from: &str, to: &str, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(kind = %self.kind, from, to, %reason, "skipping pair");
        self.skipped.push(SkippedPair {
            from_code: from.to_string(),
            to_code: to.to_string(),
            reason,
        });
    }

    fn finish(self) -> Self {
        info!(
            kind = %self.kind,
            linked = self.linked,
            already_present = self.already_present,
            skipped = self.skipped.len(),
            "relationship setup complete"
        );
        self
    }
}

// ============================================================================
// SETUP PROCEDURES
// ============================================================================

/// Wire value-chain membership: append each module code into
/// `ValueChain.modules` when both sides resolve and the member is not
/// already present.
pub fn setup_value_chain_modules(
    value_chains: &mut Registry<ValueChain>,
    modules: &Registry<Module>,
    table: &AssociationTable,
) -> WiringReport {
    let mut report = WiringReport::new(table.kind);

    for (from, to) in table.pairs() {
        if !modules.contains(to) {
            report.skip(from, to, "module not found");
            continue;
        }
        let Some(chain) = value_chains.get_mut(from) else {
            report.skip(from, to, "value chain not found");
            continue;
        };

        if chain.add_module(to) {
            report.linked += 1;
        } else {
            report.already_present += 1;
        }
    }

    report.finish()
}

/// Wire benchmark references: append each benchmark code into
/// `Kpi.benchmarks` (append-only list) when both sides resolve.
pub fn setup_kpi_benchmarks(
    kpis: &mut Registry<Kpi>,
    benchmarks: &Registry<Benchmark>,
    table: &AssociationTable,
) -> WiringReport {
    let mut report = WiringReport::new(table.kind);

    for (from, to) in table.pairs() {
        if !benchmarks.contains(to) {
            report.skip(from, to, "benchmark not found");
            continue;
        }
        let Some(kpi) = kpis.get_mut(from) else {
            report.skip(from, to, "KPI not found");
            continue;
        };

        if kpi.add_benchmark(to) {
            report.linked += 1;
        } else {
            report.already_present += 1;
        }
    }

    report.finish()
}

/// Wire object-model requirements into `Kpi.required_objects` - the
/// authoritative side of the object-model↔KPI pair. The table is keyed
/// from object model to the KPIs that read it.
pub fn setup_object_model_kpis(
    kpis: &mut Registry<Kpi>,
    object_models: &Registry<ObjectModel>,
    table: &AssociationTable,
) -> WiringReport {
    let mut report = WiringReport::new(table.kind);

    for (from, to) in table.pairs() {
        if !object_models.contains(from) {
            report.skip(from, to, "object model not found");
            continue;
        }
        let Some(kpi) = kpis.get_mut(to) else {
            report.skip(from, to, "KPI not found");
            continue;
        };

        if kpi.add_required_object(from) {
            report.linked += 1;
        } else {
            report.already_present += 1;
        }
    }

    report.finish()
}

// ============================================================================
// STANDARD TABLES
// ============================================================================

/// The shipped value-chain membership map.
pub fn standard_value_chain_modules() -> AssociationTable {
    AssociationTable::new(RelationshipKind::Contains)
        .link("SUPPLY_CHAIN", ["INVENTORY_MGMT", "ORDER_MGMT", "PROCUREMENT"])
        .link("LEAD_TO_ORDER", ["SALES_MGMT", "CUSTOMER_MGMT", "MARKETING_MGMT"])
        .link("ORDER_TO_CASH", ["ORDER_MGMT", "SALES_MGMT", "FINANCE_OPS"])
        .link("CUSTOMER_CARE", ["CUSTOMER_MGMT", "SERVICE_DESK"])
}

/// The shipped KPI→benchmark map, derived from the authored benchmark set
/// so the two can never disagree.
pub fn standard_kpi_benchmarks() -> AssociationTable {
    let mut table = AssociationTable::new(RelationshipKind::Benchmarks);

    for benchmark in crate::entities::default_benchmarks() {
        match table
            .entries
            .iter_mut()
            .find(|e| e.from_code == benchmark.kpi_code)
        {
            Some(entry) => entry.to_codes.push(benchmark.code),
            None => table.entries.push(AssociationEntry {
                from_code: benchmark.kpi_code,
                to_codes: vec![benchmark.code],
            }),
        }
    }

    table
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{default_benchmarks, default_modules, default_value_chains};
    use crate::registry::StaticSource;

    fn loaded<T: crate::entities::Entity>(defs: Vec<T>) -> Registry<T> {
        let mut registry = Registry::new();
        registry.load_all(&StaticSource::new(defs)).unwrap();
        registry
    }

    #[test]
    fn test_setup_wires_declared_pairs() {
        // Scenario A: SUPPLY_CHAIN contains INVENTORY_MGMT
        let mut chains = loaded(vec![ValueChain::new("SUPPLY_CHAIN", "Supply Chain")]);
        let modules = loaded(vec![Module::new(
            "INVENTORY_MGMT",
            "Inventory Management",
            "supply_chain",
        )]);
        let table = AssociationTable::new(RelationshipKind::Contains)
            .link("SUPPLY_CHAIN", ["INVENTORY_MGMT"]);

        let report = setup_value_chain_modules(&mut chains, &modules, &table);

        assert_eq!(report.linked, 1);
        assert!(report.skipped.is_empty());

        let chain = chains.get("SUPPLY_CHAIN").unwrap();
        assert_eq!(chain.modules, vec!["INVENTORY_MGMT"]);
    }

    #[test]
    fn test_setup_twice_is_a_no_op() {
        let mut chains = loaded(default_value_chains());
        let modules = loaded(default_modules());
        let table = standard_value_chain_modules();

        setup_value_chain_modules(&mut chains, &modules, &table);
        let size_after_first: usize = chains.get_all().iter().map(|c| c.modules.len()).sum();

        let second = setup_value_chain_modules(&mut chains, &modules, &table);
        let size_after_second: usize = chains.get_all().iter().map(|c| c.modules.len()).sum();

        assert_eq!(size_after_first, size_after_second, "idempotence");
        assert_eq!(second.linked, 0);
        assert_eq!(second.already_present, size_after_first);
    }

    #[test]
    fn test_presence_check_uses_code_equality_not_identity() {
        // Reload produces fresh instances with equal codes; identity-based
        // checks would duplicate the member here.
        let mut chains = loaded(vec![ValueChain::new("SUPPLY_CHAIN", "Supply Chain")]);
        let modules_a = loaded(vec![Module::new("INVENTORY_MGMT", "Inventory", "supply_chain")]);
        let modules_b = loaded(vec![Module::new("inventory_mgmt", "Inventory", "supply_chain")]);
        let table = AssociationTable::new(RelationshipKind::Contains)
            .link("SUPPLY_CHAIN", ["INVENTORY_MGMT"]);
        let table_lower = AssociationTable::new(RelationshipKind::Contains)
            .link("SUPPLY_CHAIN", ["inventory_mgmt"]);

        setup_value_chain_modules(&mut chains, &modules_a, &table);
        setup_value_chain_modules(&mut chains, &modules_b, &table_lower);

        assert_eq!(chains.get("SUPPLY_CHAIN").unwrap().modules.len(), 1);
    }

    #[test]
    fn test_missing_side_is_skipped_and_reported() {
        let mut chains = loaded(vec![ValueChain::new("SUPPLY_CHAIN", "Supply Chain")]);
        let modules = loaded(vec![Module::new("ORDER_MGMT", "Orders", "supply_chain")]);
        let table = AssociationTable::new(RelationshipKind::Contains)
            .link("SUPPLY_CHAIN", ["ORDER_MGMT", "GHOST_MODULE"])
            .link("GHOST_CHAIN", ["ORDER_MGMT"]);

        let report = setup_value_chain_modules(&mut chains, &modules, &table);

        assert_eq!(report.linked, 1);
        assert_eq!(report.skipped.len(), 2);
        let reasons: Vec<&str> = report.skipped.iter().map(|s| s.reason.as_str()).collect();
        assert!(reasons.contains(&"module not found"));
        assert!(reasons.contains(&"value chain not found"));
    }

    #[test]
    fn test_kpi_benchmark_wiring_is_idempotent() {
        let mut kpis = loaded(crate::entities::default_kpis());
        let benchmarks = loaded(default_benchmarks());
        let table = standard_kpi_benchmarks();

        let first = setup_kpi_benchmarks(&mut kpis, &benchmarks, &table);
        assert_eq!(first.linked, default_benchmarks().len());
        assert!(first.skipped.is_empty());

        let second = setup_kpi_benchmarks(&mut kpis, &benchmarks, &table);
        assert_eq!(second.linked, 0);
        assert_eq!(second.already_present, default_benchmarks().len());

        let fill_rate = kpis.get("FILL_RATE").unwrap();
        assert!(fill_rate.has_benchmark("BM_FILL_RATE_RETAIL"));
        assert!(fill_rate.has_benchmark("BM_FILL_RATE_TOP"));
    }

    #[test]
    fn test_object_model_wiring_targets_kpi_required_objects() {
        let mut kpis = loaded(vec![Kpi::new("WIN_RATE", "Win Rate")]);
        let objects = loaded(vec![ObjectModel::new("DEAL", "Deal")]);
        let table =
            AssociationTable::new(RelationshipKind::Requires).link("DEAL", ["WIN_RATE"]);

        let report = setup_object_model_kpis(&mut kpis, &objects, &table);
        assert_eq!(report.linked, 1);
        assert!(kpis.get("WIN_RATE").unwrap().requires_object("DEAL"));

        // Second run finds the requirement already recorded
        let second = setup_object_model_kpis(&mut kpis, &objects, &table);
        assert_eq!(second.linked, 0);
        assert_eq!(second.already_present, 1);
    }

    #[test]
    fn test_standard_tables_resolve_against_default_definitions() {
        let mut chains = loaded(default_value_chains());
        let modules = loaded(default_modules());
        let report =
            setup_value_chain_modules(&mut chains, &modules, &standard_value_chain_modules());
        assert!(
            report.skipped.is_empty(),
            "standard table references unknown codes: {:?}",
            report.skipped
        );
    }
}
