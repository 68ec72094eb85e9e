// 📇 Entity Models - the cataloged business-analytics record types
// One file per entity type; each ships its authored default definition set.

pub mod benchmark;
pub mod industry;
pub mod kpi;
pub mod module;
pub mod object_model;
pub mod value_chain;

pub use benchmark::{default_benchmarks, Benchmark};
pub use industry::{default_industries, Industry};
pub use kpi::{default_kpis, AggregationMethod, Kpi, TimePeriod};
pub use module::{default_modules, Module};
pub use object_model::{default_object_models, ObjectModel};
pub use value_chain::{default_value_chains, ValueChain};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Free-form metadata bag shared by every entity type.
/// Grows without schema changes.
pub type Metadata = HashMap<String, serde_json::Value>;

// ============================================================================
// ENTITY TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Industry,
    ValueChain,
    Module,
    ObjectModel,
    Kpi,
    Benchmark,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Industry => "industry",
            EntityType::ValueChain => "value_chain",
            EntityType::Module => "module",
            EntityType::ObjectModel => "object_model",
            EntityType::Kpi => "kpi",
            EntityType::Benchmark => "benchmark",
        }
    }

    pub fn parse(s: &str) -> Option<EntityType> {
        match s {
            "industry" => Some(EntityType::Industry),
            "value_chain" => Some(EntityType::ValueChain),
            "module" => Some(EntityType::Module),
            "object_model" => Some(EntityType::ObjectModel),
            "kpi" => Some(EntityType::Kpi),
            "benchmark" => Some(EntityType::Benchmark),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ENTITY TRAIT
// ============================================================================

/// Common surface of every cataloged record.
///
/// `code` is the stable identity: immutable, compared case-insensitively.
/// Everything else is a value that can change between catalog revisions.
pub trait Entity: Clone + Serialize {
    const ENTITY_TYPE: EntityType;

    fn code(&self) -> &str;
    fn name(&self) -> &str;
    fn is_active(&self) -> bool;
    fn display_order(&self) -> Option<i32>;
    fn metadata(&self) -> &Metadata;
}

/// Canonical form of a code for lookups and uniqueness checks.
/// Codes are authored in UPPER_SNAKE; reloads and manifests may disagree on
/// case, so every comparison goes through this.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// True when the two codes identify the same entity.
pub fn codes_equal(a: &str, b: &str) -> bool {
    normalize_code(a) == normalize_code(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("fill_rate"), "FILL_RATE");
        assert_eq!(normalize_code("  Inventory_Mgmt "), "INVENTORY_MGMT");
        assert_eq!(normalize_code("FILL_RATE"), "FILL_RATE");
    }

    #[test]
    fn test_codes_equal() {
        assert!(codes_equal("fill_rate", "FILL_RATE"));
        assert!(codes_equal("Supply_Chain", "SUPPLY_CHAIN "));
        assert!(!codes_equal("FILL_RATE", "ORDER_ACCURACY"));
    }

    #[test]
    fn test_entity_type_round_trip() {
        for et in [
            EntityType::Industry,
            EntityType::ValueChain,
            EntityType::Module,
            EntityType::ObjectModel,
            EntityType::Kpi,
            EntityType::Benchmark,
        ] {
            assert_eq!(EntityType::parse(et.as_str()), Some(et));
        }
        assert_eq!(EntityType::parse("merchant"), None);
    }
}
