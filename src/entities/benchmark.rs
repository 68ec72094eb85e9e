// 📈 Benchmark Entity - external reference data point for a KPI
// Linked to its KPI by code via the standard association tables.

use serde::{Deserialize, Serialize};

use super::{Entity, EntityType, Metadata};

// ============================================================================
// BENCHMARK ENTITY
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Benchmark {
    /// Stable identity - UPPER_SNAKE, never changes
    pub code: String,

    /// Display name
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// KPI this benchmark is a reference point for
    pub kpi_code: String,

    /// Reference value, in the KPI's natural unit
    pub value: f64,

    /// Citation for where the value comes from
    #[serde(default)]
    pub source: String,

    /// Qualifier: segment, geography, company size, year, ...
    #[serde(default)]
    pub context: String,

    #[serde(default = "default_active")]
    pub is_active: bool,

    #[serde(default)]
    pub display_order: Option<i32>,

    #[serde(default)]
    pub metadata: Metadata,
}

fn default_active() -> bool {
    true
}

impl Benchmark {
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        kpi_code: impl Into<String>,
        value: f64,
    ) -> Self {
        Benchmark {
            code: code.into(),
            name: name.into(),
            description: String::new(),
            kpi_code: kpi_code.into(),
            value,
            source: String::new(),
            context: String::new(),
            is_active: true,
            display_order: None,
            metadata: Metadata::new(),
        }
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_display_order(mut self, order: i32) -> Self {
        self.display_order = Some(order);
        self
    }
}

impl Entity for Benchmark {
    const ENTITY_TYPE: EntityType = EntityType::Benchmark;

    fn code(&self) -> &str {
        &self.code
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_active(&self) -> bool {
        self.is_active
    }

    fn display_order(&self) -> Option<i32> {
        self.display_order
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

// ============================================================================
// DEFAULT DEFINITION SET
// ============================================================================

/// Authored benchmark definitions shipped with the catalog.
pub fn default_benchmarks() -> Vec<Benchmark> {
    vec![
        Benchmark::new("BM_FILL_RATE_RETAIL", "Retail fill rate median", "FILL_RATE", 94.5)
            .with_source("APQC Open Standards Benchmarking, 2023")
            .with_context("North American retail, median performer")
            .with_display_order(1),
        Benchmark::new("BM_FILL_RATE_TOP", "Retail fill rate top quartile", "FILL_RATE", 98.2)
            .with_source("APQC Open Standards Benchmarking, 2023")
            .with_context("North American retail, 75th percentile")
            .with_display_order(2),
        Benchmark::new(
            "BM_OFCT_DISTRIBUTION",
            "Distribution fulfillment cycle median",
            "ORDER_FULFILLMENT_CYCLE_TIME",
            4.2,
        )
        .with_source("SCOR benchmark tables, 2022 refresh")
        .with_context("Wholesale distribution, days, median")
        .with_display_order(3),
        Benchmark::new(
            "BM_PERFECT_ORDER_MFG",
            "Manufacturing perfect order median",
            "PERFECT_ORDER_RATE",
            90.0,
        )
        .with_source("SCOR benchmark tables, 2022 refresh")
        .with_context("Discrete manufacturing, median")
        .with_display_order(4),
        Benchmark::new(
            "BM_INV_TURNS_RETAIL",
            "Retail inventory turns median",
            "INVENTORY_TURNOVER",
            8.0,
        )
        .with_source("US Census Bureau retail trade data, 2023")
        .with_context("General merchandise retail, annual")
        .with_display_order(5),
        Benchmark::new("BM_CHURN_SAAS", "SaaS annual churn median", "CUSTOMER_CHURN_RATE", 13.0)
            .with_source("KeyBanc SaaS survey, 2023")
            .with_context("Mid-market SaaS, annualized gross churn")
            .with_display_order(6),
        Benchmark::new("BM_NPS_SOFTWARE", "Software NPS median", "NET_PROMOTER_SCORE", 36.0)
            .with_source("Satmetrix industry NPS report, 2023")
            .with_context("B2B software, median")
            .with_display_order(7),
        Benchmark::new("BM_WIN_RATE_B2B", "B2B win rate median", "WIN_RATE", 21.0)
            .with_source("RAIN Group sales benchmark, 2023")
            .with_context("B2B qualified pipeline, median")
            .with_display_order(8),
        Benchmark::new("BM_DSO_MIDMARKET", "Mid-market DSO median", "DAYS_SALES_OUTSTANDING", 38.0)
            .with_source("Hackett Group working capital survey, 2023")
            .with_context("Mid-market, cross-industry, days")
            .with_display_order(9),
        Benchmark::new(
            "BM_FRT_SUPPORT",
            "Support first response median",
            "FIRST_RESPONSE_TIME",
            3.9,
        )
        .with_source("Zendesk benchmark report, 2023")
        .with_context("B2B support, business hours, hours to first response")
        .with_display_order(10),
    ]
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_benchmark_builder() {
        let bm = Benchmark::new("BM_TEST", "Test benchmark", "FILL_RATE", 94.5)
            .with_source("Internal study")
            .with_context("Unit test");

        assert_eq!(bm.code, "BM_TEST");
        assert_eq!(bm.kpi_code, "FILL_RATE");
        assert_eq!(bm.value, 94.5);
        assert_eq!(bm.source, "Internal study");
    }

    #[test]
    fn test_default_benchmarks_have_unique_codes() {
        let benchmarks = default_benchmarks();
        let mut codes: Vec<&str> = benchmarks.iter().map(|b| b.code.as_str()).collect();
        let total = codes.len();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), total);
    }

    #[test]
    fn test_default_benchmarks_reference_default_kpis() {
        let kpis = super::super::kpi::default_kpis();
        for bm in default_benchmarks() {
            assert!(
                kpis.iter().any(|k| k.code == bm.kpi_code),
                "benchmark {} references unknown KPI {}",
                bm.code,
                bm.kpi_code
            );
        }
    }
}
