// 🏭 Industry Entity - sector classification
// Carries referential KPI hints; nothing here is enforced at write time.

use serde::{Deserialize, Serialize};

use super::{Entity, EntityType, Metadata};

// ============================================================================
// INDUSTRY ENTITY
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Industry {
    /// Stable identity - UPPER_SNAKE, never changes
    pub code: String,

    /// Display name
    pub name: String,

    /// What this sector covers
    #[serde(default)]
    pub description: String,

    /// Metrics commonly tracked in this sector (free text)
    #[serde(default)]
    pub typical_metrics: Vec<String>,

    /// KPI codes usually relevant to this sector.
    /// Referential only - not validated against the KPI registry at load time.
    #[serde(default)]
    pub common_kpis: Vec<String>,

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

impl Industry {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Industry {
            code: code.into(),
            name: name.into(),
            description: String::new(),
            typical_metrics: Vec::new(),
            common_kpis: Vec::new(),
            is_active: true,
            display_order: None,
            metadata: Metadata::new(),
        }
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn with_metric(mut self, metric: impl Into<String>) -> Self {
        self.typical_metrics.push(metric.into());
        self
    }

    pub fn with_common_kpi(mut self, kpi_code: impl Into<String>) -> Self {
        self.common_kpis.push(kpi_code.into());
        self
    }

    pub fn with_display_order(mut self, order: i32) -> Self {
        self.display_order = Some(order);
        self
    }
}

impl Entity for Industry {
    const ENTITY_TYPE: EntityType = EntityType::Industry;

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

/// Authored industry definitions shipped with the catalog.
pub fn default_industries() -> Vec<Industry> {
    vec![
        Industry::new("RETAIL", "Retail")
            .with_description("Consumer-facing sale of goods, physical and online")
            .with_metric("Same-store sales growth")
            .with_metric("Basket size")
            .with_common_kpi("FILL_RATE")
            .with_common_kpi("INVENTORY_TURNOVER")
            .with_display_order(1),
        Industry::new("MANUFACTURING", "Manufacturing")
            .with_description("Production of physical goods from raw materials")
            .with_metric("Overall equipment effectiveness")
            .with_metric("Scrap rate")
            .with_common_kpi("ORDER_FULFILLMENT_CYCLE_TIME")
            .with_common_kpi("PERFECT_ORDER_RATE")
            .with_display_order(2),
        Industry::new("DISTRIBUTION", "Distribution & Logistics")
            .with_description("Warehousing and movement of goods between parties")
            .with_metric("On-time delivery")
            .with_common_kpi("FILL_RATE")
            .with_common_kpi("ORDER_FULFILLMENT_CYCLE_TIME")
            .with_display_order(3),
        Industry::new("SOFTWARE", "Software & SaaS")
            .with_description("Subscription and licensed software businesses")
            .with_metric("Net revenue retention")
            .with_common_kpi("CUSTOMER_CHURN_RATE")
            .with_common_kpi("CUSTOMER_LIFETIME_VALUE")
            .with_display_order(4),
        Industry::new("FINANCIAL_SERVICES", "Financial Services")
            .with_description("Banking, insurance and asset management")
            .with_metric("Cost-to-income ratio")
            .with_common_kpi("SALES_GROWTH_RATE")
            .with_display_order(5),
        Industry::new("PROFESSIONAL_SERVICES", "Professional Services")
            .with_description("Consulting, legal and agency work sold by the hour or project")
            .with_metric("Utilization rate")
            .with_common_kpi("WIN_RATE")
            .with_common_kpi("AVERAGE_DEAL_SIZE")
            .with_display_order(6),
    ]
}

// ============================================================================
// TESTS
// ============================================================================
