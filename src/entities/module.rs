// 🧩 Module Entity - functional capability area
// A module belongs to exactly one calculation domain; the orchestrator
// routes KPIs through that domain. Associated-KPI lists are NOT stored
// here - `Kpi.modules` is the source of truth and the reverse view is
// computed by the KPI registry.

use serde::{Deserialize, Serialize};

use super::{Entity, EntityType, Metadata};

// ============================================================================
// MODULE ENTITY
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    /// Stable identity - UPPER_SNAKE, never changes
    pub code: String,

    /// Display name
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Calculation domain that owns this module's KPIs (handler routing key)
    pub domain: String,

    /// Value chains this module participates in (codes)
    #[serde(default)]
    pub value_chains: Vec<String>,

    /// Industries where this module commonly applies (codes)
    #[serde(default)]
    pub industries: Vec<String>,

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

impl Module {
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Module {
            code: code.into(),
            name: name.into(),
            description: String::new(),
            domain: domain.into(),
            value_chains: Vec::new(),
            industries: Vec::new(),
            is_active: true,
            display_order: None,
            metadata: Metadata::new(),
        }
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn with_value_chain(mut self, code: impl Into<String>) -> Self {
        self.value_chains.push(code.into());
        self
    }

    pub fn with_industry(mut self, code: impl Into<String>) -> Self {
        self.industries.push(code.into());
        self
    }

    pub fn with_display_order(mut self, order: i32) -> Self {
        self.display_order = Some(order);
        self
    }
}

impl Entity for Module {
    const ENTITY_TYPE: EntityType = EntityType::Module;

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

/// Authored module definitions shipped with the catalog.
pub fn default_modules() -> Vec<Module> {
    vec![
        Module::new("INVENTORY_MGMT", "Inventory Management", "supply_chain")
            .with_description("Stock levels, replenishment and warehouse accuracy")
            .with_value_chain("SUPPLY_CHAIN")
            .with_industry("RETAIL")
            .with_industry("DISTRIBUTION")
            .with_display_order(1),
        Module::new("ORDER_MGMT", "Order Management", "supply_chain")
            .with_description("Order capture through fulfillment and delivery")
            .with_value_chain("SUPPLY_CHAIN")
            .with_value_chain("ORDER_TO_CASH")
            .with_industry("RETAIL")
            .with_industry("MANUFACTURING")
            .with_display_order(2),
        Module::new("PROCUREMENT", "Procurement", "supply_chain")
            .with_description("Supplier selection, purchasing and inbound logistics")
            .with_value_chain("SUPPLY_CHAIN")
            .with_industry("MANUFACTURING")
            .with_display_order(3),
        Module::new("SALES_MGMT", "Sales Management", "sales")
            .with_description("Pipeline, quota and deal progression")
            .with_value_chain("LEAD_TO_ORDER")
            .with_value_chain("ORDER_TO_CASH")
            .with_industry("SOFTWARE")
            .with_industry("PROFESSIONAL_SERVICES")
            .with_display_order(4),
        Module::new("CUSTOMER_MGMT", "Customer Management", "crm")
            .with_description("Accounts, retention and customer health")
            .with_value_chain("LEAD_TO_ORDER")
            .with_value_chain("CUSTOMER_CARE")
            .with_industry("SOFTWARE")
            .with_industry("FINANCIAL_SERVICES")
            .with_display_order(5),
        Module::new("MARKETING_MGMT", "Marketing Management", "crm")
            .with_description("Campaigns, lead generation and attribution")
            .with_value_chain("LEAD_TO_ORDER")
            .with_industry("SOFTWARE")
            .with_display_order(6),
        Module::new("SERVICE_DESK", "Service Desk", "crm")
            .with_description("Case intake, resolution and satisfaction")
            .with_value_chain("CUSTOMER_CARE")
            .with_industry("SOFTWARE")
            .with_industry("FINANCIAL_SERVICES")
            .with_display_order(7),
        Module::new("FINANCE_OPS", "Finance Operations", "sales")
            .with_description("Invoicing, collections and revenue recognition")
            .with_value_chain("ORDER_TO_CASH")
            .with_industry("FINANCIAL_SERVICES")
            .with_display_order(8),
    ]
}

// ============================================================================
// TESTS
// ============================================================================
