// 🔗 ValueChain Entity - cross-industry business process grouping
// Member modules are an embedded collection of codes, wired by the
// relationship setup procedures. Order-irrelevant, duplicates must not
// accumulate across repeated setup runs.

use serde::{Deserialize, Serialize};

use super::{codes_equal, Entity, EntityType, Metadata};

// ============================================================================
// VALUE CHAIN ENTITY
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueChain {
    /// Stable identity - UPPER_SNAKE, never changes
    pub code: String,

    /// Display name
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Member module codes. Populated by relationship setup.
    #[serde(default)]
    pub modules: Vec<String>,

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

impl ValueChain {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        ValueChain {
            code: code.into(),
            name: name.into(),
            description: String::new(),
            modules: Vec::new(),
            is_active: true,
            display_order: None,
            metadata: Metadata::new(),
        }
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn with_display_order(mut self, order: i32) -> Self {
        self.display_order = Some(order);
        self
    }

    /// True when the module is already a member (code equality, not
    /// reference identity - reloads produce fresh instances with equal codes).
    pub fn contains_module(&self, module_code: &str) -> bool {
        self.modules.iter().any(|m| codes_equal(m, module_code))
    }

    /// Add a member module if not already present. Returns true on insert.
    pub fn add_module(&mut self, module_code: impl Into<String>) -> bool {
        let module_code = module_code.into();
        if self.contains_module(&module_code) {
            return false;
        }
        self.modules.push(module_code);
        true
    }
}

impl Entity for ValueChain {
    const ENTITY_TYPE: EntityType = EntityType::ValueChain;

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

/// Authored value chain definitions shipped with the catalog.
/// Membership is wired separately by the standard association tables.
pub fn default_value_chains() -> Vec<ValueChain> {
    vec![
        ValueChain::new("SUPPLY_CHAIN", "Supply Chain")
            .with_description("Plan, source, make, deliver - end-to-end movement of goods")
            .with_display_order(1),
        ValueChain::new("LEAD_TO_ORDER", "Lead to Order")
            .with_description("Demand generation through closed deal")
            .with_display_order(2),
        ValueChain::new("ORDER_TO_CASH", "Order to Cash")
            .with_description("Order capture through payment collection")
            .with_display_order(3),
        ValueChain::new("CUSTOMER_CARE", "Customer Care")
            .with_description("Post-sale support, retention and advocacy")
            .with_display_order(4),
    ]
}

// ============================================================================
// TESTS
// ============================================================================
