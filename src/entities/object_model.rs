// 📦 ObjectModel Entity - business object type (Deal, Sale, Contract, ...)
// Carries a structural schema description as free text. Related-KPI lists
// are derived from `Kpi.required_objects`, never stored here, so the two
// directions cannot drift.

use serde::{Deserialize, Serialize};

use super::{Entity, EntityType, Metadata};

// ============================================================================
// OBJECT MODEL ENTITY
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectModel {
    /// Stable identity - UPPER_SNAKE, never changes
    pub code: String,

    /// Display name
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Entity/relationship diagram text describing the object's structure
    #[serde(default)]
    pub schema_notes: String,

    /// Names of related business objects (descriptive, not codes)
    #[serde(default)]
    pub related_objects: Vec<String>,

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

impl ObjectModel {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        ObjectModel {
            code: code.into(),
            name: name.into(),
            description: String::new(),
            schema_notes: String::new(),
            related_objects: Vec::new(),
            is_active: true,
            display_order: None,
            metadata: Metadata::new(),
        }
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn with_schema_notes(mut self, notes: impl Into<String>) -> Self {
        self.schema_notes = notes.into();
        self
    }

    pub fn with_related_object(mut self, name: impl Into<String>) -> Self {
        self.related_objects.push(name.into());
        self
    }

    pub fn with_display_order(mut self, order: i32) -> Self {
        self.display_order = Some(order);
        self
    }
}

impl Entity for ObjectModel {
    const ENTITY_TYPE: EntityType = EntityType::ObjectModel;

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

/// Authored object model definitions shipped with the catalog.
pub fn default_object_models() -> Vec<ObjectModel> {
    vec![
        ObjectModel::new("ORDER", "Order")
            .with_description("A customer request for goods or services")
            .with_schema_notes("Order 1--* OrderLine; Order *--1 Customer; Order *--1 Warehouse")
            .with_related_object("Order Line")
            .with_related_object("Shipment")
            .with_display_order(1),
        ObjectModel::new("SHIPMENT", "Shipment")
            .with_description("Physical movement of ordered goods")
            .with_schema_notes("Shipment *--1 Order; Shipment *--1 Carrier")
            .with_related_object("Order")
            .with_display_order(2),
        ObjectModel::new("INVENTORY_ITEM", "Inventory Item")
            .with_description("Stocked SKU with on-hand quantity per location")
            .with_schema_notes("InventoryItem *--1 Warehouse; InventoryItem *--1 Product")
            .with_related_object("Product")
            .with_related_object("Warehouse")
            .with_display_order(3),
        ObjectModel::new("DEAL", "Deal")
            .with_description("A sales opportunity moving through pipeline stages")
            .with_schema_notes("Deal *--1 Account; Deal *--1 Owner; Deal 1--* Activity")
            .with_related_object("Account")
            .with_related_object("Quote")
            .with_display_order(4),
        ObjectModel::new("SALE", "Sale")
            .with_description("A closed, booked revenue transaction")
            .with_schema_notes("Sale *--1 Deal; Sale *--1 Invoice")
            .with_related_object("Invoice")
            .with_display_order(5),
        ObjectModel::new("CUSTOMER", "Customer")
            .with_description("An account with at least one completed purchase")
            .with_schema_notes("Customer 1--* Order; Customer 1--* SupportCase")
            .with_related_object("Support Case")
            .with_related_object("Subscription")
            .with_display_order(6),
        ObjectModel::new("CONTRACT", "Contract")
            .with_description("A binding commercial agreement with term dates")
            .with_schema_notes("Contract *--1 Customer; Contract 1--* Amendment")
            .with_related_object("Customer")
            .with_display_order(7),
    ]
}

// ============================================================================
// TESTS
// ============================================================================
