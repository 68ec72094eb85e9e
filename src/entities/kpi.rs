// 📊 KPI Entity - metric definition
// `modules` is the source of truth for module↔KPI ownership and
// `required_objects` for object-model↔KPI; the reverse directions are
// computed views on the registry, never stored.

use serde::{Deserialize, Serialize};

use super::{codes_equal, Entity, EntityType, Metadata};

// ============================================================================
// AGGREGATION METHOD
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMethod {
    Sum,
    Average,
    Min,
    Max,
    Count,
    Percentage,
    Rate,
    Median,
    Percentile90,
}

impl AggregationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationMethod::Sum => "sum",
            AggregationMethod::Average => "average",
            AggregationMethod::Min => "min",
            AggregationMethod::Max => "max",
            AggregationMethod::Count => "count",
            AggregationMethod::Percentage => "percentage",
            AggregationMethod::Rate => "rate",
            AggregationMethod::Median => "median",
            AggregationMethod::Percentile90 => "percentile_90",
        }
    }

    pub fn parse(s: &str) -> Option<AggregationMethod> {
        match s {
            "sum" => Some(AggregationMethod::Sum),
            "average" => Some(AggregationMethod::Average),
            "min" => Some(AggregationMethod::Min),
            "max" => Some(AggregationMethod::Max),
            "count" => Some(AggregationMethod::Count),
            "percentage" => Some(AggregationMethod::Percentage),
            "rate" => Some(AggregationMethod::Rate),
            "median" => Some(AggregationMethod::Median),
            "percentile_90" => Some(AggregationMethod::Percentile90),
            _ => None,
        }
    }
}

impl std::fmt::Display for AggregationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// TIME PERIOD
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimePeriod {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Annually,
    Custom,
}

impl TimePeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimePeriod::Daily => "daily",
            TimePeriod::Weekly => "weekly",
            TimePeriod::Monthly => "monthly",
            TimePeriod::Quarterly => "quarterly",
            TimePeriod::Annually => "annually",
            TimePeriod::Custom => "custom",
        }
    }

    pub fn parse(s: &str) -> Option<TimePeriod> {
        match s {
            "daily" => Some(TimePeriod::Daily),
            "weekly" => Some(TimePeriod::Weekly),
            "monthly" => Some(TimePeriod::Monthly),
            "quarterly" => Some(TimePeriod::Quarterly),
            "annually" => Some(TimePeriod::Annually),
            "custom" => Some(TimePeriod::Custom),
            _ => None,
        }
    }
}

impl std::fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// KPI ENTITY
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Kpi {
    /// Stable identity - UPPER_SNAKE, never changes
    pub code: String,

    /// Display name
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Grouping used by reporting UIs (e.g. "Fulfillment", "Pipeline")
    #[serde(default)]
    pub category: String,

    /// Free-text formula. Documentation, not executable.
    #[serde(default)]
    pub formula: String,

    /// ObjectModel codes the formula reads from.
    /// Source of truth for the object-model↔KPI relationship.
    #[serde(default)]
    pub required_objects: Vec<String>,

    /// Aggregations a handler may legitimately report for this KPI
    #[serde(default)]
    pub aggregation_methods: Vec<AggregationMethod>,

    /// Periods this KPI is meaningful over
    #[serde(default)]
    pub time_periods: Vec<TimePeriod>,

    /// Owning module codes. Source of truth for module↔KPI; the first
    /// entry decides the routing domain.
    #[serde(default)]
    pub modules: Vec<String>,

    /// Benchmark codes, appended by relationship setup
    #[serde(default)]
    pub benchmarks: Vec<String>,

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

impl Kpi {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Kpi {
            code: code.into(),
            name: name.into(),
            description: String::new(),
            category: String::new(),
            formula: String::new(),
            required_objects: Vec::new(),
            aggregation_methods: Vec::new(),
            time_periods: Vec::new(),
            modules: Vec::new(),
            benchmarks: Vec::new(),
            is_active: true,
            display_order: None,
            metadata: Metadata::new(),
        }
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_formula(mut self, formula: impl Into<String>) -> Self {
        self.formula = formula.into();
        self
    }

    pub fn with_required_object(mut self, object_code: impl Into<String>) -> Self {
        self.required_objects.push(object_code.into());
        self
    }

    pub fn with_aggregation(mut self, method: AggregationMethod) -> Self {
        self.aggregation_methods.push(method);
        self
    }

    pub fn with_period(mut self, period: TimePeriod) -> Self {
        self.time_periods.push(period);
        self
    }

    pub fn with_module(mut self, module_code: impl Into<String>) -> Self {
        self.modules.push(module_code.into());
        self
    }

    pub fn with_display_order(mut self, order: i32) -> Self {
        self.display_order = Some(order);
        self
    }

    /// True when `module_code` owns this KPI (code equality)
    pub fn owned_by_module(&self, module_code: &str) -> bool {
        self.modules.iter().any(|m| codes_equal(m, module_code))
    }

    /// True when this KPI's formula reads from `object_code`
    pub fn requires_object(&self, object_code: &str) -> bool {
        self.required_objects
            .iter()
            .any(|o| codes_equal(o, object_code))
    }

    pub fn supports_aggregation(&self, method: AggregationMethod) -> bool {
        self.aggregation_methods.contains(&method)
    }

    /// True when `benchmark_code` is already linked (code equality)
    pub fn has_benchmark(&self, benchmark_code: &str) -> bool {
        self.benchmarks.iter().any(|b| codes_equal(b, benchmark_code))
    }

    /// Append a benchmark code if not already present. Returns true on insert.
    pub fn add_benchmark(&mut self, benchmark_code: impl Into<String>) -> bool {
        let benchmark_code = benchmark_code.into();
        if self.has_benchmark(&benchmark_code) {
            return false;
        }
        self.benchmarks.push(benchmark_code);
        true
    }

    /// Record that `object_code` is required, if not already. Returns true on
    /// insert. Used by the object-model wiring procedure.
    pub fn add_required_object(&mut self, object_code: impl Into<String>) -> bool {
        let object_code = object_code.into();
        if self.requires_object(&object_code) {
            return false;
        }
        self.required_objects.push(object_code);
        true
    }
}

impl Entity for Kpi {
    const ENTITY_TYPE: EntityType = EntityType::Kpi;

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

/// Authored KPI definitions shipped with the catalog.
pub fn default_kpis() -> Vec<Kpi> {
    vec![
        // --------------------------------------------------------------------
        // Supply chain (SCOR)
        // --------------------------------------------------------------------
        Kpi::new("ORDER_FULFILLMENT_CYCLE_TIME", "Order Fulfillment Cycle Time")
            .with_description("Average elapsed time from order placement to delivery")
            .with_category("Fulfillment")
            .with_formula("avg(delivery_date - order_date) over fulfilled orders")
            .with_required_object("ORDER")
            .with_required_object("SHIPMENT")
            .with_aggregation(AggregationMethod::Average)
            .with_aggregation(AggregationMethod::Median)
            .with_aggregation(AggregationMethod::Percentile90)
            .with_period(TimePeriod::Weekly)
            .with_period(TimePeriod::Monthly)
            .with_module("ORDER_MGMT")
            .with_display_order(1),
        Kpi::new("PERFECT_ORDER_RATE", "Perfect Order Rate")
            .with_description("Share of orders delivered complete, on time, undamaged, correctly documented")
            .with_category("Fulfillment")
            .with_formula("perfect_orders / total_orders * 100")
            .with_required_object("ORDER")
            .with_required_object("SHIPMENT")
            .with_aggregation(AggregationMethod::Percentage)
            .with_period(TimePeriod::Monthly)
            .with_period(TimePeriod::Quarterly)
            .with_module("ORDER_MGMT")
            .with_display_order(2),
        Kpi::new("FILL_RATE", "Fill Rate")
            .with_description("Share of demand served from stock on first attempt")
            .with_category("Inventory")
            .with_formula("units_shipped_first_pass / units_ordered * 100")
            .with_required_object("ORDER")
            .with_required_object("INVENTORY_ITEM")
            .with_aggregation(AggregationMethod::Percentage)
            .with_aggregation(AggregationMethod::Average)
            .with_period(TimePeriod::Daily)
            .with_period(TimePeriod::Monthly)
            .with_module("INVENTORY_MGMT")
            .with_display_order(3),
        Kpi::new("INVENTORY_TURNOVER", "Inventory Turnover")
            .with_description("How many times average inventory is sold per period")
            .with_category("Inventory")
            .with_formula("cost_of_goods_sold / average_inventory_value")
            .with_required_object("INVENTORY_ITEM")
            .with_required_object("SALE")
            .with_aggregation(AggregationMethod::Rate)
            .with_aggregation(AggregationMethod::Average)
            .with_period(TimePeriod::Quarterly)
            .with_period(TimePeriod::Annually)
            .with_module("INVENTORY_MGMT")
            .with_display_order(4),
        Kpi::new("STOCKOUT_RATE", "Stockout Rate")
            .with_description("Share of SKUs with zero on-hand quantity during the period")
            .with_category("Inventory")
            .with_formula("skus_out_of_stock / total_skus * 100")
            .with_required_object("INVENTORY_ITEM")
            .with_aggregation(AggregationMethod::Percentage)
            .with_aggregation(AggregationMethod::Max)
            .with_period(TimePeriod::Daily)
            .with_period(TimePeriod::Weekly)
            .with_module("INVENTORY_MGMT")
            .with_display_order(5),
        Kpi::new("SUPPLIER_ON_TIME_DELIVERY", "Supplier On-Time Delivery")
            .with_description("Share of purchase order lines received by the promised date")
            .with_category("Procurement")
            .with_formula("po_lines_on_time / total_po_lines * 100")
            .with_required_object("SHIPMENT")
            .with_required_object("CONTRACT")
            .with_aggregation(AggregationMethod::Percentage)
            .with_period(TimePeriod::Monthly)
            .with_module("PROCUREMENT")
            .with_display_order(6),
        // --------------------------------------------------------------------
        // Sales
        // --------------------------------------------------------------------
        Kpi::new("SALES_GROWTH_RATE", "Sales Growth Rate")
            .with_description("Period-over-period revenue growth")
            .with_category("Revenue")
            .with_formula("(revenue_current - revenue_prior) / revenue_prior * 100")
            .with_required_object("SALE")
            .with_aggregation(AggregationMethod::Rate)
            .with_aggregation(AggregationMethod::Percentage)
            .with_period(TimePeriod::Quarterly)
            .with_period(TimePeriod::Annually)
            .with_module("SALES_MGMT")
            .with_display_order(7),
        Kpi::new("AVERAGE_DEAL_SIZE", "Average Deal Size")
            .with_description("Mean booked value of closed-won deals")
            .with_category("Pipeline")
            .with_formula("sum(closed_won_value) / count(closed_won_deals)")
            .with_required_object("DEAL")
            .with_aggregation(AggregationMethod::Average)
            .with_aggregation(AggregationMethod::Median)
            .with_period(TimePeriod::Monthly)
            .with_period(TimePeriod::Quarterly)
            .with_module("SALES_MGMT")
            .with_display_order(8),
        Kpi::new("WIN_RATE", "Win Rate")
            .with_description("Share of qualified deals that close won")
            .with_category("Pipeline")
            .with_formula("closed_won_deals / (closed_won_deals + closed_lost_deals) * 100")
            .with_required_object("DEAL")
            .with_aggregation(AggregationMethod::Percentage)
            .with_period(TimePeriod::Monthly)
            .with_period(TimePeriod::Quarterly)
            .with_module("SALES_MGMT")
            .with_display_order(9),
        Kpi::new("SALES_CYCLE_LENGTH", "Sales Cycle Length")
            .with_description("Average days from deal creation to close")
            .with_category("Pipeline")
            .with_formula("avg(close_date - created_date) over closed deals")
            .with_required_object("DEAL")
            .with_aggregation(AggregationMethod::Average)
            .with_aggregation(AggregationMethod::Percentile90)
            .with_period(TimePeriod::Quarterly)
            .with_module("SALES_MGMT")
            .with_display_order(10),
        Kpi::new("DAYS_SALES_OUTSTANDING", "Days Sales Outstanding")
            .with_description("Average days to collect payment after a sale")
            .with_category("Revenue")
            .with_formula("accounts_receivable / total_credit_sales * days_in_period")
            .with_required_object("SALE")
            .with_required_object("CONTRACT")
            .with_aggregation(AggregationMethod::Average)
            .with_period(TimePeriod::Monthly)
            .with_period(TimePeriod::Quarterly)
            .with_module("FINANCE_OPS")
            .with_display_order(11),
        // --------------------------------------------------------------------
        // CRM
        // --------------------------------------------------------------------
        Kpi::new("CUSTOMER_CHURN_RATE", "Customer Churn Rate")
            .with_description("Share of customers lost during the period")
            .with_category("Retention")
            .with_formula("customers_lost / customers_at_period_start * 100")
            .with_required_object("CUSTOMER")
            .with_aggregation(AggregationMethod::Percentage)
            .with_aggregation(AggregationMethod::Rate)
            .with_period(TimePeriod::Monthly)
            .with_period(TimePeriod::Annually)
            .with_module("CUSTOMER_MGMT")
            .with_display_order(12),
        Kpi::new("CUSTOMER_LIFETIME_VALUE", "Customer Lifetime Value")
            .with_description("Expected total margin from a customer relationship")
            .with_category("Retention")
            .with_formula("avg_purchase_value * purchase_frequency * avg_customer_lifespan")
            .with_required_object("CUSTOMER")
            .with_required_object("SALE")
            .with_aggregation(AggregationMethod::Average)
            .with_aggregation(AggregationMethod::Sum)
            .with_period(TimePeriod::Annually)
            .with_module("CUSTOMER_MGMT")
            .with_display_order(13),
        Kpi::new("NET_PROMOTER_SCORE", "Net Promoter Score")
            .with_description("Promoters minus detractors among surveyed customers")
            .with_category("Satisfaction")
            .with_formula("(promoters - detractors) / respondents * 100")
            .with_required_object("CUSTOMER")
            .with_aggregation(AggregationMethod::Average)
            .with_period(TimePeriod::Quarterly)
            .with_module("CUSTOMER_MGMT")
            .with_display_order(14),
        Kpi::new("LEAD_CONVERSION_RATE", "Lead Conversion Rate")
            .with_description("Share of leads that become qualified opportunities")
            .with_category("Acquisition")
            .with_formula("qualified_opportunities / total_leads * 100")
            .with_required_object("DEAL")
            .with_aggregation(AggregationMethod::Percentage)
            .with_period(TimePeriod::Weekly)
            .with_period(TimePeriod::Monthly)
            .with_module("MARKETING_MGMT")
            .with_display_order(15),
        Kpi::new("FIRST_RESPONSE_TIME", "First Response Time")
            .with_description("Time from case creation to first agent response")
            .with_category("Service")
            .with_formula("avg(first_response_at - created_at) over cases")
            .with_required_object("CUSTOMER")
            .with_aggregation(AggregationMethod::Average)
            .with_aggregation(AggregationMethod::Percentile90)
            .with_period(TimePeriod::Daily)
            .with_period(TimePeriod::Weekly)
            .with_module("SERVICE_DESK")
            .with_display_order(16),
        Kpi::new("CASE_RESOLUTION_RATE", "Case Resolution Rate")
            .with_description("Share of cases resolved within the service-level target")
            .with_category("Service")
            .with_formula("cases_resolved_in_sla / cases_closed * 100")
            .with_required_object("CUSTOMER")
            .with_aggregation(AggregationMethod::Percentage)
            .with_aggregation(AggregationMethod::Count)
            .with_period(TimePeriod::Weekly)
            .with_period(TimePeriod::Monthly)
            .with_module("SERVICE_DESK")
            .with_display_order(17),
    ]
}

// ============================================================================
// TESTS
// ============================================================================
