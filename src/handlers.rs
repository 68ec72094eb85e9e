// 🏭 Domain Calculation Handlers - Supply chain, sales, and CRM engines
// Each handler serves every KPI routed to its domain key. All three share the
// same parameter shape: a numeric "values" series plus optional
// "aggregation" and "period" overrides. When the caller names no override,
// the handler falls back to the KPI's lead aggregation method and reporting
// period, matching what the catalog definitions declare.

use std::cmp::Ordering;
use tracing::debug;

use crate::entities::{AggregationMethod, TimePeriod};
use crate::orchestrator::{CalculationHandler, CalculationParams, CalculationResult};

// ============================================================================
// SHARED PARAMETER HANDLING
// ============================================================================

fn extract_values(params: &CalculationParams) -> Result<Vec<f64>, String> {
    let raw = params
        .get("values")
        .ok_or_else(|| "missing 'values' series".to_string())?;

    let array = raw
        .as_array()
        .ok_or_else(|| "'values' must be an array of numbers".to_string())?;

    if array.is_empty() {
        return Err("'values' series is empty".to_string());
    }

    array
        .iter()
        .map(|v| {
            v.as_f64()
                .ok_or_else(|| format!("non-numeric entry in 'values': {v}"))
        })
        .collect()
}

fn requested_aggregation(params: &CalculationParams) -> Result<Option<AggregationMethod>, String> {
    match params.get("aggregation") {
        None => Ok(None),
        Some(raw) => {
            let text = raw
                .as_str()
                .ok_or_else(|| "'aggregation' must be a string".to_string())?;
            AggregationMethod::parse(text)
                .map(Some)
                .ok_or_else(|| format!("unknown aggregation method '{text}'"))
        }
    }
}

fn requested_period(params: &CalculationParams) -> Result<Option<TimePeriod>, String> {
    match params.get("period") {
        None => Ok(None),
        Some(raw) => {
            let text = raw
                .as_str()
                .ok_or_else(|| "'period' must be a string".to_string())?;
            TimePeriod::parse(text)
                .map(Some)
                .ok_or_else(|| format!("unknown time period '{text}'"))
        }
    }
}

fn check_params(params: &CalculationParams) -> Result<(), String> {
    extract_values(params)?;
    requested_aggregation(params)?;
    requested_period(params)?;
    Ok(())
}

// ============================================================================
// AGGREGATION MATH
// ============================================================================

fn aggregate(values: &[f64], method: AggregationMethod) -> f64 {
    match method {
        AggregationMethod::Sum => values.iter().sum(),
        // Percentage and rate series arrive already expressed in their
        // unit, so aggregating them is averaging
        AggregationMethod::Average | AggregationMethod::Percentage | AggregationMethod::Rate => {
            values.iter().sum::<f64>() / values.len() as f64
        }
        AggregationMethod::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        AggregationMethod::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        AggregationMethod::Count => values.len() as f64,
        AggregationMethod::Median => median(values),
        AggregationMethod::Percentile90 => percentile(values, 0.90),
    }
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Nearest-rank percentile
fn percentile(values: &[f64], fraction: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let rank = ((fraction * sorted.len() as f64).ceil() as usize).clamp(1, sorted.len());
    sorted[rank - 1]
}

fn compute(
    kpi_code: &str,
    params: &CalculationParams,
    defaults: (AggregationMethod, TimePeriod),
) -> Result<CalculationResult, String> {
    let values = extract_values(params)?;
    let aggregation = requested_aggregation(params)?.unwrap_or(defaults.0);
    let period = requested_period(params)?.unwrap_or(defaults.1);

    let value = aggregate(&values, aggregation);
    debug!(kpi = %kpi_code, aggregation = %aggregation, samples = values.len(), "KPI computed");

    Ok(CalculationResult {
        kpi_code: kpi_code.to_string(),
        value,
        aggregation,
        period,
    })
}

// ============================================================================
// SUPPLY CHAIN HANDLER
// ============================================================================

/// Supply chain domain: fulfillment, inventory, and procurement KPIs.
pub struct SupplyChainHandler;

impl SupplyChainHandler {
    fn defaults(kpi_code: &str) -> (AggregationMethod, TimePeriod) {
        match kpi_code {
            "ORDER_FULFILLMENT_CYCLE_TIME" => (AggregationMethod::Average, TimePeriod::Weekly),
            "PERFECT_ORDER_RATE" => (AggregationMethod::Percentage, TimePeriod::Monthly),
            "FILL_RATE" => (AggregationMethod::Percentage, TimePeriod::Daily),
            "INVENTORY_TURNOVER" => (AggregationMethod::Rate, TimePeriod::Quarterly),
            "STOCKOUT_RATE" => (AggregationMethod::Percentage, TimePeriod::Daily),
            "SUPPLIER_ON_TIME_DELIVERY" => (AggregationMethod::Percentage, TimePeriod::Monthly),
            _ => (AggregationMethod::Average, TimePeriod::Monthly),
        }
    }
}

impl CalculationHandler for SupplyChainHandler {
    fn domain(&self) -> &'static str {
        "supply_chain"
    }

    fn validate(&self, params: &CalculationParams) -> Result<(), String> {
        check_params(params)
    }

    fn calculate(
        &self,
        kpi_code: &str,
        params: &CalculationParams,
        _required_objects: &[String],
    ) -> Result<CalculationResult, String> {
        compute(kpi_code, params, Self::defaults(kpi_code))
    }
}

// ============================================================================
// SALES HANDLER
// ============================================================================

/// Sales domain: pipeline, revenue, and receivables KPIs.
pub struct SalesHandler;

impl SalesHandler {
    fn defaults(kpi_code: &str) -> (AggregationMethod, TimePeriod) {
        match kpi_code {
            "SALES_GROWTH_RATE" => (AggregationMethod::Rate, TimePeriod::Quarterly),
            "AVERAGE_DEAL_SIZE" => (AggregationMethod::Average, TimePeriod::Monthly),
            "WIN_RATE" => (AggregationMethod::Percentage, TimePeriod::Monthly),
            "SALES_CYCLE_LENGTH" => (AggregationMethod::Average, TimePeriod::Quarterly),
            "DAYS_SALES_OUTSTANDING" => (AggregationMethod::Average, TimePeriod::Monthly),
            _ => (AggregationMethod::Average, TimePeriod::Monthly),
        }
    }
}

impl CalculationHandler for SalesHandler {
    fn domain(&self) -> &'static str {
        "sales"
    }

    fn validate(&self, params: &CalculationParams) -> Result<(), String> {
        check_params(params)
    }

    fn calculate(
        &self,
        kpi_code: &str,
        params: &CalculationParams,
        _required_objects: &[String],
    ) -> Result<CalculationResult, String> {
        compute(kpi_code, params, Self::defaults(kpi_code))
    }
}

// ============================================================================
// CRM HANDLER
// ============================================================================

/// CRM domain: retention, satisfaction, and service KPIs.
pub struct CrmHandler;

impl CrmHandler {
    fn defaults(kpi_code: &str) -> (AggregationMethod, TimePeriod) {
        match kpi_code {
            "CUSTOMER_CHURN_RATE" => (AggregationMethod::Percentage, TimePeriod::Monthly),
            "CUSTOMER_LIFETIME_VALUE" => (AggregationMethod::Average, TimePeriod::Annually),
            "NET_PROMOTER_SCORE" => (AggregationMethod::Average, TimePeriod::Quarterly),
            "LEAD_CONVERSION_RATE" => (AggregationMethod::Percentage, TimePeriod::Weekly),
            "FIRST_RESPONSE_TIME" => (AggregationMethod::Average, TimePeriod::Daily),
            "CASE_RESOLUTION_RATE" => (AggregationMethod::Percentage, TimePeriod::Weekly),
            _ => (AggregationMethod::Average, TimePeriod::Monthly),
        }
    }
}

impl CalculationHandler for CrmHandler {
    fn domain(&self) -> &'static str {
        "crm"
    }

    fn validate(&self, params: &CalculationParams) -> Result<(), String> {
        check_params(params)
    }

    fn calculate(
        &self,
        kpi_code: &str,
        params: &CalculationParams,
        _required_objects: &[String],
    ) -> Result<CalculationResult, String> {
        compute(kpi_code, params, Self::defaults(kpi_code))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{default_kpis, default_modules, Kpi, Module};
    use crate::orchestrator::Orchestrator;
    use crate::registry::{Registry, StaticSource};

    fn params_with_values(values: &[f64]) -> CalculationParams {
        let mut params = CalculationParams::new();
        params.insert("values".to_string(), serde_json::json!(values));
        params
    }

    fn full_orchestrator() -> Orchestrator {
        let mut kpis: Registry<Kpi> = Registry::new();
        kpis.load_all(&StaticSource::new(default_kpis())).unwrap();
        let mut modules: Registry<Module> = Registry::new();
        modules
            .load_all(&StaticSource::new(default_modules()))
            .unwrap();

        let mut orchestrator = Orchestrator::new();
        orchestrator.register_handler(Box::new(SupplyChainHandler));
        orchestrator.register_handler(Box::new(SalesHandler));
        orchestrator.register_handler(Box::new(CrmHandler));
        orchestrator.load_mappings(&kpis, &modules);
        orchestrator
    }

    #[test]
    fn test_validate_requires_values() {
        let handler = SupplyChainHandler;
        let err = handler.validate(&CalculationParams::new()).unwrap_err();
        assert_eq!(err, "missing 'values' series");

        let mut params = CalculationParams::new();
        params.insert("values".to_string(), serde_json::json!([]));
        assert!(handler.validate(&params).is_err());

        params.insert("values".to_string(), serde_json::json!([1.0, "two"]));
        assert!(handler.validate(&params).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_overrides() {
        let handler = SalesHandler;
        let mut params = params_with_values(&[1.0]);
        params.insert("aggregation".to_string(), serde_json::json!("mode"));
        assert!(handler.validate(&params).is_err());

        let mut params = params_with_values(&[1.0]);
        params.insert("period".to_string(), serde_json::json!("fortnightly"));
        assert!(handler.validate(&params).is_err());
    }

    #[test]
    fn test_aggregation_math() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(aggregate(&values, AggregationMethod::Sum), 10.0);
        assert_eq!(aggregate(&values, AggregationMethod::Average), 2.5);
        assert_eq!(aggregate(&values, AggregationMethod::Min), 1.0);
        assert_eq!(aggregate(&values, AggregationMethod::Max), 4.0);
        assert_eq!(aggregate(&values, AggregationMethod::Count), 4.0);
        assert_eq!(aggregate(&values, AggregationMethod::Median), 2.5);
        assert_eq!(aggregate(&values, AggregationMethod::Percentile90), 4.0);
        assert_eq!(aggregate(&[1.0, 3.0, 5.0], AggregationMethod::Median), 3.0);
    }

    #[test]
    fn test_percentile_on_larger_series() {
        let values: Vec<f64> = (1..=10).map(|n| n as f64).collect();
        assert_eq!(percentile(&values, 0.90), 9.0);
        assert_eq!(percentile(&values, 0.50), 5.0);
    }

    #[test]
    fn test_fill_rate_defaults_to_percentage_daily() {
        let handler = SupplyChainHandler;
        let result = handler
            .calculate("FILL_RATE", &params_with_values(&[92.0, 96.0, 94.0]), &[])
            .unwrap();
        assert_eq!(result.aggregation, AggregationMethod::Percentage);
        assert_eq!(result.period, TimePeriod::Daily);
        assert!((result.value - 94.0).abs() < 1e-9);
    }

    #[test]
    fn test_aggregation_override_wins() {
        let handler = CrmHandler;
        let mut params = params_with_values(&[10.0, 20.0, 30.0]);
        params.insert("aggregation".to_string(), serde_json::json!("sum"));

        let result = handler
            .calculate("CUSTOMER_LIFETIME_VALUE", &params, &[])
            .unwrap();
        assert_eq!(result.aggregation, AggregationMethod::Sum);
        assert_eq!(result.value, 60.0);
    }

    #[test]
    fn test_cycle_time_through_full_pipeline() {
        let orchestrator = full_orchestrator();

        let result = orchestrator
            .calculate(
                "ORDER_FULFILLMENT_CYCLE_TIME",
                &params_with_values(&[2.0, 3.0, 4.0]),
            )
            .unwrap();
        assert!((result.value - 3.0).abs() < 1e-9);

        // The result's aggregation must be one the KPI actually declares
        let kpi = default_kpis()
            .into_iter()
            .find(|k| k.code == "ORDER_FULFILLMENT_CYCLE_TIME")
            .unwrap();
        assert!(kpi.aggregation_methods.contains(&result.aggregation));
        assert!(kpi.time_periods.contains(&result.period));
    }

    #[test]
    fn test_every_default_kpi_routes_to_a_live_handler() {
        let orchestrator = full_orchestrator();
        let params = params_with_values(&[1.0, 2.0]);

        for kpi in default_kpis() {
            let result = orchestrator.calculate(&kpi.code, &params);
            assert!(result.is_ok(), "KPI {} failed: {:?}", kpi.code, result.err());
        }
    }

    #[test]
    fn test_handler_defaults_match_catalog_declarations() {
        // For every default KPI, the handler's fallback aggregation and
        // period must be among what the definition declares
        for kpi in default_kpis() {
            let (aggregation, period) = match kpi.modules.first().map(String::as_str) {
                Some("SALES_MGMT") | Some("FINANCE_OPS") => SalesHandler::defaults(&kpi.code),
                Some("CUSTOMER_MGMT") | Some("MARKETING_MGMT") | Some("SERVICE_DESK") => {
                    CrmHandler::defaults(&kpi.code)
                }
                _ => SupplyChainHandler::defaults(&kpi.code),
            };
            assert!(
                kpi.aggregation_methods.contains(&aggregation),
                "default aggregation for {} not declared",
                kpi.code
            );
            assert!(
                kpi.time_periods.contains(&period),
                "default period for {} not declared",
                kpi.code
            );
        }
    }
}
