// 🔍 Integrity Checker - Detect and repair corrupted graph state
// Audits the persisted store for duplicate relationship rows, duplicate
// entity codes, and broken references, then repairs the duplicates with an
// earliest-row-wins policy. Repair is repeatable: running it on a clean
// store changes nothing.

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::entities::{normalize_code, EntityType};
use crate::store::{self, Event};

// ============================================================================
// REPORT TYPES
// ============================================================================

/// One group of relationship rows sharing the same (from, to, kind) triple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateRelationshipGroup {
    pub from_code: String,
    pub to_code: String,
    pub relationship_type: String,

    /// Total rows in the group, including the one that will be kept
    pub count: usize,

    /// Row ids in insertion order; the first is the survivor
    pub row_ids: Vec<i64>,
}

/// One entity code persisted more than once for the same entity type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateEntityGroup {
    pub entity_type: String,
    pub code: String,
    pub count: usize,
    pub row_ids: Vec<i64>,
}

/// A relationship row whose endpoint is not persisted as an entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokenReference {
    pub row_id: i64,
    pub from_code: String,
    pub to_code: String,
    pub relationship_type: String,

    /// Which endpoint is missing ("from", "to", or "both")
    pub missing_side: String,
}

/// Snapshot of everything the audit found. Read-only: producing the report
/// never mutates the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub duplicate_relationships: Vec<DuplicateRelationshipGroup>,
    pub duplicate_entities: Vec<DuplicateEntityGroup>,
    pub broken_references: Vec<BrokenReference>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.duplicate_relationships.is_empty()
            && self.duplicate_entities.is_empty()
            && self.broken_references.is_empty()
    }

    /// Rows that a repair pass would delete
    pub fn rows_to_remove(&self) -> usize {
        self.duplicate_relationships
            .iter()
            .map(|g| g.count - 1)
            .sum()
    }
}

/// Outcome of a repair pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairReport {
    pub groups_repaired: usize,
    pub rows_removed: usize,
}

// ============================================================================
// AUDIT
// ============================================================================

/// Full read-only audit of the store.
pub fn audit(conn: &Connection) -> Result<IntegrityReport> {
    let report = IntegrityReport {
        duplicate_relationships: find_duplicate_relationships(conn)?,
        duplicate_entities: find_duplicate_entity_codes(conn)?,
        broken_references: find_broken_references(conn)?,
    };

    if report.is_clean() {
        info!("integrity audit clean");
    } else {
        warn!(
            duplicate_relationships = report.duplicate_relationships.len(),
            duplicate_entities = report.duplicate_entities.len(),
            broken_references = report.broken_references.len(),
            "integrity audit found problems"
        );
    }

    Ok(report)
}

/// Group relationship rows by their normalized (from, to, kind) triple and
/// keep the groups with more than one row.
pub fn find_duplicate_relationships(conn: &Connection) -> Result<Vec<DuplicateRelationshipGroup>> {
    let rows = store::list_all_relationships(conn)?;

    let mut groups: HashMap<(String, String, String), Vec<i64>> = HashMap::new();
    let mut display: HashMap<(String, String, String), (String, String, String)> = HashMap::new();

    for row in rows {
        let key = (
            normalize_code(&row.from_code),
            normalize_code(&row.to_code),
            row.relationship_type.clone(),
        );
        display.entry(key.clone()).or_insert_with(|| {
            (
                row.from_code.clone(),
                row.to_code.clone(),
                row.relationship_type.clone(),
            )
        });
        groups.entry(key).or_default().push(row.id);
    }

    let mut duplicates: Vec<DuplicateRelationshipGroup> = groups
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|(key, ids)| {
            let (from_code, to_code, relationship_type) =
                display.remove(&key).unwrap_or((key.0, key.1, key.2));
            DuplicateRelationshipGroup {
                from_code,
                to_code,
                relationship_type,
                count: ids.len(),
                row_ids: ids,
            }
        })
        .collect();

    // list_all_relationships returns rows ordered by id, so each group's
    // row_ids are already ascending; sort the groups for stable reports
    duplicates.sort_by_key(|g| g.row_ids[0]);

    Ok(duplicates)
}

/// Entity codes persisted more than once for the same entity type.
pub fn find_duplicate_entity_codes(conn: &Connection) -> Result<Vec<DuplicateEntityGroup>> {
    let rows = store::list_all_entities(conn)?;

    let mut groups: HashMap<(String, String), Vec<i64>> = HashMap::new();
    for row in rows {
        groups
            .entry((row.entity_type.clone(), normalize_code(&row.code)))
            .or_default()
            .push(row.id);
    }

    let mut duplicates: Vec<DuplicateEntityGroup> = groups
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|((entity_type, code), ids)| DuplicateEntityGroup {
            entity_type,
            code,
            count: ids.len(),
            row_ids: ids,
        })
        .collect();

    duplicates.sort_by_key(|g| g.row_ids[0]);

    Ok(duplicates)
}

/// Entity types each relationship kind is expected to join. Unknown kinds
/// fall back to an any-type check.
fn expected_endpoint_types(relationship_type: &str) -> Option<(EntityType, EntityType)> {
    match relationship_type {
        "contains" => Some((EntityType::ValueChain, EntityType::Module)),
        "benchmarks" => Some((EntityType::Kpi, EntityType::Benchmark)),
        "requires" => Some((EntityType::Kpi, EntityType::ObjectModel)),
        _ => None,
    }
}

/// Relationship rows whose endpoints resolve to no persisted entity of the
/// expected type. A same-coded entity of the wrong type does not count.
pub fn find_broken_references(conn: &Connection) -> Result<Vec<BrokenReference>> {
    let entities = store::list_all_entities(conn)?;

    let mut known_by_type: HashMap<String, std::collections::HashSet<String>> = HashMap::new();
    let mut known_any: std::collections::HashSet<String> = std::collections::HashSet::new();
    for row in &entities {
        let code = normalize_code(&row.code);
        known_by_type
            .entry(row.entity_type.clone())
            .or_default()
            .insert(code.clone());
        known_any.insert(code);
    }

    let resolves = |code: &str, expected: Option<EntityType>| -> bool {
        let code = normalize_code(code);
        match expected {
            Some(entity_type) => known_by_type
                .get(entity_type.as_str())
                .is_some_and(|codes| codes.contains(&code)),
            None => known_any.contains(&code),
        }
    };

    let mut broken = Vec::new();
    for row in store::list_all_relationships(conn)? {
        let expected = expected_endpoint_types(&row.relationship_type);
        let from_missing = !resolves(&row.from_code, expected.map(|(from, _)| from));
        let to_missing = !resolves(&row.to_code, expected.map(|(_, to)| to));

        let missing_side = match (from_missing, to_missing) {
            (true, true) => "both",
            (true, false) => "from",
            (false, true) => "to",
            (false, false) => continue,
        };

        broken.push(BrokenReference {
            row_id: row.id,
            from_code: row.from_code,
            to_code: row.to_code,
            relationship_type: row.relationship_type,
            missing_side: missing_side.to_string(),
        });
    }

    Ok(broken)
}

// ============================================================================
// REPAIR
// ============================================================================

/// Collapse every duplicate relationship group down to its earliest row.
/// Each group is repaired in its own transaction so a failure partway
/// through leaves completed groups intact. Appends one audit event per
/// repaired group.
pub fn repair_duplicate_relationships(conn: &mut Connection) -> Result<RepairReport> {
    let duplicates = find_duplicate_relationships(conn)?;

    let mut report = RepairReport {
        groups_repaired: 0,
        rows_removed: 0,
    };

    for group in duplicates {
        let keep_id = group.row_ids[0];
        let remove: Vec<i64> = group.row_ids[1..].to_vec();

        let tx = conn
            .transaction()
            .context("failed to open repair transaction")?;

        for row_id in &remove {
            tx.execute("DELETE FROM relationships WHERE id = ?1", params![row_id])?;
        }

        let event = Event::new(
            "duplicates_repaired",
            "relationship",
            &group.from_code,
            serde_json::json!({
                "to": group.to_code,
                "kind": group.relationship_type,
                "kept_row": keep_id,
                "removed_rows": remove,
            }),
            "integrity_checker",
        );
        store::insert_event(&tx, &event)?;

        tx.commit().context("failed to commit repair transaction")?;

        info!(
            from = %group.from_code,
            to = %group.to_code,
            kind = %group.relationship_type,
            removed = group.count - 1,
            "duplicate relationship group repaired"
        );

        report.groups_repaired += 1;
        report.rows_removed += group.count - 1;
    }

    Ok(report)
}

/// Collapse duplicate entity codes down to their earliest row, per entity
/// type. Same transaction and audit discipline as the relationship repair.
pub fn repair_duplicate_entities(conn: &mut Connection) -> Result<RepairReport> {
    let duplicates = find_duplicate_entity_codes(conn)?;

    let mut report = RepairReport {
        groups_repaired: 0,
        rows_removed: 0,
    };

    for group in duplicates {
        let keep_id = group.row_ids[0];
        let remove: Vec<i64> = group.row_ids[1..].to_vec();

        let tx = conn
            .transaction()
            .context("failed to open repair transaction")?;

        for row_id in &remove {
            tx.execute("DELETE FROM entities WHERE id = ?1", params![row_id])?;
        }

        let event = Event::new(
            "duplicates_repaired",
            &group.entity_type,
            &group.code,
            serde_json::json!({
                "kept_row": keep_id,
                "removed_rows": remove,
            }),
            "integrity_checker",
        );
        store::insert_event(&tx, &event)?;

        tx.commit().context("failed to commit repair transaction")?;

        info!(
            entity_type = %group.entity_type,
            code = %group.code,
            removed = group.count - 1,
            "duplicate entity group repaired"
        );

        report.groups_repaired += 1;
        report.rows_removed += group.count - 1;
    }

    Ok(report)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Kpi, Module};
    use crate::store::{insert_entity, insert_relationship, setup_database};

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    #[test]
    fn test_empty_store_audits_clean() {
        let conn = test_conn();
        let report = audit(&conn).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.rows_to_remove(), 0);
    }

    #[test]
    fn test_triplicate_row_becomes_one_group() {
        let conn = test_conn();

        insert_entity(&conn, &Module::new("SALES_MGMT", "Sales Management", "sales")).unwrap();
        insert_entity(
            &conn,
            &Module::new("INVENTORY_MGMT", "Inventory Management", "supply_chain"),
        )
        .unwrap();

        for _ in 0..3 {
            insert_relationship(&conn, "SALES_MGMT", "INVENTORY_MGMT", "contains").unwrap();
        }

        let groups = find_duplicate_relationships(&conn).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].count, 3);
        assert_eq!(groups[0].from_code, "SALES_MGMT");
        assert_eq!(groups[0].to_code, "INVENTORY_MGMT");
    }

    #[test]
    fn test_repair_keeps_earliest_row() {
        let mut conn = test_conn();

        insert_entity(&conn, &Module::new("SALES_MGMT", "Sales Management", "sales")).unwrap();
        insert_entity(
            &conn,
            &Module::new("INVENTORY_MGMT", "Inventory Management", "supply_chain"),
        )
        .unwrap();

        let first = insert_relationship(&conn, "SALES_MGMT", "INVENTORY_MGMT", "contains").unwrap();
        insert_relationship(&conn, "SALES_MGMT", "INVENTORY_MGMT", "contains").unwrap();
        insert_relationship(&conn, "SALES_MGMT", "INVENTORY_MGMT", "contains").unwrap();

        let report = repair_duplicate_relationships(&mut conn).unwrap();
        assert_eq!(report.groups_repaired, 1);
        assert_eq!(report.rows_removed, 2);

        let rows = store::list_all_relationships(&conn).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, first);

        // And the audit trail recorded it
        let events = store::get_events_for_entity(&conn, "relationship", "SALES_MGMT").unwrap();
        assert!(events
            .iter()
            .any(|e| e.event_type == "duplicates_repaired"));
    }

    #[test]
    fn test_repair_is_repeatable() {
        let mut conn = test_conn();

        insert_entity(&conn, &Module::new("SALES_MGMT", "Sales Management", "sales")).unwrap();
        insert_entity(
            &conn,
            &Module::new("INVENTORY_MGMT", "Inventory Management", "supply_chain"),
        )
        .unwrap();
        insert_relationship(&conn, "SALES_MGMT", "INVENTORY_MGMT", "contains").unwrap();
        insert_relationship(&conn, "SALES_MGMT", "INVENTORY_MGMT", "contains").unwrap();

        let first = repair_duplicate_relationships(&mut conn).unwrap();
        assert_eq!(first.rows_removed, 1);

        let second = repair_duplicate_relationships(&mut conn).unwrap();
        assert_eq!(second.groups_repaired, 0);
        assert_eq!(second.rows_removed, 0);
        assert_eq!(store::count_relationships(&conn).unwrap(), 1);
    }

    #[test]
    fn test_duplicates_detected_case_insensitively() {
        let conn = test_conn();

        insert_relationship(&conn, "sales_mgmt", "INVENTORY_MGMT", "contains").unwrap();
        insert_relationship(&conn, "SALES_MGMT", "inventory_mgmt", "contains").unwrap();

        let groups = find_duplicate_relationships(&conn).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].count, 2);
    }

    #[test]
    fn test_distinct_kinds_are_distinct_groups() {
        let conn = test_conn();

        insert_relationship(&conn, "FILL_RATE", "ORDER", "requires").unwrap();
        insert_relationship(&conn, "FILL_RATE", "ORDER", "benchmarks").unwrap();

        assert!(find_duplicate_relationships(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_repair_duplicate_entities_keeps_earliest() {
        let mut conn = test_conn();

        let first = insert_entity(&conn, &Kpi::new("FILL_RATE", "Fill Rate")).unwrap();
        insert_entity(&conn, &Kpi::new("FILL_RATE", "Fill Rate (re-import)")).unwrap();
        insert_entity(&conn, &Kpi::new("WIN_RATE", "Win Rate")).unwrap();

        let report = repair_duplicate_entities(&mut conn).unwrap();
        assert_eq!(report.groups_repaired, 1);
        assert_eq!(report.rows_removed, 1);

        let kpis = store::list_entities_by_type(&conn, crate::entities::EntityType::Kpi).unwrap();
        assert_eq!(kpis.len(), 2);
        let survivor = kpis.iter().find(|row| row.code == "FILL_RATE").unwrap();
        assert_eq!(survivor.id, first);
        assert_eq!(survivor.name, "Fill Rate");

        // Clean on the second pass
        let again = repair_duplicate_entities(&mut conn).unwrap();
        assert_eq!(again.groups_repaired, 0);
    }

    #[test]
    fn test_duplicate_entity_codes_detected() {
        let conn = test_conn();

        insert_entity(&conn, &Kpi::new("FILL_RATE", "Fill Rate")).unwrap();
        insert_entity(&conn, &Kpi::new("FILL_RATE", "Fill Rate (re-import)")).unwrap();
        insert_entity(&conn, &Kpi::new("WIN_RATE", "Win Rate")).unwrap();

        let groups = find_duplicate_entity_codes(&conn).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].code, "FILL_RATE");
        assert_eq!(groups[0].count, 2);
    }

    #[test]
    fn test_broken_references_name_the_missing_side() {
        let conn = test_conn();

        insert_entity(&conn, &Kpi::new("FILL_RATE", "Fill Rate")).unwrap();
        insert_entity(
            &conn,
            &Module::new("INVENTORY_MGMT", "Inventory Management", "supply_chain"),
        )
        .unwrap();
        insert_relationship(&conn, "FILL_RATE", "GHOST_OBJECT", "requires").unwrap();
        insert_relationship(&conn, "GHOST_CHAIN", "INVENTORY_MGMT", "contains").unwrap();
        insert_relationship(&conn, "GHOST_CHAIN", "GHOST_MODULE", "contains").unwrap();

        let broken = find_broken_references(&conn).unwrap();
        assert_eq!(broken.len(), 3);
        assert_eq!(broken[0].missing_side, "to");
        assert_eq!(broken[1].missing_side, "from");
        assert_eq!(broken[2].missing_side, "both");
    }

    #[test]
    fn test_endpoint_of_wrong_type_is_still_broken() {
        let conn = test_conn();

        // A KPI named ORDER exists, but "requires" must point at an object
        // model, and no object model ORDER is persisted
        insert_entity(&conn, &Kpi::new("FILL_RATE", "Fill Rate")).unwrap();
        insert_entity(&conn, &Kpi::new("ORDER", "Order KPI")).unwrap();
        insert_relationship(&conn, "FILL_RATE", "ORDER", "requires").unwrap();

        let broken = find_broken_references(&conn).unwrap();
        assert_eq!(broken.len(), 1);
        assert_eq!(broken[0].to_code, "ORDER");
        assert_eq!(broken[0].missing_side, "to");

        // Persisting the right type clears it
        insert_entity(&conn, &crate::entities::ObjectModel::new("ORDER", "Order")).unwrap();
        assert!(find_broken_references(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_audit_is_read_only() {
        let conn = test_conn();

        insert_relationship(&conn, "A", "B", "contains").unwrap();
        insert_relationship(&conn, "A", "B", "contains").unwrap();

        let before = store::count_relationships(&conn).unwrap();
        let report = audit(&conn).unwrap();
        assert!(!report.is_clean());
        assert_eq!(store::count_relationships(&conn).unwrap(), before);
    }
}
