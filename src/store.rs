// 💾 Persisted Store - SQLite implementation of the four-operation contract
// insert entity, insert relationship row, list entities by type, list
// relationship rows by from-code or type. The core consumes this store, it
// does not own it: an external ingestion pipeline may re-populate it at any
// time, which is exactly how duplicate rows get in. The integrity checker
// exists because of that, so the schema deliberately carries NO uniqueness
// constraint on the relationship triple or the entity code.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::entities::{Entity, EntityType};
use crate::registry::Registry;
use crate::relationships::AssociationTable;

// ============================================================================
// ROW TYPES
// ============================================================================

/// A persisted entity record. `id` is the insertion order, which the
/// repair pass uses as the earliest-wins key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRow {
    pub id: i64,
    pub entity_type: String,
    pub code: String,
    pub name: String,
    /// Full serialized entity, schema-free so entity types can grow
    pub payload: serde_json::Value,
}

/// A persisted relationship triple plus its insertion id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipRow {
    pub id: i64,
    pub from_code: String,
    pub to_code: String,
    pub relationship_type: String,
}

/// Audit trail record. Every import and repair appends one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS entities (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entity_type TEXT NOT NULL,
            code TEXT NOT NULL,
            name TEXT NOT NULL,
            payload TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // No UNIQUE constraint on (from_code, to_code, relationship_type):
    // re-import pipelines insert blind, and the checker must be able to
    // observe the resulting duplicates in order to repair them.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS relationships (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            from_code TEXT NOT NULL,
            to_code TEXT NOT NULL,
            relationship_type TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_entities_type_code ON entities(entity_type, code)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_relationships_from ON relationships(from_code)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_relationships_type ON relationships(relationship_type)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// INSERT OPERATIONS
// ============================================================================

/// Persist one entity. Returns the row id.
pub fn insert_entity<T: Entity>(conn: &Connection, entity: &T) -> Result<i64> {
    let payload =
        serde_json::to_string(entity).context("failed to serialize entity payload")?;

    conn.execute(
        "INSERT INTO entities (entity_type, code, name, payload) VALUES (?1, ?2, ?3, ?4)",
        params![
            T::ENTITY_TYPE.as_str(),
            entity.code(),
            entity.name(),
            payload
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

/// Persist one relationship triple. Returns the row id.
/// Inserting the same triple twice succeeds - that is the defect class the
/// integrity checker detects.
pub fn insert_relationship(
    conn: &Connection,
    from_code: &str,
    to_code: &str,
    relationship_type: &str,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO relationships (from_code, to_code, relationship_type)
         VALUES (?1, ?2, ?3)",
        params![from_code, to_code, relationship_type],
    )?;

    Ok(conn.last_insert_rowid())
}

// ============================================================================
// LIST OPERATIONS
// ============================================================================

fn entity_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EntityRow> {
    let id: i64 = row.get(0)?;
    let payload_json: String = row.get(4)?;

    // A corrupt payload must not sink the whole listing, but it must
    // leave a trace before being substituted
    let payload = match serde_json::from_str(&payload_json) {
        Ok(value) => value,
        Err(error) => {
            warn!(row_id = id, %error, "entity payload is not valid JSON; substituting null");
            serde_json::Value::Null
        }
    };

    Ok(EntityRow {
        id,
        entity_type: row.get(1)?,
        code: row.get(2)?,
        name: row.get(3)?,
        payload,
    })
}

pub fn list_entities_by_type(conn: &Connection, entity_type: EntityType) -> Result<Vec<EntityRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, entity_type, code, name, payload FROM entities
         WHERE entity_type = ?1 ORDER BY id",
    )?;

    let rows = stmt
        .query_map([entity_type.as_str()], entity_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

pub fn list_all_entities(conn: &Connection) -> Result<Vec<EntityRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, entity_type, code, name, payload FROM entities ORDER BY id",
    )?;

    let rows = stmt
        .query_map([], entity_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

fn relationship_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RelationshipRow> {
    Ok(RelationshipRow {
        id: row.get(0)?,
        from_code: row.get(1)?,
        to_code: row.get(2)?,
        relationship_type: row.get(3)?,
    })
}

pub fn list_relationships_by_from(conn: &Connection, from_code: &str) -> Result<Vec<RelationshipRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, from_code, to_code, relationship_type FROM relationships
         WHERE from_code = ?1 ORDER BY id",
    )?;

    let rows = stmt
        .query_map([from_code], relationship_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

pub fn list_relationships_by_type(
    conn: &Connection,
    relationship_type: &str,
) -> Result<Vec<RelationshipRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, from_code, to_code, relationship_type FROM relationships
         WHERE relationship_type = ?1 ORDER BY id",
    )?;

    let rows = stmt
        .query_map([relationship_type], relationship_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

/// Snapshot of every relationship row, in insertion order.
pub fn list_all_relationships(conn: &Connection) -> Result<Vec<RelationshipRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, from_code, to_code, relationship_type FROM relationships ORDER BY id",
    )?;

    let rows = stmt
        .query_map([], relationship_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

pub fn count_entities(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM entities", [], |row| row.get(0))?;
    Ok(count)
}

pub fn count_relationships(conn: &Connection) -> Result<i64> {
    let count: i64 =
        conn.query_row("SELECT COUNT(*) FROM relationships", [], |row| row.get(0))?;
    Ok(count)
}

// ============================================================================
// AUDIT TRAIL
// ============================================================================

pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?
                    .with_timezone(&Utc),
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?,
                actor: row.get(6)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(events)
}

// ============================================================================
// BULK IMPORT
// ============================================================================

/// Persist every entity in a registry. Used by the ingestion path after the
/// load phase; re-running it duplicates rows by design (the store does not
/// deduplicate, the checker does).
pub fn import_registry<T: Entity>(conn: &Connection, registry: &Registry<T>) -> Result<usize> {
    let mut imported = 0;

    for entity in registry.get_all() {
        insert_entity(conn, entity)?;

        let event = Event::new(
            "entity_imported",
            T::ENTITY_TYPE.as_str(),
            entity.code(),
            serde_json::json!({ "name": entity.name() }),
            "catalog_importer",
        );
        insert_event(conn, &event)?;
        imported += 1;
    }

    info!(entity_type = %T::ENTITY_TYPE, imported, "registry imported");
    Ok(imported)
}

/// Persist every pair an association table declares.
pub fn import_association_table(conn: &Connection, table: &AssociationTable) -> Result<usize> {
    let mut imported = 0;

    for (from, to) in table.pairs() {
        insert_relationship(conn, from, to, table.kind.as_str())?;

        let event = Event::new(
            "relationship_imported",
            "relationship",
            from,
            serde_json::json!({ "to": to, "kind": table.kind.as_str() }),
            "catalog_importer",
        );
        insert_event(conn, &event)?;
        imported += 1;
    }

    info!(kind = %table.kind, imported, "association table imported");
    Ok(imported)
}

// ============================================================================
// TESTS
// ============================================================================
