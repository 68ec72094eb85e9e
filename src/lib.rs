// KPI Catalog - Core Library
// Entity registry, relationship graph, persisted store, integrity checker,
// and the calculation orchestrator with its domain handlers.

pub mod entities;
pub mod registry;
pub mod relationships;
pub mod store;
pub mod integrity;
pub mod orchestrator;
pub mod handlers;

// Re-export commonly used types
pub use entities::{
    codes_equal, default_benchmarks, default_industries, default_kpis, default_modules,
    default_object_models, default_value_chains, normalize_code, AggregationMethod, Benchmark,
    Entity, EntityType, Industry, Kpi, Metadata, Module, ObjectModel, TimePeriod, ValueChain,
};
pub use registry::{
    Collision, CollisionPolicy, CollisionResolution, DefinitionSource, JsonManifestSource,
    LoadFailure, LoadReport, Registry, RegistryError, StaticSource,
};
pub use relationships::{
    setup_kpi_benchmarks, setup_object_model_kpis, setup_value_chain_modules,
    standard_kpi_benchmarks, standard_value_chain_modules, AssociationTable, RelationshipKind,
    SkippedPair, WiringReport,
};
pub use store::{
    count_entities, count_relationships, get_events_for_entity, import_association_table,
    import_registry, insert_entity, insert_event, insert_relationship, list_all_entities,
    list_all_relationships, list_entities_by_type, list_relationships_by_from,
    list_relationships_by_type, setup_database, EntityRow, Event, RelationshipRow,
};
pub use integrity::{
    audit, find_broken_references, find_duplicate_entity_codes, find_duplicate_relationships,
    repair_duplicate_entities, repair_duplicate_relationships, BrokenReference, DuplicateEntityGroup,
    DuplicateRelationshipGroup, IntegrityReport, RepairReport,
};
pub use orchestrator::{
    CalculationError, CalculationHandler, CalculationParams, CalculationResult, MappingReport,
    Orchestrator,
};
pub use handlers::{CrmHandler, SalesHandler, SupplyChainHandler};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
