//! VoltMind Telemetry Core
//!
//! This crate turns the semi-structured diagnostics tree returned by a
//! remote energy-monitoring API into stable, deterministic shapes the tool
//! layer can serve to an automated agent.
//!
//! ## Pipeline
//!
//! - **Scanning**: flatten the arbitrarily nested diagnostics tree into
//!   attribute records ([`scan`])
//! - **Canonicalization**: map raw records to canonical device types, device
//!   and signal identities, and typed values ([`canonical`])
//! - **Naming**: derive a human-readable device label from candidate
//!   records ([`name`])
//! - **Cataloging**: aggregate per device, apply filters, establish
//!   deterministic ordering ([`catalog`])
//! - **Chunking**: split ordered payloads into byte-bounded response
//!   envelopes with exact size accounting ([`chunk`])
//! - **Selector resolution**: match free-form selectors against the catalog
//!   through tiered matching with learned aliases ([`selector`])
//!
//! Everything here is pure: no I/O, no shared state, every structure is
//! built fresh per call and discarded after serialization.

pub mod canonical;
pub mod catalog;
pub mod chunk;
pub mod error;
pub mod glob;
pub mod name;
pub mod scan;
pub mod selector;

pub use canonical::{
    as_number, canonical_type, coerce_value, instance_of, unit_from_format, CanonicalType,
    DeviceId, SignalId, ValueRecord, ValueSource,
};
pub use catalog::{
    build_catalog, sort_devices, Catalog, CatalogFilter, CatalogMode, DeviceEntry, SignalEntry,
    StateValue, ValueEntry,
};
pub use chunk::{chunk_envelopes, Capture, ChunkInfo, Envelope, MIN_CHUNK_BYTES, SCHEMA_VERSION};
pub use error::{CoreError, Result};
pub use glob::glob_to_regex;
pub use scan::{collect_attribute_codes, scan_attributes};
pub use selector::{
    enrich_from_site, resolve_selectors, AliasTable, DeviceRef, Enrichment, ResolvedSelector,
    SelectorResolution,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
