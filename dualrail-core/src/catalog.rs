//! Meter Catalog (C1): pure classification of meter keys by dotted prefix.

/// Which rail a meter belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterClass {
    /// Business-outcome meters: `workflow.`, `outcome.`, `step.`, `task.`
    Work,
    /// Resource-consumption meters: `api.`, `llm.`, `compute.`, `storage.`, `net.`
    Edge,
    /// Matches neither prefix set. Billable only if pricing is declared;
    /// never participates in envelopes or exclusions.
    Neutral,
}

const WORK_PREFIXES: &[&str] = &["workflow.", "outcome.", "step.", "task."];
const EDGE_PREFIXES: &[&str] = &["api.", "llm.", "compute.", "storage.", "net."];

/// Classify a meter key by its dotted prefix. Pure and side-effect-free.
pub fn classify(meter_key: &str) -> MeterClass {
    if WORK_PREFIXES.iter().any(|p| meter_key.starts_with(p)) {
        MeterClass::Work
    } else if EDGE_PREFIXES.iter().any(|p| meter_key.starts_with(p)) {
        MeterClass::Edge
    } else {
        MeterClass::Neutral
    }
}

pub fn is_work_meter(meter_key: &str) -> bool {
    classify(meter_key) == MeterClass::Work
}

pub fn is_edge_meter(meter_key: &str) -> bool {
    classify(meter_key) == MeterClass::Edge
}

/// The canonical set of edge and work meters the derivers emit. Additions
/// are data-driven, so this is a plain list rather than an enum.
pub const CANONICAL_EDGE_METERS: &[&str] = &[
    "api.calls",
    "llm.tokens",
    "llm.tokens.input",
    "llm.tokens.output",
    "compute.ms",
    "net.bytes",
    "storage.gbh",
];

pub const CANONICAL_WORK_METERS: &[&str] = &[
    "workflow.completed",
    "workflow.failed",
    "step.completed",
    "outcome.ticket_resolved",
    "outcome.document_processed",
    "outcome.analysis_completed",
];

/// Lookup table over the canonical meters, exposed so derivers and the
/// rating engine can enumerate what exists without hardcoding the lists
/// themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeterCatalog;

impl MeterCatalog {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, meter_key: &str) -> MeterClass {
        classify(meter_key)
    }

    pub fn edge_meters(&self) -> &'static [&'static str] {
        CANONICAL_EDGE_METERS
    }

    pub fn work_meters(&self) -> &'static [&'static str] {
        CANONICAL_WORK_METERS
    }
}
