// src/core/mod.rs

// Everything that actually audits a site lives under `core`; the UI and the
// binary only consume its results and session snapshots.

/// Classified probe failures and the few errors that fail a run.
pub mod error;

/// Typed records exchanged between probes, normalizer and orchestrator.
pub mod models;

/// Security header rules: what is expected, what leaks, and what each costs.
pub mod knowledge_base;

/// Frontend, backend, TLS, header and stack probes behind the `StageProbes` seam.
pub mod scanner;

pub mod crawler;
pub mod narrative;
pub mod normalizer;
pub mod orchestrator;
pub mod recon;
