// crates/toolgate-config/src/lib.rs
// ============================================================================
// Module: Toolgate Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for toolgate.toml semantics.
// Dependencies: toolgate-core, serde, toml
// ============================================================================

//! ## Overview
//! `toolgate-config` defines the configuration model for the gateway. It
//! provides strict, fail-closed validation and converts validated upstream
//! and trust sections into the in-memory stores the gateway reads from.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
