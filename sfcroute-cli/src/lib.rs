// All rule rewriting lives in sfcroute-core
// This CLI acts as a thin wrapper around the core library

// CLI-specific modules
pub mod input;

// Re-export core types for convenience
pub use sfcroute_core::*;

// Re-export CLI utilities
pub use input::{OutputFormat, RulesFile};
