//! Pure rule evaluators over already-loaded rows. No IO in this module;
//! services own persistence and inject results from here as side effects.

pub mod placement;
pub mod progress;
