//! Per-run context shared with every stage handler.

mod run;

pub use run::RunContext;
