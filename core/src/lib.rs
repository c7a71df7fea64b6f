//! loanprep-core: cleaning, enrichment and assembly of the mortgage
//! trading datasets into one analysis-ready table.

pub mod amortization;
pub mod classifier;
pub mod config;
pub mod dates;
pub mod dedup;
pub mod error;
pub mod io;
pub mod join;
pub mod normalize;
pub mod pipeline;
pub mod report;
pub mod resolver;
pub mod rng;
pub mod sample;
pub mod schema;
pub mod stage;
pub mod store;
pub mod table;
pub mod types;
