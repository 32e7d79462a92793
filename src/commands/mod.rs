pub mod directory;
pub mod ingest;
pub mod serve;

pub use directory::{seed, sources, status};
pub use ingest::{run, run_hospital};
pub use serve::serve;
