pub mod export;
pub mod import;
pub mod prune;
pub mod qc;
