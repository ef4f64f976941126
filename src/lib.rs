pub mod dataset;
mod entries;
pub mod errors;
pub mod geometry;
pub mod heuristics;
pub mod m_tree;
mod node;
#[cfg(feature = "setup_tracing")]
mod settings;
