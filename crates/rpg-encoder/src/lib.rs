//! The encoding pipeline: lift a codebase into a Repository Planning Graph,
//! reorganize it semantically, ground it in the directory tree, inject
//! dependency edges, and evolve it from commit deltas.

pub mod batch;
pub mod cache;
pub mod embed;
pub mod encoder;
pub mod evolve;
pub mod extract;
pub mod ground;
pub mod infer;
pub mod inject;
pub mod llm;
pub mod normalize;
pub mod reorganize;
pub mod router;
pub mod vcs;

pub use encoder::{EncodeResult, Encoder};
pub use evolve::{EvolutionEngine, EvolutionResult};
