//! Query tools over the Repository Planning Graph: search, fetch, explore.

pub mod explore;
pub mod fetch;
pub mod search;

pub use explore::{ExploreOptions, ExploreRpg, Strategy};
pub use fetch::{FetchNode, FetchRequest, FetchResult, FetchedNode};
pub use search::{SearchMode, SearchNode, SearchOptions, SearchResult};
