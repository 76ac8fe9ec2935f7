//! Song search: query descriptors, planning, concurrent execution, merging,
//! result selection and cache invalidation.

mod descriptor;
pub mod executor;
pub mod invalidation;
pub mod merge;
mod params;
pub mod planner;
mod search;
pub mod select;

pub use descriptor::{SongQuery, SortOrder, UpdateTypes};
pub use invalidation::InvalidationTracker;
pub use params::{ParamsError, SearchParams};
pub use planner::{QueryPlan, SubQuery, SubQueryRole};
pub use search::{QueryError, SearchFlags, SongSearcher};
