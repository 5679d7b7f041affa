pub mod global_rule;
pub mod project;
pub mod query;
pub mod region;
pub mod sequence;

pub use global_rule::GlobalRule;
pub use project::Project;
pub use query::{Query, QueryDestination, QueryResult};
pub use region::Region;
pub use sequence::Sequence;
