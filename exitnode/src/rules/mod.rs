pub mod change_mode;
pub mod create_project;
pub mod delete_project;
pub mod do_global_rules;
pub mod executable;
pub mod executor;
pub mod factory;
pub mod query_api;
pub mod query_project;
pub mod query_scenario;
pub mod rule;
pub mod test_rule;

pub use executable::RuleImpl;
pub use executor::{Executor, RunCtx};
pub use rule::{Period, Rule};
