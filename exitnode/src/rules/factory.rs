use shared::utilities::errors::AppError;

use crate::rdesc::{Act, Rule as RuleDesc};

use super::executable::RuleImpl;
use super::executor::Executor;
use super::{change_mode, create_project, delete_project, do_global_rules, query_project, test_rule};

/// Dispatches on the descriptor's `act` tag and calls the matching
/// constructor with the raw args blob. Unknown acts are unreachable here
/// since `Act` is a closed enum validated at deserialization time, but the
/// match stays exhaustive so a new variant fails to compile until handled.
pub fn create(executor: Executor, desc: &RuleDesc) -> Result<Box<dyn RuleImpl>, AppError> {
    match desc.act {
        Act::CreateProject => Ok(Box::new(create_project::CreateProject::from_args(
            executor, &desc.args,
        )?)),
        Act::DeleteProject => Ok(Box::new(delete_project::DeleteProject::from_args(
            executor, &desc.args,
        )?)),
        Act::QueryProject => Ok(Box::new(query_project::QueryProject::from_args(
            executor, &desc.args,
        )?)),
        Act::ChangeMode => Ok(Box::new(change_mode::ChangeMode::from_args(executor, &desc.args)?)),
        Act::DoGlobalRules => Ok(Box::new(do_global_rules::DoGlobalRules::from_args(
            executor, &desc.args,
        )?)),
        Act::Test => Ok(Box::new(test_rule::TestRule::from_args(&desc.args)?)),
    }
}
