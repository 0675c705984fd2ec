//! Interfaces shared by all CLI subcommands

use crate::config::AppConfig;
use crate::error::PipelineResult;

/// One runnable subcommand, built from parsed arguments
pub trait Command {
    fn execute(&self) -> PipelineResult<()>;
}

/// Turns parsed CLI arguments into a runnable command
pub trait CommandFactory<'a> {
    /// Builds the command selected by `args`
    ///
    /// # Arguments
    /// * `args` - Matches of the top-level clap command
    /// * `config` - Configuration the command borrows for its lifetime
    ///
    /// # Returns
    /// The boxed command, or an error when the subcommand is unknown or an
    /// argument is missing
    fn create_command(&self, args: &clap::ArgMatches, config: &'a AppConfig) -> PipelineResult<Box<dyn Command + 'a>>;
}
