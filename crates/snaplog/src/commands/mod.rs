//! Command handlers, one module per top-level subcommand.

pub mod config_cmd;
pub mod record;
pub mod show;

use clap::CommandFactory;
use clap_complete::generate;

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a parsed command to its handler.
pub fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Record(args) => record::handle(args, global),
        Command::Show(args) => show::handle(&args, global),
        Command::Config(args) => config_cmd::handle(&args, global),
        Command::Completions(args) => {
            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "snaplog", &mut std::io::stdout());
            Ok(())
        }
    }
}
