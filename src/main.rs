use anyhow::Result;
use clap::Parser;

mod cli;

use cli::commands::actions::ActionsCommand;
use cli::commands::assign::AssignCommand;
use cli::commands::create::CreateCommand;
use cli::commands::graph::GraphCommand;
use cli::commands::history::{HistoryCommand, VerifyCommand};
use cli::commands::transition::{AnnotateCommand, TransitionCommand};
use cli::commands::{Command, CommandContext};
use cli::{Cli, Commands};
use delivery_lifecycle::{init_telemetry, shutdown_telemetry};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = delivery_lifecycle::config()?;
    init_telemetry(&config.observability)?;
    let ctx = CommandContext::new(&cli.global, config);

    let result = tokio::runtime::Runtime::new()?.block_on(async {
        match cli.command {
            Commands::Graph => GraphCommand.execute(&ctx).await,
            Commands::Actions { tracking_code } => {
                ActionsCommand { tracking_code }.execute(&ctx).await
            }
            Commands::Create {
                tracking_code,
                priority,
            } => {
                CreateCommand {
                    tracking_code,
                    priority,
                }
                .execute(&ctx)
                .await
            }
            Commands::Assign {
                tracking_code,
                driver,
                vehicle,
                clear_driver,
                clear_vehicle,
            } => {
                AssignCommand {
                    tracking_code,
                    driver,
                    vehicle,
                    clear_driver,
                    clear_vehicle,
                }
                .execute(&ctx)
                .await
            }
            Commands::Transition {
                tracking_code,
                to,
                note,
                issue_type,
                issue_description,
            } => {
                TransitionCommand {
                    tracking_code,
                    to,
                    note,
                    issue_type,
                    issue_description,
                }
                .execute(&ctx)
                .await
            }
            Commands::Annotate { tracking_code, note } => {
                AnnotateCommand { tracking_code, note }.execute(&ctx).await
            }
            Commands::History { tracking_code } => {
                HistoryCommand { tracking_code }.execute(&ctx).await
            }
            Commands::Verify { tracking_code } => {
                VerifyCommand { tracking_code }.execute(&ctx).await
            }
        }
    });

    shutdown_telemetry();
    result
}
