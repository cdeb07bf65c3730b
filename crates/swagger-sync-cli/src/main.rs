mod commands;
mod config;
mod logging;
mod pipeline;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

use crate::commands::fetch_file::FetchFileArgs;
use crate::commands::links::LinksArgs;
use crate::commands::release::{BumpVersionArgs, PrepareBuildArgs};
use crate::config::SyncArgs;
use crate::logging::LogFormat;

#[derive(Parser)]
#[command(name = "swagger-sync")]
#[command(about = "Sync API specifications into a GitHub repository and prepare app builds")]
struct Cli {
    /// Log line format on stderr
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch specification documents and open pull requests for new versions
    Sync(SyncArgs),
    /// Emit download links of mapped specifications as pipeline variables
    SwaggerLinks(LinksArgs),
    /// Print a file from a private GitHub repository
    FetchFile(FetchFileArgs),
    /// Set the version of the app config file
    BumpVersion(BumpVersionArgs),
    /// Derive asset paths, patch the bundler config and write the build descriptor
    PrepareBuild(PrepareBuildArgs),
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    logging::init_tracing(cli.log_format);

    match cli.command {
        Command::Sync(args) => {
            let config = args.validate().inspect_err(|e| error!(error = %e, "invalid configuration"))?;
            commands::sync::run(config).await
        }
        Command::SwaggerLinks(args) => {
            commands::links::run(args).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::FetchFile(args) => {
            commands::fetch_file::run(args).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::BumpVersion(args) => {
            commands::release::bump_version(&args)?;
            println!("{}", commands::sync::STATUS_OK);
            Ok(ExitCode::SUCCESS)
        }
        Command::PrepareBuild(args) => {
            commands::release::prepare_build(&args)?;
            println!("{}", commands::sync::STATUS_OK);
            Ok(ExitCode::SUCCESS)
        }
    }
}
