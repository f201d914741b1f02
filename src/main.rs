use clap::{Parser, Subcommand};

use commands::GlobalArgs;

mod commands;
mod output;

use commands::{check, normalize, publish};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "pgship")]
#[command(version = VERSION)]
#[command(about = "Package and publish PostgreSQL extensions as Debian release artifacts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and publish a batch of extensions, skipping published ones
    Publish(publish::PublishArgs),
    /// Check whether an extension release is already published
    Check(check::CheckArgs),
    /// Normalize a raw upstream version string
    Normalize(normalize::NormalizeArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let global = GlobalArgs {};

    let (json_result, exit_code) = match cli.command {
        Commands::Publish(args) => {
            output::map_cmd_result_to_json(commands::publish::run(args, &global))
        }
        Commands::Check(args) => output::map_cmd_result_to_json(commands::check::run(args, &global)),
        Commands::Normalize(args) => {
            output::map_cmd_result_to_json(commands::normalize::run(args, &global))
        }
    };

    output::print_json_result(json_result);
    std::process::ExitCode::from(output::exit_code_to_u8(exit_code))
}
