use clap::Args;

use pgship::builder::ExtensionBuilder;
use pgship::config::Config;
use pgship::pipeline::{self, PipelineOptions, PipelineResult};
use pgship::release::HttpReleaseHost;
use pgship::runner::SystemRunner;

use crate::commands::CmdResult;

#[derive(Args)]
pub struct PublishArgs {
    /// Extension requests, one comma-separated triple per argument
    #[arg(required = true, value_name = "NAME,VERSION,URL")]
    pub requests: Vec<String>,

    /// Plan the batch without building or publishing
    #[arg(long)]
    pub dry_run: bool,

    /// Extra argument appended to the build's make invocation (repeatable)
    #[arg(long = "make-arg", value_name = "ARG")]
    pub make_args: Vec<String>,
}

pub fn run(args: PublishArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<PipelineResult> {
    let config = Config::from_env()?;

    // Fail before any build work when the credential is missing; a dry run
    // never uploads, so it may proceed without one.
    if !args.dry_run {
        config.require_token()?;
    }

    let runner = SystemRunner;
    let host = HttpReleaseHost::new(&config)?;
    let builder = ExtensionBuilder::new(&config, &runner, args.make_args);

    let (result, exit_code) = pipeline::run(
        &config,
        &host,
        &builder,
        &args.requests,
        &PipelineOptions {
            dry_run: args.dry_run,
        },
    );

    Ok((result, exit_code))
}
