use clap::Args;
use serde::Serialize;

use pgship::config::Config;
use pgship::release::{HttpReleaseHost, ReleaseHost};
use pgship::version::{self, CanonicalVersion, ReleaseTag};

use crate::commands::CmdResult;

#[derive(Args)]
pub struct CheckArgs {
    /// Extension name
    pub name: String,

    /// Raw upstream version string
    pub version: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOutput {
    pub name: String,
    pub version: CanonicalVersion,
    pub tag: ReleaseTag,
    pub exists: bool,
}

pub fn run(args: CheckArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<CheckOutput> {
    let config = Config::from_env()?;
    let host = HttpReleaseHost::new(&config)?;

    let version = version::normalize(&args.version)?;
    let tag = ReleaseTag::new(&args.name, &version);
    let exists = host.exists(&tag);

    Ok((
        CheckOutput {
            name: args.name,
            version,
            tag,
            exists,
        },
        0,
    ))
}
