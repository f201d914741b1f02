use clap::Args;
use serde::Serialize;

use pgship::version::{self, CanonicalVersion};

use crate::commands::CmdResult;

#[derive(Args)]
pub struct NormalizeArgs {
    /// Raw upstream version string
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct NormalizeOutput {
    pub raw: String,
    pub version: CanonicalVersion,
}

pub fn run(args: NormalizeArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<NormalizeOutput> {
    let version = version::normalize(&args.version)?;
    Ok((
        NormalizeOutput {
            raw: args.version,
            version,
        },
        0,
    ))
}
