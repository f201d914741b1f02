//! The extension build procedure: fetch, prepare, compile, package.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetch;
use crate::runner::{self, ProcessRunner};
use crate::variants::{self, PrepStep};
use crate::version::CanonicalVersion;

/// The single packaged file produced by a successful build.
///
/// Lives in the build's scratch directory and is only valid until the
/// pipeline finishes with the request; nothing retains it after upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildArtifact {
    pub path: PathBuf,
    pub asset_name: String,
    pub sha256: String,
}

/// Builds one extension from a source archive into an installable package.
pub trait Builder {
    fn build(
        &self,
        name: &str,
        version: &CanonicalVersion,
        source_url: &str,
    ) -> Result<BuildArtifact>;
}

/// Production builder: drives tar, the variant prep steps, make, and
/// checkinstall through the process runner in a per-request scratch
/// directory.
pub struct ExtensionBuilder<'a> {
    config: &'a Config,
    runner: &'a dyn ProcessRunner,
    make_args: Vec<String>,
}

/// Where the generic build runs and what it passes to make, as decided by
/// the extension's prep steps.
struct BuildPlan {
    build_dir: PathBuf,
    make_overrides: Vec<String>,
}

impl<'a> ExtensionBuilder<'a> {
    pub fn new(config: &'a Config, runner: &'a dyn ProcessRunner, make_args: Vec<String>) -> Self {
        Self {
            config,
            runner,
            make_args,
        }
    }

    fn run_stage(&self, stage: &str, dir: &Path, program: &str, args: &[&str]) -> Result<()> {
        let output = self.runner.run(program, args, dir, &[]);
        if !output.success {
            return Err(Error::build_command_failed(
                stage,
                runner::command_line(program, args),
                output.exit_code,
                output.tail(15),
            ));
        }
        Ok(())
    }

    /// Run the extension's prep steps and decide the build directory.
    fn prepare(&self, name: &str, scratch: &Path, pg_config: &str) -> Result<BuildPlan> {
        let mut plan = BuildPlan {
            build_dir: scratch.to_path_buf(),
            make_overrides: Vec::new(),
        };

        for step in variants::prep_steps(name) {
            match step {
                PrepStep::SuppressOptFlags => {
                    // Passed on the make command line so it overrides the
                    // Makefile's own default, which an environment variable
                    // would not.
                    plan.make_overrides.push("OPTFLAGS=".to_string());
                }
                PrepStep::Autogen => {
                    self.run_stage("autogen", scratch, "sh", &["./autogen.sh"])?;
                }
                PrepStep::Configure => {
                    let pg_config_arg = format!("PG_CONFIG={}", pg_config);
                    self.run_stage("configure", scratch, "sh", &["./configure", &pg_config_arg])?;
                }
                PrepStep::CmakeConfigure => {
                    let build_dir = scratch.join("build");
                    fs::create_dir_all(&build_dir).map_err(|e| {
                        Error::internal_io(
                            e.to_string(),
                            Some(format!("create build dir {}", build_dir.display())),
                        )
                    })?;
                    self.run_stage("cmake", &build_dir, "cmake", &[".."])?;
                    plan.build_dir = build_dir;
                }
            }
        }

        Ok(plan)
    }

    fn compile(&self, plan: &BuildPlan, pg_config: &str) -> Result<()> {
        let jobs = format!("-j{}", available_parallelism());
        let pg_config_arg = format!("PG_CONFIG={}", pg_config);

        let mut args: Vec<&str> = vec![&jobs, &pg_config_arg];
        args.extend(plan.make_overrides.iter().map(|a| a.as_str()));
        args.extend(self.make_args.iter().map(|a| a.as_str()));

        self.run_stage("make", &plan.build_dir, "make", &args)
    }

    /// Package the build's installed output with checkinstall in
    /// no-install mode, leaving the .deb in the build directory.
    fn package(
        &self,
        name: &str,
        version: &CanonicalVersion,
        plan: &BuildPlan,
        pg_config: &str,
    ) -> Result<()> {
        let pkgname = format!("--pkgname={}", name);
        let pkgversion = format!("--pkgversion={}", version);
        let pkgarch = format!("--pkgarch={}", self.config.arch);
        let pakdir = format!("--pakdir={}", plan.build_dir.display());
        let pg_config_arg = format!("PG_CONFIG={}", pg_config);

        let args = [
            "--default",
            "--install=no",
            "--backup=no",
            "--nodoc",
            pkgname.as_str(),
            pkgversion.as_str(),
            pkgarch.as_str(),
            pakdir.as_str(),
            "make",
            "install",
            pg_config_arg.as_str(),
        ];

        let output = self.runner.run("checkinstall", &args, &plan.build_dir, &[]);
        if !output.success {
            return Err(Error::packaging_failed(
                "checkinstall exited non-zero",
                Some(output.exit_code),
                Some(output.tail(15)),
            ));
        }
        Ok(())
    }
}

impl Builder for ExtensionBuilder<'_> {
    fn build(
        &self,
        name: &str,
        version: &CanonicalVersion,
        source_url: &str,
    ) -> Result<BuildArtifact> {
        log_status!(
            "build",
            "Building {} {} for PostgreSQL {} ({})",
            name,
            version,
            self.config.pg_major,
            self.config.arch
        );

        let scratch = fetch::fresh_scratch_dir(&self.config.scratch_root, name, version)?;
        let archive = fetch::download_archive(source_url, &scratch)?;
        fetch::extract_archive(self.runner, &archive, &scratch)?;

        let pg_config = self.config.pg_config_path();
        let pg_config = pg_config.to_string_lossy();

        let plan = self.prepare(name, &scratch, &pg_config)?;
        self.compile(&plan, &pg_config)?;
        self.package(name, version, &plan, &pg_config)?;

        let path = resolve_artifact(&plan.build_dir)?;
        let sha256 = sha256_hex(&path)?;
        let asset_name = asset_name(name, version, self.config);

        log_status!("build", "Packaged {}", asset_name);

        Ok(BuildArtifact {
            path,
            asset_name,
            sha256,
        })
    }
}

/// Conventional asset name for a packaged extension.
pub fn asset_name(name: &str, version: &CanonicalVersion, config: &Config) -> String {
    format!(
        "{}-v{}-pg{}-{}-linux-gnu.deb",
        name, version, config.pg_major, config.arch
    )
}

fn available_parallelism() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Resolve the one .deb the packaging step produced.
/// Newest match wins should the directory somehow hold more than one.
fn resolve_artifact(build_dir: &Path) -> Result<PathBuf> {
    let pattern = build_dir.join("*.deb").to_string_lossy().to_string();

    let entries: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|e| {
            Error::packaging_failed(
                format!("invalid artifact pattern '{}': {}", pattern, e),
                None,
                None,
            )
        })?
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_file())
        .collect();

    entries
        .into_iter()
        .max_by_key(|p| p.metadata().and_then(|m| m.modified()).ok())
        .ok_or_else(|| Error::packaging_failed("packaging produced no .deb artifact", None, None))
}

fn sha256_hex(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| {
        Error::internal_io(
            e.to_string(),
            Some(format!("read artifact {}", path.display())),
        )
    })?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}
