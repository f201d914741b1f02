//! The batch orchestrator: normalize, check, then build and publish.
//!
//! Requests are independent units of work. A failure is recorded against
//! its own request and the batch moves on; nothing is retried here because
//! re-running the whole batch is safe behind the existence check.

use serde::Serialize;

use crate::builder::Builder;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::release::{self, ReleaseHost};
use crate::version::{self, CanonicalVersion, ReleaseTag};

/// One unit of work: an extension to package and publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionRequest {
    pub name: String,
    pub raw_version: String,
    pub source_url: String,
}

impl ExtensionRequest {
    /// Parse a `name,rawVersion,sourceUrl` CLI triple.
    /// Splits on the first two commas only, so URLs may contain commas.
    pub fn parse(argument: &str) -> Result<Self> {
        let mut parts = argument.splitn(3, ',');
        let name = parts.next().unwrap_or("").trim();
        let raw_version = parts.next().unwrap_or("").trim();
        let source_url = parts.next().unwrap_or("").trim();

        if name.is_empty() || raw_version.is_empty() || source_url.is_empty() {
            return Err(Error::invalid_request(
                argument,
                "expected three non-empty fields: name,version,sourceUrl",
            ));
        }

        Ok(Self {
            name: name.to_string(),
            raw_version: raw_version.to_string(),
            source_url: source_url.to_string(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOutcome {
    pub name: String,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<CanonicalVersion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<ReleaseTag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Published,
    Skipped,
    Planned,
    Failed,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineSummary {
    pub total: u32,
    pub published: u32,
    pub skipped: u32,
    pub planned: u32,
    pub failed: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub action: String,
    pub dry_run: bool,
    pub results: Vec<RequestOutcome>,
    pub summary: PipelineSummary,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Stop each request after the existence check, reporting what would
    /// be built.
    pub dry_run: bool,
}

/// Run the pipeline over a batch of raw CLI triples, strictly one request
/// at a time: builds monopolize the host's cores and disk.
pub fn run(
    config: &Config,
    host: &dyn ReleaseHost,
    builder: &dyn Builder,
    arguments: &[String],
    options: &PipelineOptions,
) -> (PipelineResult, i32) {
    let mut results = Vec::with_capacity(arguments.len());
    let mut summary = PipelineSummary::default();

    for argument in arguments {
        let outcome = run_request(config, host, builder, argument, options);

        summary.total += 1;
        match outcome.status {
            OutcomeStatus::Published => summary.published += 1,
            OutcomeStatus::Skipped => summary.skipped += 1,
            OutcomeStatus::Planned => summary.planned += 1,
            OutcomeStatus::Failed => summary.failed += 1,
        }

        results.push(outcome);
    }

    let exit_code = if summary.failed > 0 { 1 } else { 0 };

    (
        PipelineResult {
            action: "publish".to_string(),
            dry_run: options.dry_run,
            results,
            summary,
        },
        exit_code,
    )
}

fn run_request(
    config: &Config,
    host: &dyn ReleaseHost,
    builder: &dyn Builder,
    argument: &str,
    options: &PipelineOptions,
) -> RequestOutcome {
    match execute_request(config, host, builder, argument, options) {
        Ok(outcome) => outcome,
        Err(e) => RequestOutcome {
            name: request_label(argument),
            status: OutcomeStatus::Failed,
            version: None,
            tag: None,
            asset: None,
            error: Some(e.to_string()),
        },
    }
}

fn execute_request(
    config: &Config,
    host: &dyn ReleaseHost,
    builder: &dyn Builder,
    argument: &str,
    options: &PipelineOptions,
) -> Result<RequestOutcome> {
    let request = ExtensionRequest::parse(argument)?;
    let version = version::normalize(&request.raw_version)?;
    let tag = ReleaseTag::new(&request.name, &version);

    // Existence is checked before any build work so the expensive build is
    // only paid when new work exists.
    if host.exists(&tag) {
        log_status!("publish", "Skipping {} (release already published)", tag);
        return Ok(RequestOutcome {
            name: request.name,
            status: OutcomeStatus::Skipped,
            version: Some(version),
            tag: Some(tag),
            asset: None,
            error: None,
        });
    }

    if options.dry_run {
        log_status!("publish", "Would build and publish {}", tag);
        return Ok(RequestOutcome {
            name: request.name,
            status: OutcomeStatus::Planned,
            version: Some(version),
            tag: Some(tag),
            asset: None,
            error: None,
        });
    }

    let artifact = builder.build(&request.name, &version, &request.source_url)?;
    release::publish(host, config, &request.name, &version, &tag, &artifact)?;

    Ok(RequestOutcome {
        name: request.name,
        status: OutcomeStatus::Published,
        version: Some(version),
        tag: Some(tag),
        asset: Some(artifact.asset_name),
        error: None,
    })
}

fn request_label(argument: &str) -> String {
    argument.split(',').next().unwrap_or(argument).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{BuildArtifact, ExtensionBuilder};
    use crate::runner::testing::RecordingRunner;
    use std::cell::RefCell;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn test_config() -> Config {
        Config {
            api_base: "https://releases.example.com".to_string(),
            token: Some("secret".to_string()),
            pg_major: 16,
            arch: "amd64".to_string(),
            scratch_root: PathBuf::from("/tmp/pgship"),
        }
    }

    #[derive(Default)]
    struct RecordingBuilder {
        calls: RefCell<Vec<(String, String, String)>>,
        fail: bool,
    }

    impl Builder for RecordingBuilder {
        fn build(
            &self,
            name: &str,
            version: &CanonicalVersion,
            source_url: &str,
        ) -> crate::Result<BuildArtifact> {
            self.calls.borrow_mut().push((
                name.to_string(),
                version.to_string(),
                source_url.to_string(),
            ));

            if self.fail {
                return Err(Error::build_command_failed("make", "make -j4", 2, "boom"));
            }

            Ok(BuildArtifact {
                path: PathBuf::from(format!("/tmp/{}.deb", name)),
                asset_name: format!("{}-v{}-pg16-amd64-linux-gnu.deb", name, version),
                sha256: "ab".repeat(32),
            })
        }
    }

    #[derive(Default)]
    struct FakeHost {
        existing: Vec<String>,
        omit_upload_endpoint: bool,
        created: RefCell<Vec<(String, String, String)>>,
        uploads: RefCell<Vec<(String, String)>>,
    }

    impl ReleaseHost for FakeHost {
        fn exists(&self, tag: &ReleaseTag) -> bool {
            self.existing.iter().any(|t| t == tag.as_str())
        }

        fn create_release(&self, tag: &ReleaseTag, title: &str, body: &str) -> crate::Result<String> {
            self.created.borrow_mut().push((
                tag.as_str().to_string(),
                title.to_string(),
                body.to_string(),
            ));

            if self.omit_upload_endpoint {
                return Err(Error::publish_failed(
                    tag.as_str(),
                    "creation response omitted the asset upload endpoint",
                ));
            }

            Ok("https://uploads.example.com/42".to_string())
        }

        fn upload_asset(
            &self,
            upload_endpoint: &str,
            _tag: &ReleaseTag,
            artifact: &BuildArtifact,
        ) -> crate::Result<()> {
            self.uploads.borrow_mut().push((
                upload_endpoint.to_string(),
                artifact.asset_name.clone(),
            ));
            Ok(())
        }
    }

    fn run_one(
        host: &FakeHost,
        builder: &RecordingBuilder,
        argument: &str,
        dry_run: bool,
    ) -> (PipelineResult, i32) {
        run(
            &test_config(),
            host,
            builder,
            &[argument.to_string()],
            &PipelineOptions { dry_run },
        )
    }

    #[test]
    fn parse_accepts_a_well_formed_triple() {
        let request =
            ExtensionRequest::parse("pgvector,v0.5.1,https://example.com/pgvector.tgz").unwrap();
        assert_eq!(request.name, "pgvector");
        assert_eq!(request.raw_version, "v0.5.1");
        assert_eq!(request.source_url, "https://example.com/pgvector.tgz");
    }

    #[test]
    fn parse_keeps_commas_inside_the_url() {
        let request = ExtensionRequest::parse("x,1.0.0,https://example.com/a,b,c").unwrap();
        assert_eq!(request.source_url, "https://example.com/a,b,c");
    }

    #[test]
    fn parse_rejects_missing_fields() {
        assert!(ExtensionRequest::parse("pgvector,v0.5.1").is_err());
        assert!(ExtensionRequest::parse("pgvector,,https://example.com/x.tgz").is_err());
        assert!(ExtensionRequest::parse("").is_err());
    }

    #[test]
    fn existing_release_skips_the_build_entirely() {
        let host = FakeHost {
            existing: vec!["pgvector-v0.5.1".to_string()],
            ..FakeHost::default()
        };
        let builder = RecordingBuilder::default();

        let (result, exit_code) = run_one(
            &host,
            &builder,
            "pgvector,v0.5.1,https://example.com/pgvector.tgz",
            false,
        );

        assert_eq!(exit_code, 0);
        assert_eq!(result.summary.skipped, 1);
        assert_eq!(result.results[0].status, OutcomeStatus::Skipped);
        assert!(builder.calls.borrow().is_empty());
        assert!(host.created.borrow().is_empty());
    }

    #[test]
    fn new_release_is_built_and_published() {
        let host = FakeHost::default();
        let builder = RecordingBuilder::default();

        let (result, exit_code) = run_one(
            &host,
            &builder,
            "pgvector,v0.5.1,https://example.com/pgvector.tgz",
            false,
        );

        assert_eq!(exit_code, 0);
        assert_eq!(result.summary.published, 1);

        // Builder received the canonical version, not the raw tag.
        let builds = builder.calls.borrow();
        assert_eq!(
            builds[0],
            (
                "pgvector".to_string(),
                "0.5.1".to_string(),
                "https://example.com/pgvector.tgz".to_string()
            )
        );

        let created = host.created.borrow();
        assert_eq!(created[0].0, "pgvector-v0.5.1");

        let uploads = host.uploads.borrow();
        assert_eq!(uploads[0].1, "pgvector-v0.5.1-pg16-amd64-linux-gnu.deb");
    }

    #[test]
    fn dry_run_stops_after_the_existence_check() {
        let host = FakeHost::default();
        let builder = RecordingBuilder::default();

        let (result, exit_code) = run_one(
            &host,
            &builder,
            "pgvector,v0.5.1,https://example.com/pgvector.tgz",
            true,
        );

        assert_eq!(exit_code, 0);
        assert_eq!(result.results[0].status, OutcomeStatus::Planned);
        assert!(builder.calls.borrow().is_empty());
        assert!(host.created.borrow().is_empty());
    }

    #[test]
    fn missing_upload_endpoint_fails_without_an_upload_call() {
        let host = FakeHost {
            omit_upload_endpoint: true,
            ..FakeHost::default()
        };
        let builder = RecordingBuilder::default();

        let (result, exit_code) = run_one(
            &host,
            &builder,
            "pgvector,v0.5.1,https://example.com/pgvector.tgz",
            false,
        );

        assert_eq!(exit_code, 1);
        assert_eq!(result.results[0].status, OutcomeStatus::Failed);
        assert!(host.uploads.borrow().is_empty());
    }

    #[test]
    fn one_failure_does_not_abort_the_batch() {
        let host = FakeHost::default();
        let builder = RecordingBuilder::default();

        let (result, exit_code) = run(
            &test_config(),
            &host,
            &builder,
            &[
                "not-a-triple".to_string(),
                "pg_cron,v1.6.2,https://example.com/pg_cron.tgz".to_string(),
            ],
            &PipelineOptions::default(),
        );

        assert_eq!(exit_code, 1);
        assert_eq!(result.summary.total, 2);
        assert_eq!(result.summary.failed, 1);
        assert_eq!(result.summary.published, 1);
        assert_eq!(result.results[0].status, OutcomeStatus::Failed);
        assert_eq!(result.results[0].name, "not-a-triple");
        assert_eq!(result.results[1].status, OutcomeStatus::Published);
    }

    #[test]
    fn unparseable_version_fails_only_its_request() {
        let host = FakeHost::default();
        let builder = RecordingBuilder::default();

        let (result, _) = run_one(
            &host,
            &builder,
            "pgvector,latest,https://example.com/pgvector.tgz",
            false,
        );

        assert_eq!(result.results[0].status, OutcomeStatus::Failed);
        assert!(builder.calls.borrow().is_empty());
    }

    #[test]
    fn full_pipeline_builds_with_variant_and_publishes() {
        let root = TempDir::new().unwrap();
        let archive = root.path().join("pgvector.tar.gz");
        fs::write(&archive, b"archive bytes").unwrap();

        let config = Config {
            api_base: "https://releases.example.com".to_string(),
            token: Some("secret".to_string()),
            pg_major: 16,
            arch: "amd64".to_string(),
            scratch_root: root.path().join("scratch"),
        };
        let runner = RecordingRunner::new().touching("checkinstall", "pgvector_0.5.1-1_amd64.deb");
        let builder = ExtensionBuilder::new(&config, &runner, Vec::new());
        let host = FakeHost::default();

        let (result, exit_code) = run(
            &config,
            &host,
            &builder,
            &[format!("pgvector,v0.5.1,file://{}", archive.display())],
            &PipelineOptions::default(),
        );

        assert_eq!(exit_code, 0);
        assert_eq!(result.results[0].status, OutcomeStatus::Published);

        // The opt-flag-suppression variant ran as part of the build.
        let calls = runner.calls();
        let make = calls.iter().find(|c| c.program == "make").unwrap();
        assert!(make.args.iter().any(|a| a == "OPTFLAGS="));

        assert_eq!(host.created.borrow()[0].0, "pgvector-v0.5.1");
        assert_eq!(
            host.uploads.borrow()[0].1,
            "pgvector-v0.5.1-pg16-amd64-linux-gnu.deb"
        );
    }

    #[test]
    fn build_failure_is_surfaced_on_the_request() {
        let host = FakeHost::default();
        let builder = RecordingBuilder {
            fail: true,
            ..RecordingBuilder::default()
        };

        let (result, exit_code) = run_one(
            &host,
            &builder,
            "pg_cron,v1.6.2,https://example.com/pg_cron.tgz",
            false,
        );

        assert_eq!(exit_code, 1);
        assert_eq!(result.results[0].status, OutcomeStatus::Failed);
        assert!(result.results[0].error.is_some());
        // Nothing was published for the failed build.
        assert!(host.created.borrow().is_empty());
    }
}
