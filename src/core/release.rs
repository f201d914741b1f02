//! Release host access: existence checks, release creation, asset upload.

use std::fs;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::builder::BuildArtifact;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::version::{CanonicalVersion, ReleaseTag};

const REQUEST_TIMEOUT_SECS: u64 = 30;
const UPLOAD_TIMEOUT_SECS: u64 = 600;
const DEB_CONTENT_TYPE: &str = "application/vnd.debian.binary-package";

/// The remote release host, at the granularity the pipeline needs.
/// Substituted with a fake in tests.
pub trait ReleaseHost {
    /// Metadata-only lookup: is a release already published under this tag?
    fn exists(&self, tag: &ReleaseTag) -> bool;

    /// Create the release record; returns the asset upload endpoint.
    fn create_release(&self, tag: &ReleaseTag, title: &str, body: &str) -> Result<String>;

    /// Upload the artifact as a named asset of the release.
    fn upload_asset(
        &self,
        upload_endpoint: &str,
        tag: &ReleaseTag,
        artifact: &BuildArtifact,
    ) -> Result<()>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateReleasePayload<'a> {
    tag: &'a str,
    title: &'a str,
    body: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateReleaseResponse {
    upload_endpoint: Option<String>,
}

/// Release host client over its REST contract, with bearer auth.
pub struct HttpReleaseHost {
    api_base: String,
    token: Option<String>,
    client: reqwest::blocking::Client,
}

impl HttpReleaseHost {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(format!("pgship/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                Error::internal_io(e.to_string(), Some("create HTTP client".to_string()))
            })?;

        Ok(Self {
            api_base: config.api_base.clone(),
            token: config.token.clone(),
            client,
        })
    }

    fn authorize(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

impl ReleaseHost for HttpReleaseHost {
    fn exists(&self, tag: &ReleaseTag) -> bool {
        let url = format!("{}/releases/{}", self.api_base, tag);
        match self.authorize(self.client.head(&url)).send() {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                // Transport failures get the same "absent" treatment as
                // non-2xx responses, logged so an operator can tell them
                // apart.
                log_status!("check", "Existence check for {} failed ({}); treating as absent", tag, e);
                false
            }
        }
    }

    fn create_release(&self, tag: &ReleaseTag, title: &str, body: &str) -> Result<String> {
        let url = format!("{}/releases", self.api_base);
        let payload = CreateReleasePayload {
            tag: tag.as_str(),
            title,
            body,
        };

        let response = self
            .authorize(self.client.post(&url).json(&payload))
            .send()
            .map_err(|e| Error::release_creation_failed(tag.as_str(), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::release_creation_failed(
                tag.as_str(),
                format!("release host returned {}", status),
            ));
        }

        let parsed: CreateReleaseResponse = response.json().map_err(|e| {
            Error::release_creation_failed(
                tag.as_str(),
                format!("malformed creation response: {}", e),
            )
        })?;

        upload_endpoint_from(tag, parsed)
    }

    fn upload_asset(
        &self,
        upload_endpoint: &str,
        tag: &ReleaseTag,
        artifact: &BuildArtifact,
    ) -> Result<()> {
        let bytes = fs::read(&artifact.path).map_err(|e| {
            Error::internal_io(
                e.to_string(),
                Some(format!("read artifact {}", artifact.path.display())),
            )
        })?;

        let url = format!("{}?name={}", upload_endpoint, artifact.asset_name);
        let response = self
            .authorize(
                self.client
                    .post(&url)
                    .header(reqwest::header::CONTENT_TYPE, DEB_CONTENT_TYPE)
                    .timeout(Duration::from_secs(UPLOAD_TIMEOUT_SECS))
                    .body(bytes),
            )
            .send()
            .map_err(|e| Error::upload_failed(tag.as_str(), &artifact.asset_name, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::upload_failed(
                tag.as_str(),
                &artifact.asset_name,
                format!("release host returned {}", status),
            ));
        }

        Ok(())
    }
}

/// Extract the upload endpoint from a creation response.
/// A missing endpoint is fatal before any upload: continuing would leave a
/// release record with no asset and nothing to retry against.
fn upload_endpoint_from(tag: &ReleaseTag, response: CreateReleaseResponse) -> Result<String> {
    response
        .upload_endpoint
        .filter(|endpoint| !endpoint.trim().is_empty())
        .ok_or_else(|| {
            Error::publish_failed(
                tag.as_str(),
                "creation response omitted the asset upload endpoint",
            )
        })
}

/// Create the release for `tag` and upload the artifact as its asset.
pub fn publish(
    host: &dyn ReleaseHost,
    config: &Config,
    name: &str,
    version: &CanonicalVersion,
    tag: &ReleaseTag,
    artifact: &BuildArtifact,
) -> Result<()> {
    let (title, body) = release_notes(name, version, config, artifact);
    let endpoint = host.create_release(tag, &title, &body)?;
    host.upload_asset(&endpoint, tag, artifact)?;
    log_status!("publish", "Uploaded {} to release {}", artifact.asset_name, tag);
    Ok(())
}

fn release_notes(
    name: &str,
    version: &CanonicalVersion,
    config: &Config,
    artifact: &BuildArtifact,
) -> (String, String) {
    let title = format!("{} v{}", name, version);
    let body = format!(
        "{} {} packaged for PostgreSQL {} ({}), published {}.\n\nsha256: {}",
        name,
        version,
        config.pg_major,
        config.arch,
        Utc::now().format("%Y-%m-%d"),
        artifact.sha256
    );
    (title, body)
}
