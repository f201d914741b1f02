//! Source archive acquisition: scratch directories, download, extraction.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::runner::{self, ProcessRunner};
use crate::version::CanonicalVersion;

// Source archives can be large and mirrors slow.
const DOWNLOAD_TIMEOUT_SECS: u64 = 600;

const ARCHIVE_FILE_NAME: &str = "source.tar.gz";

/// Create a fresh scratch directory for one (name, version) build.
///
/// A leftover directory from a previous failed attempt is removed first so
/// no stale artifacts survive into this run.
pub fn fresh_scratch_dir(
    root: &Path,
    name: &str,
    version: &CanonicalVersion,
) -> Result<PathBuf> {
    let dir = root.join(format!("{}-{}", name, version));

    if dir.exists() {
        fs::remove_dir_all(&dir).map_err(|e| {
            Error::internal_io(
                e.to_string(),
                Some(format!("remove stale scratch dir {}", dir.display())),
            )
        })?;
    }

    fs::create_dir_all(&dir).map_err(|e| {
        Error::internal_io(
            e.to_string(),
            Some(format!("create scratch dir {}", dir.display())),
        )
    })?;

    Ok(dir)
}

/// Download the source archive into the scratch directory.
///
/// `file://` URLs are copied from the local filesystem, which lets
/// operators build from pre-fetched archives.
pub fn download_archive(url: &str, scratch: &Path) -> Result<PathBuf> {
    let dest = scratch.join(ARCHIVE_FILE_NAME);

    if let Some(path) = url.strip_prefix("file://") {
        fs::copy(path, &dest)
            .map_err(|e| Error::download_failed(url, None, Some(e.to_string())))?;
        return Ok(dest);
    }

    let client = reqwest::blocking::Client::builder()
        .user_agent(format!("pgship/{}", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
        .build()
        .map_err(|e| Error::internal_io(e.to_string(), Some("create HTTP client".to_string())))?;

    let mut response = client
        .get(url)
        .send()
        .map_err(|e| Error::download_failed(url, None, Some(e.to_string())))?;

    if !response.status().is_success() {
        return Err(Error::download_failed(
            url,
            Some(response.status().as_u16()),
            None,
        ));
    }

    let mut file = fs::File::create(&dest).map_err(|e| {
        Error::internal_io(
            e.to_string(),
            Some(format!("create archive file {}", dest.display())),
        )
    })?;
    io::copy(&mut response, &mut file)
        .map_err(|e| Error::download_failed(url, None, Some(e.to_string())))?;

    Ok(dest)
}

/// Unpack the archive into the scratch directory, dropping the archive's
/// top-level wrapper directory so sources land at the scratch root.
pub fn extract_archive(
    runner: &dyn ProcessRunner,
    archive: &Path,
    scratch: &Path,
) -> Result<()> {
    let archive_path = archive.to_string_lossy().to_string();
    let scratch_path = scratch.to_string_lossy().to_string();
    let args = [
        "xzf",
        archive_path.as_str(),
        "--strip-components=1",
        "-C",
        scratch_path.as_str(),
    ];

    let output = runner.run("tar", &args, scratch, &[]);
    if !output.success {
        return Err(Error::build_command_failed(
            "extract",
            runner::command_line("tar", &args),
            output.exit_code,
            output.tail(15),
        ));
    }

    Ok(())
}
