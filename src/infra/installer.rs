//! Release installation
//!
//! Downloads a release artifact into a staging directory, verifies it
//! against the descriptor checksum, places the mapped binary into a bin
//! directory and smoke-tests it.
//!
//! Nothing is written to the bin directory until the artifact has been
//! verified.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::core::release::{Checksum, ReleaseDescriptor};
use crate::error::{DownloadError, InstallError};
use crate::infra::download::{file_checksum, DownloadManager, ProgressCallback};

/// Outcome of a successful install
#[derive(Debug, Clone)]
pub struct InstallReport {
    /// Installed binary
    pub path: PathBuf,
    /// Checksum of the installed binary
    pub checksum: Checksum,
    /// Size in bytes
    pub size: u64,
}

/// Outcome of a successful smoke test
#[derive(Debug, Clone)]
pub struct SmokeTestReport {
    /// Binary that was run
    pub binary: PathBuf,
    /// First non-empty output line, usually the version string
    pub version_line: Option<String>,
}

/// Installs release artifacts
#[derive(Debug, Clone)]
pub struct Installer {
    downloads: DownloadManager,
    staging_root: PathBuf,
}

impl Installer {
    /// Create an installer staging downloads under `staging_root`
    pub fn new(staging_root: &Path) -> Self {
        Self::with_download_manager(staging_root, DownloadManager::new())
    }

    /// Create an installer with a custom download manager
    pub fn with_download_manager(staging_root: &Path, downloads: DownloadManager) -> Self {
        Self {
            downloads,
            staging_root: staging_root.to_path_buf(),
        }
    }

    /// Staging directory for a release
    pub fn staging_dir(&self, release: &ReleaseDescriptor) -> PathBuf {
        self.staging_root.join(release.staging_name())
    }

    /// Download and verify the artifact, returning the staging directory
    pub async fn fetch(
        &self,
        release: &ReleaseDescriptor,
        progress: Option<ProgressCallback>,
    ) -> Result<PathBuf, InstallError> {
        let staging = self.staging_dir(release);
        let dest = staging.join(release.artifact_file_name());

        tracing::info!(
            "Downloading {} {} from {}",
            release.name(),
            release.version(),
            release.artifact_url()
        );
        let result = self
            .downloads
            .download_verified(release.artifact_url(), &dest, release.checksum(), progress)
            .await?;
        tracing::debug!("Verified {} ({} bytes)", result.path.display(), result.size);

        Ok(staging)
    }

    /// Download, verify and place the release binary into `bin_dir`
    pub async fn install(
        &self,
        release: &ReleaseDescriptor,
        bin_dir: &Path,
        progress: Option<ProgressCallback>,
    ) -> Result<InstallReport, InstallError> {
        let staging = self.fetch(release, progress).await?;
        place(release, &staging, bin_dir)
    }
}

/// Check an already downloaded artifact against the descriptor
pub fn verify_local(release: &ReleaseDescriptor, path: &Path) -> Result<(), InstallError> {
    let actual = file_checksum(path, release.checksum().algorithm())?;
    if release.checksum().matches(actual.digest()) {
        Ok(())
    } else {
        Err(DownloadError::ChecksumMismatch {
            file: path.display().to_string(),
            expected: release.checksum().to_string(),
            actual: actual.to_string(),
        }
        .into())
    }
}

/// Copy the mapped source from `staging` to `bin_dir/<target>`
///
/// The copy goes through a temporary file in `bin_dir` and an atomic
/// rename, so an existing binary is replaced whole or not at all.
pub fn place(
    release: &ReleaseDescriptor,
    staging: &Path,
    bin_dir: &Path,
) -> Result<InstallReport, InstallError> {
    let mapping = release.install_mapping();
    let source = staging.join(&mapping.source);
    if !source.is_file() {
        return Err(InstallError::SourceMissing {
            source_name: mapping.source.clone(),
            dir: staging.to_path_buf(),
        });
    }

    let io_err = |path: &Path, e: std::io::Error| InstallError::IoError {
        path: path.to_path_buf(),
        error: e.to_string(),
    };

    fs::create_dir_all(bin_dir).map_err(|e| io_err(bin_dir, e))?;

    let target = bin_dir.join(&mapping.target);
    let temp_name = format!(".{}.tmp-{}", mapping.target, std::process::id());
    let temp = TempFile::new(bin_dir.join(temp_name));

    let size = fs::copy(&source, temp.path()).map_err(|e| io_err(temp.path(), e))?;
    set_executable(temp.path()).map_err(|e| io_err(temp.path(), e))?;

    let installed = file_checksum(temp.path(), release.checksum().algorithm())?;
    if !release.checksum().matches(installed.digest()) {
        return Err(InstallError::InstalledChecksumMismatch {
            path: target,
            expected: release.checksum().to_string(),
        });
    }

    temp.persist(&target).map_err(|e| io_err(&target, e))?;
    tracing::info!("Installed {} -> {}", source.display(), target.display());

    Ok(InstallReport {
        path: target,
        checksum: installed,
        size,
    })
}

/// Scratch file in the bin directory, removed on drop unless persisted
struct TempFile {
    path: PathBuf,
    persisted: bool,
}

impl TempFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            persisted: false,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// Rename onto `target`; on failure the file is still removed on drop
    fn persist(mut self, target: &Path) -> std::io::Result<()> {
        fs::rename(&self.path, target)?;
        self.persisted = true;
        Ok(())
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if !self.persisted && self.path.exists() {
            if let Err(e) = fs::remove_file(&self.path) {
                tracing::debug!("Could not remove {}: {e}", self.path.display());
            }
        }
    }
}

#[cfg(unix)]
fn set_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Run the installed binary with `args` and require a zero exit status
pub fn smoke_test(binary: &Path, args: &[String]) -> Result<SmokeTestReport, InstallError> {
    tracing::debug!("Running {} {}", binary.display(), args.join(" "));

    let output = Command::new(binary)
        .args(args)
        .output()
        .map_err(|e| InstallError::SmokeTestFailed {
            binary: binary.to_path_buf(),
            reason: format!("failed to start: {e}"),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let status = match output.status.code() {
            Some(code) => format!("exit code {code}"),
            None => "terminated by signal".to_string(),
        };
        return Err(InstallError::SmokeTestFailed {
            binary: binary.to_path_buf(),
            reason: if stderr.trim().is_empty() {
                status
            } else {
                format!("{status}: {}", stderr.trim())
            },
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let version_line = stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(String::from);

    Ok(SmokeTestReport {
        binary: binary.to_path_buf(),
        version_line,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::release::ChecksumAlgorithm;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SCRIPT: &[u8] = b"#!/bin/sh\necho \"talostpl version v9.9.9\"\n";

    fn descriptor(url: &str, content: &[u8], source: &str) -> ReleaseDescriptor {
        let checksum = Checksum::compute(ChecksumAlgorithm::Sha256, content);
        ReleaseDescriptor::from_toml_str(&format!(
            r#"
name = "talostpl"
url = "{url}"
version = "9.9.9"
checksum = "{checksum}"

[install]
source = "{source}"
target = "talostpl"
"#
        ))
        .unwrap()
    }

    fn staged(temp: &TempDir, name: &str, content: &[u8]) -> PathBuf {
        let staging = temp.path().join("staging");
        fs::create_dir_all(&staging).unwrap();
        fs::write(staging.join(name), content).unwrap();
        staging
    }

    #[test]
    fn test_place_copies_binary() {
        let temp = TempDir::new().unwrap();
        let staging = staged(&temp, "talostpl-linux-amd64", SCRIPT);
        let release = descriptor(
            "https://example.com/talostpl-linux-amd64",
            SCRIPT,
            "talostpl-linux-amd64",
        );
        let bin = temp.path().join("bin");

        let report = place(&release, &staging, &bin).unwrap();

        assert_eq!(report.path, bin.join("talostpl"));
        assert_eq!(fs::read(&report.path).unwrap(), SCRIPT);
        assert_eq!(&report.checksum, release.checksum());
        // No temporary files left behind
        assert_eq!(fs::read_dir(&bin).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_place_sets_executable_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let staging = staged(&temp, "artifact", SCRIPT);
        let release = descriptor("https://example.com/artifact", SCRIPT, "artifact");

        let report = place(&release, &staging, &temp.path().join("bin")).unwrap();
        let mode = fs::metadata(&report.path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_place_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let staging = staged(&temp, "artifact", SCRIPT);
        let release = descriptor("https://example.com/artifact", SCRIPT, "artifact");
        let bin = temp.path().join("bin");

        let first = place(&release, &staging, &bin).unwrap();
        let second = place(&release, &staging, &bin).unwrap();
        assert_eq!(first.checksum, second.checksum);
    }

    #[test]
    fn test_place_source_missing() {
        let temp = TempDir::new().unwrap();
        let staging = staged(&temp, "other-name", SCRIPT);
        let release = descriptor("https://example.com/artifact", SCRIPT, "artifact");

        let err = place(&release, &staging, &temp.path().join("bin")).unwrap_err();
        assert!(matches!(err, InstallError::SourceMissing { .. }));
        assert!(!temp.path().join("bin").join("talostpl").exists());
    }

    #[test]
    fn test_place_rejects_modified_staging_file() {
        let temp = TempDir::new().unwrap();
        let staging = staged(&temp, "artifact", b"swapped after download");
        let release = descriptor("https://example.com/artifact", SCRIPT, "artifact");
        let bin = temp.path().join("bin");

        let err = place(&release, &staging, &bin).unwrap_err();
        assert!(matches!(err, InstallError::InstalledChecksumMismatch { .. }));
        assert!(!bin.join("talostpl").exists());
        assert_eq!(fs::read_dir(&bin).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_place_failure_leaves_no_temp_file() {
        let temp = TempDir::new().unwrap();
        let staging = staged(&temp, "artifact", SCRIPT);
        let release = descriptor("https://example.com/artifact", SCRIPT, "artifact");
        let bin = temp.path().join("bin");
        // A non-empty directory at the target makes the final rename fail
        fs::create_dir_all(bin.join("talostpl").join("keep")).unwrap();

        let err = place(&release, &staging, &bin).unwrap_err();
        assert!(matches!(err, InstallError::IoError { .. }));

        let entries: Vec<_> = fs::read_dir(&bin)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("talostpl")]);
    }

    #[test]
    fn test_temp_file_removed_on_drop() {
        let temp = TempDir::new().unwrap();
        let scratch = temp.path().join(".talostpl.tmp-1");
        fs::write(&scratch, SCRIPT).unwrap();

        drop(TempFile::new(scratch.clone()));
        assert!(!scratch.exists());
    }

    #[test]
    fn test_temp_file_persist_keeps_target() {
        let temp = TempDir::new().unwrap();
        let scratch = temp.path().join(".talostpl.tmp-1");
        let target = temp.path().join("talostpl");
        fs::write(&scratch, SCRIPT).unwrap();

        TempFile::new(scratch.clone()).persist(&target).unwrap();
        assert!(!scratch.exists());
        assert_eq!(fs::read(&target).unwrap(), SCRIPT);
    }

    #[test]
    fn test_verify_local() {
        let temp = TempDir::new().unwrap();
        let staging = staged(&temp, "artifact", SCRIPT);
        let good = descriptor("https://example.com/artifact", SCRIPT, "artifact");
        let bad = descriptor("https://example.com/artifact", b"other", "artifact");

        assert!(verify_local(&good, &staging.join("artifact")).is_ok());
        assert!(matches!(
            verify_local(&bad, &staging.join("artifact")),
            Err(InstallError::Download(DownloadError::ChecksumMismatch { .. }))
        ));
    }

    #[tokio::test]
    async fn test_install_end_to_end() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v9.9.9/talostpl-linux-amd64"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(SCRIPT.to_vec()))
            .mount(&mock_server)
            .await;

        let temp = TempDir::new().unwrap();
        let release = descriptor(
            &format!("{}/v9.9.9/talostpl-linux-amd64", mock_server.uri()),
            SCRIPT,
            "talostpl-linux-amd64",
        );
        let installer = Installer::with_download_manager(
            &temp.path().join("cache"),
            DownloadManager::with_config(1, 10),
        );
        let bin = temp.path().join("bin");

        let report = installer.install(&release, &bin, None).await.unwrap();
        assert_eq!(report.path, bin.join("talostpl"));
        assert!(installer
            .staging_dir(&release)
            .join("talostpl-linux-amd64")
            .exists());
    }

    #[tokio::test]
    async fn test_install_corrupted_download_places_nothing() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/talostpl-linux-amd64"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"corrupted".to_vec()))
            .mount(&mock_server)
            .await;

        let temp = TempDir::new().unwrap();
        let release = descriptor(
            &format!("{}/talostpl-linux-amd64", mock_server.uri()),
            SCRIPT,
            "talostpl-linux-amd64",
        );
        let installer = Installer::with_download_manager(
            &temp.path().join("cache"),
            DownloadManager::with_config(1, 10),
        );
        let bin = temp.path().join("bin");

        let err = installer.install(&release, &bin, None).await.unwrap_err();
        assert!(matches!(
            err,
            InstallError::Download(DownloadError::ChecksumMismatch { .. })
        ));
        assert!(!bin.join("talostpl").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_smoke_test_success() {
        let temp = TempDir::new().unwrap();
        let staging = staged(&temp, "artifact", SCRIPT);
        let release = descriptor("https://example.com/artifact", SCRIPT, "artifact");
        let report = place(&release, &staging, &temp.path().join("bin")).unwrap();

        let smoke = smoke_test(&report.path, &release.smoke_test().args).unwrap();
        assert_eq!(
            smoke.version_line.as_deref(),
            Some("talostpl version v9.9.9")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_smoke_test_nonzero_exit() {
        let failing: &[u8] = b"#!/bin/sh\necho broken >&2\nexit 3\n";
        let temp = TempDir::new().unwrap();
        let staging = staged(&temp, "artifact", failing);
        let release = descriptor("https://example.com/artifact", failing, "artifact");
        let report = place(&release, &staging, &temp.path().join("bin")).unwrap();

        match smoke_test(&report.path, &release.smoke_test().args).unwrap_err() {
            InstallError::SmokeTestFailed { reason, .. } => {
                assert!(reason.contains("exit code 3"));
                assert!(reason.contains("broken"));
            }
            e => panic!("Expected SmokeTestFailed, got: {e:?}"),
        }
    }

    #[test]
    fn test_smoke_test_missing_binary() {
        let err = smoke_test(Path::new("/nonexistent/talostpl"), &[]).unwrap_err();
        assert!(matches!(err, InstallError::SmokeTestFailed { .. }));
    }
}
