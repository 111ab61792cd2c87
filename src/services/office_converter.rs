use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::command::{is_command_available, run_with_timeout};

/// Turns an office document into a PDF. The result is written into
/// `out_dir` and owned by the caller.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    async fn convert(&self, input: &Path, out_dir: &Path) -> AppResult<PathBuf>;

    fn is_available(&self) -> bool {
        true
    }
}

const SOFFICE_CANDIDATES: &[&str] = &[
    "soffice",
    "libreoffice",
    "/usr/bin/soffice",
    "/usr/bin/libreoffice",
    "/Applications/LibreOffice.app/Contents/MacOS/soffice",
    "C:/Program Files/LibreOffice/program/soffice.exe",
    "C:/Program Files (x86)/LibreOffice/program/soffice.exe",
];

/// LibreOffice in headless mode.
pub struct SofficeConverter {
    configured: Option<String>,
    timeout: Duration,
    command: OnceCell<Option<String>>,
}

impl SofficeConverter {
    pub fn new(configured: Option<String>, timeout: Duration) -> Self {
        Self {
            configured,
            timeout,
            command: OnceCell::new(),
        }
    }

    fn discover(configured: Option<&str>) -> Option<String> {
        if let Some(path) = configured {
            if Path::new(path).exists() {
                info!(soffice = path, "Using configured soffice path");
                return Some(path.to_string());
            }
            warn!(soffice = path, "Configured soffice path does not exist, searching defaults");
        }

        SOFFICE_CANDIDATES.iter().find_map(|candidate| {
            debug!(candidate, "Checking for soffice");
            is_command_available(candidate, "--version").then(|| candidate.to_string())
        })
    }

    async fn command(&self) -> Option<&str> {
        let configured = self.configured.clone();
        self.command
            .get_or_init(|| async move {
                tokio::task::spawn_blocking(move || Self::discover(configured.as_deref()))
                    .await
                    .ok()
                    .flatten()
            })
            .await
            .as_deref()
    }
}

#[async_trait]
impl DocumentConverter for SofficeConverter {
    async fn convert(&self, input: &Path, out_dir: &Path) -> AppResult<PathBuf> {
        let soffice = self.command().await.ok_or_else(|| {
            AppError::conversion(
                "LibreOffice 'soffice' command not found. Install LibreOffice or set SOFFICE_PATH",
            )
        })?;

        // soffice names its output after the input stem, so it gets a private
        // directory to keep concurrent conversions apart.
        let work_dir = tempfile::Builder::new()
            .prefix("convert_")
            .tempdir_in(out_dir)
            .map_err(|e| AppError::storage(format!("Failed to create conversion directory: {}", e)))?;

        // A private user profile per run; concurrent instances sharing the
        // default profile hand work to each other or fail on its lock.
        let work_path = tokio::fs::canonicalize(work_dir.path())
            .await
            .map_err(|e| AppError::storage(format!("Failed to resolve conversion directory: {}", e)))?;
        let profile = profile_url(&work_path.join("profile"));

        let mut command = Command::new(soffice);
        command
            .arg(format!("-env:UserInstallation={}", profile))
            .arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(work_dir.path())
            .arg(input);

        info!(input = %input.display(), "Converting office document to PDF");
        run_with_timeout(&mut command, self.timeout)
            .await
            .map_err(|e| AppError::conversion(format!("{:#}", e)))?;

        let stem = input
            .file_stem()
            .ok_or_else(|| AppError::conversion("input has no file name"))?;
        let produced = work_dir.path().join(format!("{}.pdf", stem.to_string_lossy()));
        if !tokio::fs::try_exists(&produced).await.unwrap_or(false) {
            return Err(AppError::conversion("LibreOffice finished but produced no PDF"));
        }

        let output = out_dir.join(format!("{}_converted.pdf", Uuid::new_v4()));
        tokio::fs::rename(&produced, &output)
            .await
            .map_err(|e| AppError::storage(format!("Failed to move converted PDF: {}", e)))?;

        debug!(output = %output.display(), "Office conversion finished");
        Ok(output)
    }

    fn is_available(&self) -> bool {
        match self.command.get() {
            Some(found) => found.is_some(),
            None => Self::discover(self.configured.as_deref()).is_some(),
        }
    }
}

/// `file://` URL for a LibreOffice user installation directory.
fn profile_url(dir: &Path) -> String {
    let path = dir.to_string_lossy().replace('\\', "/");
    if path.starts_with('/') {
        format!("file://{}", path)
    } else {
        format!("file:///{}", path)
    }
}
