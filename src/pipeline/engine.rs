//! External PDF engines: LibreOffice for Word documents, Chromium for HTML.
//!
//! Both engines are plain child processes. Every invocation goes through an
//! [`EnginePool`], which caps how many run at once and kills any process
//! that outlives the configured timeout. Each invocation gets its own scratch
//! directory (and engine profile inside it) so concurrent runs never share
//! state.

use crate::config::ServerConfig;
use crate::error::ConvertError;
use async_trait::async_trait;
use std::path::Path;
use std::process::{Output, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, info};

/// How long Chromium may spend laying out the page before printing.
const CHROME_SETTLE_BUDGET_MS: u32 = 10_000;

/// Converts a word-processor document to PDF.
#[async_trait]
pub trait WordEngine: Send + Sync {
    /// Convert `input` and write the PDF bytes to `output`.
    async fn convert_to_pdf(&self, input: &Path, output: &Path) -> Result<(), ConvertError>;
}

/// Prints an HTML document to PDF.
#[async_trait]
pub trait HtmlPrinter: Send + Sync {
    /// Render `html` and write the printed PDF to `output`.
    async fn print_to_pdf(&self, html: &str, output: &Path) -> Result<(), ConvertError>;
}

/// Bounded, timed execution of engine processes.
#[derive(Clone)]
pub struct EnginePool {
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl EnginePool {
    pub fn new(concurrency: usize, timeout: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            timeout,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            config.engine_concurrency,
            Duration::from_secs(config.engine_timeout_secs),
        )
    }

    /// Run `cmd` to completion once a slot is free.
    ///
    /// The child is killed if it exceeds the timeout. A non-zero exit status
    /// is returned as `Ok`; callers decide what failure means for them.
    pub async fn run(&self, mut cmd: Command, program: &str) -> Result<Output, ConvertError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ConvertError::Internal("engine pool closed".into()))?;

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Running {program}");
        match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(source)) => Err(ConvertError::EngineLaunch {
                program: program.to_string(),
                source,
            }),
            Err(_) => Err(ConvertError::EngineTimeout {
                program: program.to_string(),
                secs: self.timeout.as_secs(),
            }),
        }
    }

    /// Number of engine slots currently free.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

/// `soffice --headless --convert-to pdf`.
pub struct SofficeEngine {
    bin: String,
    pool: EnginePool,
}

impl SofficeEngine {
    pub fn new(bin: impl Into<String>, pool: EnginePool) -> Self {
        Self {
            bin: bin.into(),
            pool,
        }
    }
}

#[async_trait]
impl WordEngine for SofficeEngine {
    async fn convert_to_pdf(&self, input: &Path, output: &Path) -> Result<(), ConvertError> {
        let scratch = tempfile::tempdir().map_err(|e| ConvertError::Internal(e.to_string()))?;
        let ext = super::dispatch::extension_of(input);
        let staged = scratch.path().join(format!("source{ext}"));
        let produced = scratch.path().join("source.pdf");
        let profile = scratch.path().join("profile");

        let bytes = tokio::fs::read(input)
            .await
            .map_err(|e| ConvertError::storage(input, e))?;
        tokio::fs::write(&staged, &bytes)
            .await
            .map_err(|e| ConvertError::storage(&staged, e))?;

        let mut cmd = Command::new(&self.bin);
        cmd.arg("--headless")
            .arg("--norestore")
            .arg("--nolockcheck")
            .arg(format!("-env:UserInstallation=file://{}", profile.display()))
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(scratch.path())
            .arg(&staged);

        let out = self.pool.run(cmd, &self.bin).await?;
        if !out.status.success() {
            return Err(ConvertError::WordConversion {
                detail: format!(
                    "{} exited with {}: {}",
                    self.bin,
                    out.status,
                    String::from_utf8_lossy(&out.stderr).trim()
                ),
            });
        }

        let pdf = tokio::fs::read(&produced)
            .await
            .map_err(|_| ConvertError::WordConversion {
                detail: format!("{} produced no PDF", self.bin),
            })?;
        tokio::fs::write(output, &pdf)
            .await
            .map_err(|e| ConvertError::storage(output, e))?;

        info!("soffice wrote {} bytes → {}", pdf.len(), output.display());
        Ok(())
    }
}

/// Headless Chromium `--print-to-pdf`, one browser process per call.
///
/// Page size, orientation and margins come from the document's `@page` rule;
/// background colours survive through `print-color-adjust: exact`.
pub struct ChromiumPrinter {
    bin: String,
    pool: EnginePool,
}

impl ChromiumPrinter {
    pub fn new(bin: impl Into<String>, pool: EnginePool) -> Self {
        Self {
            bin: bin.into(),
            pool,
        }
    }
}

#[async_trait]
impl HtmlPrinter for ChromiumPrinter {
    async fn print_to_pdf(&self, html: &str, output: &Path) -> Result<(), ConvertError> {
        let scratch = tempfile::tempdir().map_err(|e| ConvertError::Internal(e.to_string()))?;
        let page = scratch.path().join("sheet.html");
        let printed = scratch.path().join("sheet.pdf");
        let profile = scratch.path().join("profile");

        tokio::fs::write(&page, html)
            .await
            .map_err(|e| ConvertError::storage(&page, e))?;

        let mut cmd = Command::new(&self.bin);
        cmd.arg("--headless")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--no-first-run")
            .arg("--no-pdf-header-footer")
            .arg("--run-all-compositor-stages-before-draw")
            .arg(format!("--virtual-time-budget={CHROME_SETTLE_BUDGET_MS}"))
            .arg(format!("--user-data-dir={}", profile.display()))
            .arg(format!("--print-to-pdf={}", printed.display()))
            .arg(format!("file://{}", page.display()));

        let out = self.pool.run(cmd, &self.bin).await?;
        if !out.status.success() {
            return Err(ConvertError::SpreadsheetConversion {
                detail: format!(
                    "{} exited with {}: {}",
                    self.bin,
                    out.status,
                    String::from_utf8_lossy(&out.stderr).trim()
                ),
            });
        }

        let pdf = tokio::fs::read(&printed)
            .await
            .map_err(|_| ConvertError::SpreadsheetConversion {
                detail: format!("{} printed no PDF", self.bin),
            })?;
        tokio::fs::write(output, &pdf)
            .await
            .map_err(|e| ConvertError::storage(output, e))?;

        info!("chromium printed {} bytes → {}", pdf.len(), output.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_binary_is_a_launch_error() {
        let pool = EnginePool::new(1, Duration::from_secs(5));
        let cmd = Command::new("doc2pages-no-such-engine");
        let err = pool.run(cmd, "doc2pages-no-such-engine").await.unwrap_err();
        assert!(matches!(err, ConvertError::EngineLaunch { .. }), "got {err:?}");
        assert_eq!(pool.available(), 1, "permit released after failure");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_engine_times_out() {
        let pool = EnginePool::new(1, Duration::from_millis(200));
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let err = pool.run(cmd, "sleep").await.unwrap_err();
        assert!(matches!(err, ConvertError::EngineTimeout { .. }), "got {err:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_returned_to_caller() {
        let pool = EnginePool::new(1, Duration::from_secs(5));
        let out = pool.run(Command::new("false"), "false").await.unwrap();
        assert!(!out.status.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_soffice_surfaces_as_word_conversion_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("memo.docx");
        std::fs::write(&input, b"PK").unwrap();

        let engine = SofficeEngine::new("false", EnginePool::new(1, Duration::from_secs(5)));
        let err = engine
            .convert_to_pdf(&input, &dir.path().join("memo.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::WordConversion { .. }), "got {err:?}");
        assert!(!dir.path().join("memo.pdf").exists());
    }

    #[test]
    fn pool_never_has_zero_slots() {
        let pool = EnginePool::new(0, Duration::from_secs(1));
        assert_eq!(pool.available(), 1);
    }
}
