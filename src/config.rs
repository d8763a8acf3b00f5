//! Configuration for the conversion service.
//!
//! Every knob lives in [`ServerConfig`], built via [`ServerConfigBuilder`].
//! The CLI maps its flags (each with an env-var fallback) onto the builder;
//! library users and tests set only what they care about.

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory (under the upload root) for spreadsheet uploads.
pub const EXCEL_DIR: &str = "excel";
/// Directory (under the upload root) for PDFs, non-spreadsheet uploads and page sets.
pub const PDF_IMAGES_DIR: &str = "pdf-images";
/// Directory (under the upload root) for job manifests.
pub const JOBS_DIR: &str = "jobs";

/// Configuration for the conversion service.
///
/// # Example
/// ```rust
/// use doc2pages::ServerConfig;
///
/// let config = ServerConfig::builder()
///     .upload_root("/var/lib/doc2pages/uploads")
///     .engine_concurrency(4)
///     .build()
///     .unwrap();
/// assert_eq!(config.port, 5152);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to. Default: `0.0.0.0`.
    pub bind: String,

    /// TCP port. Default: 5152.
    pub port: u16,

    /// Root of the persisted layout (`excel/`, `pdf-images/`, `jobs/`). Default: `uploads`.
    pub upload_root: PathBuf,

    /// URL prefix under which `upload_root` is served. Default: `/uploads`.
    pub public_prefix: String,

    /// Page render scale relative to the PDF's point size. Default: 2.0.
    pub render_scale: f32,

    /// LibreOffice executable used for Word documents. Default: `soffice`.
    pub soffice_bin: String,

    /// Chromium/Chrome executable used to print spreadsheet HTML. Default: `chromium`.
    pub chrome_bin: String,

    /// Maximum number of external engine processes running at once. Default: 2.
    ///
    /// Further conversions queue until a slot frees up.
    pub engine_concurrency: usize,

    /// Wall-clock limit for a single engine invocation, in seconds. Default: 120.
    pub engine_timeout_secs: u64,

    /// Largest accepted request body. Default: 100 MiB.
    pub max_upload_bytes: usize,

    /// Directory holding libpdfium. If `None`, the working directory and then
    /// the system library path are tried.
    pub pdfium_lib_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 5152,
            upload_root: PathBuf::from("uploads"),
            public_prefix: "/uploads".to_string(),
            render_scale: 2.0,
            soffice_bin: "soffice".to_string(),
            chrome_bin: "chromium".to_string(),
            engine_concurrency: 2,
            engine_timeout_secs: 120,
            max_upload_bytes: 100 * 1024 * 1024,
            pdfium_lib_dir: None,
        }
    }
}

impl ServerConfig {
    /// Create a new builder for `ServerConfig`.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder {
            config: Self::default(),
        }
    }

    /// `{upload_root}/excel`
    pub fn excel_dir(&self) -> PathBuf {
        self.upload_root.join(EXCEL_DIR)
    }

    /// `{upload_root}/pdf-images`
    pub fn pdf_images_dir(&self) -> PathBuf {
        self.upload_root.join(PDF_IMAGES_DIR)
    }

    /// `{upload_root}/jobs`
    pub fn jobs_dir(&self) -> PathBuf {
        self.upload_root.join(JOBS_DIR)
    }

    /// Public URL of a file under `pdf-images/`, e.g. `/uploads/pdf-images/memo.pdf`.
    pub fn pdf_images_url(&self, relative: &str) -> String {
        format!(
            "{}/{}/{}",
            self.public_prefix.trim_end_matches('/'),
            PDF_IMAGES_DIR,
            relative
        )
    }

    /// `host:port` string for the listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn bind(mut self, bind: impl Into<String>) -> Self {
        self.config.bind = bind.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn upload_root(mut self, root: impl AsRef<Path>) -> Self {
        self.config.upload_root = root.as_ref().to_path_buf();
        self
    }

    pub fn public_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.public_prefix = prefix.into();
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale;
        self
    }

    pub fn soffice_bin(mut self, bin: impl Into<String>) -> Self {
        self.config.soffice_bin = bin.into();
        self
    }

    pub fn chrome_bin(mut self, bin: impl Into<String>) -> Self {
        self.config.chrome_bin = bin.into();
        self
    }

    pub fn engine_concurrency(mut self, n: usize) -> Self {
        self.config.engine_concurrency = n;
        self
    }

    pub fn engine_timeout_secs(mut self, secs: u64) -> Self {
        self.config.engine_timeout_secs = secs;
        self
    }

    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn pdfium_lib_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.pdfium_lib_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServerConfig, ConvertError> {
        let c = &self.config;
        if !(0.25..=8.0).contains(&c.render_scale) {
            return Err(ConvertError::InvalidConfig(format!(
                "Render scale must be 0.25–8.0, got {}",
                c.render_scale
            )));
        }
        if c.engine_concurrency == 0 {
            return Err(ConvertError::InvalidConfig(
                "Engine concurrency must be ≥ 1".into(),
            ));
        }
        if c.engine_timeout_secs == 0 {
            return Err(ConvertError::InvalidConfig(
                "Engine timeout must be ≥ 1s".into(),
            ));
        }
        if !c.public_prefix.starts_with('/') {
            return Err(ConvertError::InvalidConfig(format!(
                "Public prefix must start with '/', got {:?}",
                c.public_prefix
            )));
        }
        if c.upload_root.as_os_str().is_empty() {
            return Err(ConvertError::InvalidConfig(
                "Upload root must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_persisted_layout() {
        let c = ServerConfig::default();
        assert_eq!(c.excel_dir(), PathBuf::from("uploads/excel"));
        assert_eq!(c.pdf_images_dir(), PathBuf::from("uploads/pdf-images"));
        assert_eq!(c.render_scale, 2.0);
        assert_eq!(c.listen_addr(), "0.0.0.0:5152");
    }

    #[test]
    fn pdf_images_url_joins_prefix() {
        let c = ServerConfig::default();
        assert_eq!(c.pdf_images_url("memo.pdf"), "/uploads/pdf-images/memo.pdf");

        let c = ServerConfig::builder()
            .public_prefix("/files/")
            .build()
            .unwrap();
        assert_eq!(
            c.pdf_images_url("memo/memo_page_1.png"),
            "/files/pdf-images/memo/memo_page_1.png"
        );
    }

    #[test]
    fn build_rejects_zero_concurrency() {
        let err = ServerConfig::builder().engine_concurrency(0).build();
        assert!(matches!(err, Err(ConvertError::InvalidConfig(_))));
    }

    #[test]
    fn build_rejects_out_of_range_scale() {
        assert!(ServerConfig::builder().render_scale(0.1).build().is_err());
        assert!(ServerConfig::builder().render_scale(9.0).build().is_err());
        assert!(ServerConfig::builder().render_scale(1.5).build().is_ok());
    }

    #[test]
    fn build_rejects_relative_prefix() {
        assert!(ServerConfig::builder()
            .public_prefix("uploads")
            .build()
            .is_err());
    }
}
