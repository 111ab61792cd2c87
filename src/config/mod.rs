use std::env;
use std::path::PathBuf;
use std::time::Duration;
use anyhow::{Result, Context};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub max_file_size_mb: usize,
    pub max_concurrent_requests: usize,
    pub request_timeout_seconds: u64,
    pub ai_timeout_seconds: u64,
    pub ocr_timeout_seconds: u64,
    pub office_timeout_seconds: u64,
    pub ocr_dpi: u32,
    pub ocr_language: String,
    pub min_native_chars: usize,
    pub max_ai_input_chars: usize,
    pub retention_seconds: u64,
    pub cleanup_interval_seconds: u64,
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
    pub gemini_model: String,
    pub soffice_path: Option<String>,
    google_api_key: Option<ApiKey>,
}

/// Keeps the key out of `Debug` output, which is logged at startup.
#[derive(Clone)]
struct ApiKey(String);

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(****)")
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        let config = Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| {
                info!("SERVER_HOST not set, using default: 0.0.0.0");
                "0.0.0.0".to_string()
            }),
            server_port: Self::parse_env_var("SERVER_PORT", 8080)
                .context("Failed to parse SERVER_PORT")?,
            max_file_size_mb: Self::parse_env_var("MAX_FILE_SIZE_MB", 100)
                .context("Failed to parse MAX_FILE_SIZE_MB")?,
            max_concurrent_requests: Self::parse_env_var("MAX_CONCURRENT_REQUESTS", 4)
                .context("Failed to parse MAX_CONCURRENT_REQUESTS")?,
            request_timeout_seconds: Self::parse_env_var("REQUEST_TIMEOUT_SECONDS", 600)
                .context("Failed to parse REQUEST_TIMEOUT_SECONDS")?,
            ai_timeout_seconds: Self::parse_env_var("AI_TIMEOUT_SECONDS", 120)
                .context("Failed to parse AI_TIMEOUT_SECONDS")?,
            ocr_timeout_seconds: Self::parse_env_var("OCR_TIMEOUT_SECONDS", 60)
                .context("Failed to parse OCR_TIMEOUT_SECONDS")?,
            office_timeout_seconds: Self::parse_env_var("OFFICE_TIMEOUT_SECONDS", 300)
                .context("Failed to parse OFFICE_TIMEOUT_SECONDS")?,
            ocr_dpi: Self::parse_env_var("OCR_DPI", 300)
                .context("Failed to parse OCR_DPI")?,
            ocr_language: Self::string_env_var("OCR_LANGUAGE", "eng"),
            min_native_chars: Self::parse_env_var("MIN_NATIVE_CHARS", 20)
                .context("Failed to parse MIN_NATIVE_CHARS")?,
            max_ai_input_chars: Self::parse_env_var("MAX_AI_INPUT_CHARS", 100_000)
                .context("Failed to parse MAX_AI_INPUT_CHARS")?,
            retention_seconds: Self::parse_env_var("RETENTION_SECONDS", 3600)
                .context("Failed to parse RETENTION_SECONDS")?,
            cleanup_interval_seconds: Self::parse_env_var("CLEANUP_INTERVAL_SECONDS", 300)
                .context("Failed to parse CLEANUP_INTERVAL_SECONDS")?,
            upload_dir: PathBuf::from(Self::string_env_var("UPLOAD_DIR", "uploads")),
            output_dir: PathBuf::from(Self::string_env_var("OUTPUT_DIR", "output")),
            gemini_model: Self::string_env_var("GEMINI_MODEL", "gemini-1.5-flash"),
            soffice_path: env::var("SOFFICE_PATH").ok().filter(|s| !s.trim().is_empty()),
            google_api_key: env::var("GOOGLE_API_KEY")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(ApiKey),
        };

        config.validate()?;

        if config.google_api_key.is_none() {
            warn!("GOOGLE_API_KEY not set; summarize and translate requests will fail at the AI step");
        }

        info!("Configuration loaded successfully: {:?}", config);
        Ok(config)
    }

    fn parse_env_var<T>(var_name: &str, default: T) -> Result<T>
    where
        T: std::str::FromStr + Copy + std::fmt::Debug,
        T::Err: std::fmt::Display,
    {
        match env::var(var_name) {
            Ok(val) => match val.parse() {
                Ok(parsed) => Ok(parsed),
                Err(e) => {
                    warn!("Failed to parse {}: {} (using default: {:?})", var_name, e, default);
                    Ok(default)
                }
            },
            Err(_) => {
                info!("{} not set, using default: {:?}", var_name, default);
                Ok(default)
            }
        }
    }

    fn string_env_var(var_name: &str, default: &str) -> String {
        match env::var(var_name) {
            Ok(val) if !val.trim().is_empty() => val,
            _ => {
                info!("{} not set, using default: {}", var_name, default);
                default.to_string()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server_port == 0 {
            return Err(anyhow::anyhow!("SERVER_PORT must be greater than 0"));
        }
        if self.max_file_size_mb == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be greater than 0"));
        }
        if self.max_concurrent_requests == 0 {
            return Err(anyhow::anyhow!("MAX_CONCURRENT_REQUESTS must be greater than 0"));
        }
        if self.request_timeout_seconds == 0 || self.ai_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("Request and AI timeouts must be greater than 0"));
        }
        if self.ocr_timeout_seconds == 0 || self.office_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("OCR and office conversion timeouts must be greater than 0"));
        }
        if !(72..=600).contains(&self.ocr_dpi) {
            return Err(anyhow::anyhow!("OCR_DPI must be between 72 and 600, got {}", self.ocr_dpi));
        }
        if self.max_ai_input_chars == 0 {
            return Err(anyhow::anyhow!("MAX_AI_INPUT_CHARS must be greater than 0"));
        }
        if self.retention_seconds == 0 {
            return Err(anyhow::anyhow!("RETENTION_SECONDS must be greater than 0"));
        }
        // The AI call runs inside the request budget.
        if self.ai_timeout_seconds >= self.request_timeout_seconds {
            return Err(anyhow::anyhow!(
                "AI_TIMEOUT_SECONDS ({}) must be less than REQUEST_TIMEOUT_SECONDS ({})",
                self.ai_timeout_seconds,
                self.request_timeout_seconds
            ));
        }
        // Sweeps run while requests are in flight; scratch files must outlive them.
        if self.retention_seconds <= self.request_timeout_seconds {
            return Err(anyhow::anyhow!(
                "RETENTION_SECONDS ({}) must be greater than REQUEST_TIMEOUT_SECONDS ({})",
                self.retention_seconds,
                self.request_timeout_seconds
            ));
        }
        Ok(())
    }

    pub fn max_file_size_bytes(&self) -> usize {
        self.max_file_size_mb * 1024 * 1024
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn ai_timeout(&self) -> Duration {
        Duration::from_secs(self.ai_timeout_seconds)
    }

    pub fn ocr_timeout(&self) -> Duration {
        Duration::from_secs(self.ocr_timeout_seconds)
    }

    pub fn office_timeout(&self) -> Duration {
        Duration::from_secs(self.office_timeout_seconds)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_seconds)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_seconds.max(1))
    }

    pub fn google_api_key(&self) -> Option<&str> {
        self.google_api_key.as_ref().map(|k| k.0.as_str())
    }

    pub fn with_google_api_key(mut self, key: impl Into<String>) -> Self {
        self.google_api_key = Some(ApiKey(key.into()));
        self
    }

    /// Defaults without touching the environment, rooted at `scratch_root`.
    pub fn for_scratch_root(scratch_root: impl Into<PathBuf>) -> Self {
        let root = scratch_root.into();
        Config {
            server_host: "127.0.0.1".to_string(),
            server_port: 8080,
            max_file_size_mb: 100,
            max_concurrent_requests: 4,
            request_timeout_seconds: 600,
            ai_timeout_seconds: 120,
            ocr_timeout_seconds: 60,
            office_timeout_seconds: 300,
            ocr_dpi: 300,
            ocr_language: "eng".to_string(),
            min_native_chars: 20,
            max_ai_input_chars: 100_000,
            retention_seconds: 3600,
            cleanup_interval_seconds: 300,
            upload_dir: root.join("uploads"),
            output_dir: root.join("output"),
            gemini_model: "gemini-1.5-flash".to_string(),
            soffice_path: None,
            google_api_key: None,
        }
    }
}
