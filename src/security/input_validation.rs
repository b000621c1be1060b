use crate::errors::{AppError, Result};
use url::Url;

const SUPPORTED_DOMAINS: [&str; 3] = ["youtube.com", "youtu.be", "youtube-nocookie.com"];

pub struct InputValidator;

impl InputValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_url(&self, url: &str) -> Result<()> {
        let url = url.trim();
        if url.is_empty() {
            return Err(AppError::Validation("URL cannot be empty".to_string()));
        }

        let parsed_url = Url::parse(url)
            .map_err(|e| AppError::Validation(format!("Invalid URL {}: {}", url, e)))?;

        if !matches!(parsed_url.scheme(), "http" | "https") {
            return Err(AppError::Validation(format!(
                "Unsupported scheme: {}",
                parsed_url.scheme()
            )));
        }

        let host = parsed_url.host_str()
            .ok_or_else(|| AppError::Validation("URL must have a host".to_string()))?;

        let is_supported = SUPPORTED_DOMAINS.iter().any(|domain| {
            host == *domain || host.ends_with(&format!(".{}", domain))
        });

        if !is_supported {
            return Err(AppError::Validation(format!(
                "Unsupported platform: {}. Only YouTube links are supported",
                host
            )));
        }

        Ok(())
    }

    /// Validates every URL of a batch, reporting the first bad line.
    pub fn validate_batch(&self, urls: &[&str]) -> Result<()> {
        for (index, url) in urls.iter().enumerate() {
            self.validate_url(url).map_err(|e| {
                AppError::Validation(format!("Line {}: {}", index + 1, e))
            })?;
        }
        Ok(())
    }

    /// The directory is not required to exist; it only ends up in rendered commands.
    pub fn validate_download_path(&self, path: &str) -> Result<()> {
        if path.trim().is_empty() {
            return Err(AppError::Validation("Download path cannot be empty".to_string()));
        }

        if path.contains('\0') {
            return Err(AppError::Validation("Null bytes not allowed in download path".to_string()));
        }

        Ok(())
    }

    pub fn validate_browser(&self, browser: &str) -> Result<()> {
        let valid_browsers = ["brave", "chrome", "chromium", "edge", "firefox", "opera", "safari", "vivaldi"];
        if !valid_browsers.contains(&browser.to_lowercase().as_str()) {
            return Err(AppError::Validation(format!(
                "Invalid browser: {}. Valid browsers: {}",
                browser,
                valid_browsers.join(", ")
            )));
        }
        Ok(())
    }
}

impl Default for InputValidator {
    fn default() -> Self {
        Self::new()
    }
}
