use reviews_errors::AppError;

const MAX_URL_LENGTH: usize = 2048;
const ALLOWED_SCHEMES: &[&str] = &["http", "https"];

/// Inbound URL checks. The extraction pipeline trusts whatever passes here.
pub struct InputSanitizer;

impl InputSanitizer {
    pub fn validate_url(url: &str) -> Result<String, AppError> {
        let url = url.trim();

        if url.is_empty() {
            return Err(AppError::InvalidUrl("URL must not be empty".to_string()));
        }

        if url.len() > MAX_URL_LENGTH {
            return Err(AppError::InvalidUrl("URL is too long".to_string()));
        }

        let parsed = url::Url::parse(url)
            .map_err(|_| AppError::InvalidUrl("URL is not well formed".to_string()))?;

        let scheme = parsed.scheme().to_lowercase();
        if !ALLOWED_SCHEMES.contains(&scheme.as_str()) {
            return Err(AppError::InvalidUrl(
                "Only HTTP and HTTPS URLs are allowed".to_string(),
            ));
        }

        if parsed.host_str().map_or(true, str::is_empty) {
            return Err(AppError::InvalidUrl("URL must have a host".to_string()));
        }

        Ok(parsed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_url() {
        assert!(InputSanitizer::validate_url("https://shop.example.com/p/42").is_ok());
        assert!(InputSanitizer::validate_url("  http://example.com/path  ").is_ok());
    }

    #[test]
    fn test_invalid_url() {
        assert!(InputSanitizer::validate_url("").is_err());
        assert!(InputSanitizer::validate_url("   ").is_err());
        assert!(InputSanitizer::validate_url("not-a-url").is_err());
        assert!(InputSanitizer::validate_url("ftp://example.com").is_err());
        assert!(InputSanitizer::validate_url("file:///etc/passwd").is_err());
    }

    #[test]
    fn test_too_long_url() {
        let url = format!("https://example.com/{}", "a".repeat(MAX_URL_LENGTH));
        assert!(matches!(
            InputSanitizer::validate_url(&url),
            Err(AppError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_normalizes_url() {
        assert_eq!(
            InputSanitizer::validate_url("https://Example.com").unwrap(),
            "https://example.com/"
        );
    }
}
