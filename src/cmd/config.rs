use std::io::{self, Write};

use crate::config::{ApiKeyPlacement, AppConfig, mask_secret};
use crate::error::AppResult;

/// Prints the resolved configuration with the API key masked.
pub fn run(config: &AppConfig) -> AppResult<()> {
    let mut stdout = io::stdout().lock();
    for (label, value) in describe(config) {
        writeln!(stdout, "{label}: {value}")?;
    }
    Ok(())
}

fn describe(config: &AppConfig) -> Vec<(&'static str, String)> {
    let placement = match config.api_key_placement {
        ApiKeyPlacement::Header => "header",
        ApiKeyPlacement::Query => "query parameter",
    };

    vec![
        ("Bugzilla API URL", config.credentials.base_url().to_string()),
        ("Bugzilla API key", mask_secret(config.credentials.api_key())),
        ("API key sent as", placement.to_string()),
        ("Request timeout", format!("{}s", config.timeout.as_secs())),
        ("Page size", config.page_size.to_string()),
        ("Max pages", config.max_pages.to_string()),
        ("Retry transient failures", config.retry_transient.to_string()),
        (
            "Accept invalid certificates",
            config.accept_invalid_certs.to_string(),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;

    #[test]
    fn describes_config_without_leaking_key() {
        let config = AppConfig::new(
            Credentials::new("https://bugzilla.example.org/rest", "topsecretkey").unwrap(),
        );
        let lines = describe(&config);

        assert!(lines.iter().all(|(_, value)| !value.contains("topsecretkey")));
        assert!(lines.contains(&("Bugzilla API key", "top***key".to_string())));
        assert!(lines.contains(&("API key sent as", "header".to_string())));
    }
}
