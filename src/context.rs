use std::sync::Arc;

use tracing::warn;

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::infra::bugzilla::BugzillaTracker;
use crate::infra::client::RestClient;
use crate::infra::http::ReqwestTransport;
use crate::services::IssueTracker;
use crate::workflow::operations::OperationAdapter;

#[derive(Clone)]
pub struct AppContext {
    pub config: AppConfig,
    pub issue_tracker: Arc<dyn IssueTracker>,
}

impl AppContext {
    pub fn new(config: AppConfig, issue_tracker: Arc<dyn IssueTracker>) -> Self {
        Self {
            config,
            issue_tracker,
        }
    }

    /// Wires the live Bugzilla tracker from configuration.
    pub fn connect(config: AppConfig) -> AppResult<Self> {
        let transport = Arc::new(ReqwestTransport::new(&config)?);
        let client = RestClient::new(&config, transport);
        let issue_tracker = Arc::new(BugzillaTracker::new(client));
        let context = Self::new(config, issue_tracker);
        if context.config.accept_invalid_certs {
            warn!(
                base_url = context.config.credentials.base_url(),
                "TLS certificate verification is disabled for the issue tracker"
            );
        }
        Ok(context)
    }

    pub fn adapter(&self) -> OperationAdapter {
        OperationAdapter::new(self.issue_tracker.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;

    #[test]
    fn connect_keeps_the_loaded_config() {
        let credentials =
            Credentials::new("https://bugzilla.example.org/rest", "key-abcdef").unwrap();
        let mut config = AppConfig::new(credentials);
        config.accept_invalid_certs = true;

        let context = AppContext::connect(config.clone()).unwrap();
        assert!(context.config.accept_invalid_certs);
        assert_eq!(
            context.config.credentials.base_url(),
            "https://bugzilla.example.org/rest"
        );
    }
}
