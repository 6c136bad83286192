use tracing::{error, info, warn};

#[derive(Debug, Clone, Default)]
pub struct AuditLogger;

impl AuditLogger {
    pub fn new() -> Self {
        Self
    }

    pub fn auth_success(&self, username: &str, client: &str) {
        info!(target: "audit", event = "auth_success", username, client);
    }

    pub fn auth_failure(&self, client: &str, reason: &str) {
        warn!(target: "audit", event = "auth_failure", client, reason);
    }

    pub fn signature_invalid(&self, service: Option<&str>, client: &str) {
        warn!(target: "audit", event = "signature_invalid", service = service.unwrap_or(""), client);
    }

    pub fn rate_limited(&self, client: &str) {
        warn!(target: "audit", event = "rate_limited", client);
    }

    pub fn user_registered(&self, username: &str, client: &str) {
        info!(target: "audit", event = "user_registered", username, client);
    }

    pub fn user_login(&self, username: &str, client: &str) {
        info!(target: "audit", event = "user_login", username, client);
    }

    pub fn internal_error(&self, client: &str, error_msg: &str) {
        error!(target: "audit", event = "internal_error", client, error = error_msg);
    }
}
