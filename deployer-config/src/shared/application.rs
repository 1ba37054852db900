use serde::{Deserialize, Serialize};

/// HTTP server configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationSettings {
    /// Host address the API listens on.
    pub host: String,
    /// Port number the API listens on.
    pub port: u16,
}

impl ApplicationSettings {
    /// Returns the `host:port` pair the server binds to.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
