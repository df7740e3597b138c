use thiserror::Error;

#[derive(Error, Debug)]
pub enum MirellaError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Data source error: {0}")]
    DataSource(String),
    #[error("Remote endpoint error at {endpoint}: {excerpt}")]
    RemoteEndpoint { endpoint: String, excerpt: String },
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Term syntax error: {0}")]
    TermSyntax(String),
}

impl MirellaError {
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::RemoteEndpoint { .. })
    }
    /// Remote failures keep only the head of the response body.
    pub fn remote(endpoint: &str, response: &str) -> Self {
        const EXCERPT: usize = 200;
        let excerpt = match response.char_indices().nth(EXCERPT) {
            Some((cut, _)) => format!("{}...", &response[..cut]),
            None => response.to_string(),
        };
        Self::RemoteEndpoint { endpoint: endpoint.to_string(), excerpt }
    }
}

pub type Result<T> = std::result::Result<T, MirellaError>;

// Helper conversions
impl From<config::ConfigError> for MirellaError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
