// config lets us layer an optional file and MIRELLA_* environment variables
use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

use crate::error::Result;
use crate::remote::HttpMethod;
use crate::term::{vocabulary, Term};

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Context given to materialized quads whose template names none.
    pub default_context: String,
    /// Method used for remote members built through `RemoteOptions::from_config`.
    pub remote_method: HttpMethod,
    pub remote_timeout_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_context: vocabulary::DEFAULT_CONTEXT.to_string(),
            remote_method: HttpMethod::Get,
            remote_timeout_ms: None,
        }
    }
}

impl EngineConfig {
    /// Reads the optional file (any format the `config` crate recognizes by
    /// extension), then lets `MIRELLA_*` environment variables override it.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path));
        }
        let settings = builder
            .add_source(Environment::with_prefix("MIRELLA").try_parsing(true))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
    pub fn remote_timeout(&self) -> Option<Duration> {
        self.remote_timeout_ms.map(Duration::from_millis)
    }
    pub fn default_context(&self) -> Term {
        Term::iri(self.default_context.clone())
    }
}
