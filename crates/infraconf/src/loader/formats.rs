use super::DocumentFormat;
use crate::config::Config;
use crate::error::{Error, Location, Result, SyntaxError};

pub struct Json;

impl DocumentFormat for Json {
    fn name(&self) -> &'static str {
        "json"
    }

    fn parse(&self, source: &str) -> Result<Config, SyntaxError> {
        serde_json::from_str(source).map_err(|e| {
            SyntaxError::new(e.to_string()).at(Location {
                line: e.line(),
                column: e.column(),
            })
        })
    }

    fn render(&self, config: &Config) -> Result<String> {
        serde_json::to_string_pretty(config).map_err(|e| Error::Render {
            format: self.name(),
            source: e.into(),
        })
    }
}

pub struct Yaml;

impl DocumentFormat for Yaml {
    fn name(&self) -> &'static str {
        "yaml"
    }

    fn parse(&self, source: &str) -> Result<Config, SyntaxError> {
        if source.trim().is_empty() {
            return Ok(Config::default());
        }

        serde_yaml::from_str(source).map_err(|e| {
            let location = e.location().map(|l| Location {
                line: l.line(),
                column: l.column(),
            });
            SyntaxError::new(e.to_string()).at(location)
        })
    }

    fn render(&self, config: &Config) -> Result<String> {
        serde_yaml::to_string(config).map_err(|e| Error::Render {
            format: self.name(),
            source: e.into(),
        })
    }
}
