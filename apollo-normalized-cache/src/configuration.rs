//! Logic for loading configuration in to an object model.

use std::num::NonZeroUsize;
use std::str::FromStr;

use schemars::JsonSchema;
use schemars::r#gen::SchemaSettings;
use schemars::schema::RootSchema;
use serde::Deserialize;
use serde::Serialize;

use crate::error::ConfigurationError;

/// The configuration of the normalized cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct Configuration {
    /// Cache of compiled query plans
    pub plan_cache: PlanCache,
}

/// Configuration of the plan cache.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PlanCache {
    /// Number of query shapes whose plans are kept in memory
    /// default: 512
    #[serde(default = "default_plan_cache_limit")]
    pub limit: NonZeroUsize,
}

impl Default for PlanCache {
    fn default() -> Self {
        Self {
            limit: default_plan_cache_limit(),
        }
    }
}

fn default_plan_cache_limit() -> NonZeroUsize {
    NonZeroUsize::MIN.saturating_add(511)
}

impl Configuration {
    /// Parses configuration from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigurationError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Generate a JSON schema for the configuration.
    pub fn json_schema() -> RootSchema {
        let settings = SchemaSettings::draft07().with(|s| {
            s.option_nullable = true;
            s.option_add_null_type = false;
            s.inline_subschemas = true;
        });
        settings.into_generator().into_root_schema_for::<Configuration>()
    }
}

/// Parse configuration from a string in YAML syntax
impl FromStr for Configuration {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Configuration::from_yaml(s)
    }
}
