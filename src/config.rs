//! Settings consumed by the collector.

use std::collections::BTreeMap;

use regex::Regex;
use serde::Deserialize;
use tracing::warn;

use crate::collect::selector::Selection;
use crate::collect::Error;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// Identifies the cluster in every emitted batch.
    pub cluster_name: String,

    /// Collect every consumer group whose ID matches.
    #[serde(default)]
    pub consumer_group_regex: Option<String>,

    /// Collect these consumer groups for these topics.
    ///
    /// Deprecated in favor of `consumer_group_regex`.
    #[serde(default)]
    pub consumer_groups: Option<BTreeMap<String, Vec<String>>>,
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, Error> {
        toml::from_str(s).map_err(|err| Error::Configuration(format!("invalid config: {err}")))
    }

    /// Resolves which consumer groups to collect.
    ///
    /// The regex wins if both are configured. An empty `consumer_groups` mapping counts as not configured.
    pub fn selection(&self) -> Result<Selection, Error> {
        let static_groups = self
            .consumer_groups
            .as_ref()
            .filter(|groups| !groups.is_empty());

        if let Some(pattern) = &self.consumer_group_regex {
            if static_groups.is_some() {
                warn!("Both 'consumer_group_regex' and 'consumer_groups' are set, ignoring 'consumer_groups'");
            }

            let regex = Regex::new(pattern).map_err(|err| {
                Error::Configuration(format!("invalid consumer_group_regex {pattern:?}: {err}"))
            })?;

            return Ok(Selection::Regex(regex));
        }

        match static_groups {
            Some(groups) => Ok(Selection::Static(groups.clone())),
            None => Err(Error::Configuration(
                "either consumer_group_regex or consumer_groups (deprecated) must be set".to_string(),
            )),
        }
    }
}
