use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::Config;

/// Where an effective configuration value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Cli,
    Config,
    Programmatic,
    Default,
}

impl ConfigSource {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Cli => "cli",
            Self::Config => "config",
            Self::Programmatic => "programmatic",
            Self::Default => "default",
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn source_label(source: Option<&ConfigSource>) -> String {
    source.copied().unwrap_or(ConfigSource::Default).label().to_string()
}

/// Sections flatten one level: `device.serial`, `templates.win`. Nested
/// values such as template tables or swipes stay inline.
fn flatten(value: &toml::Value, out: &mut Vec<(String, String)>) {
    let toml::Value::Table(root) = value else {
        return;
    };
    for (section, child) in root {
        match child {
            toml::Value::Table(table) => {
                for (key, leaf) in table {
                    out.push((format!("{section}.{key}"), render(leaf)));
                }
            }
            other => out.push((section.clone(), render(other))),
        }
    }
}

fn render(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl Config {
    /// Effective configuration as `dotted.key -> (value, source)`.
    ///
    /// The source is one of `cli`, `config`, `programmatic` or `default`.
    #[must_use]
    pub fn effective_config(&self) -> BTreeMap<String, (String, String)> {
        let mut entries = Vec::new();
        if let Ok(value) = toml::Value::try_from(self) {
            flatten(&value, &mut entries);
        }

        entries
            .into_iter()
            .map(|(key, value)| {
                let source = self
                    .source_attribution
                    .get(&key)
                    .or_else(|| {
                        // Attribution recorded on a parent table covers its children
                        key.rsplit_once('.')
                            .and_then(|(parent, _)| self.source_attribution.get(parent))
                    });
                let label = source_label(source);
                (key, (value, label))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_config_defaults_are_labelled_default() {
        let config = Config::default();
        let effective = config.effective_config();
        let (value, source) = effective.get("campaign.total_stages").unwrap();
        assert_eq!(value, "13");
        assert_eq!(source, "default");
        assert_eq!(effective.get("device.adb_path").unwrap().0, "adb");
    }

    #[test]
    fn test_effective_config_uses_attribution() {
        let mut config = Config::default();
        config.device.serial = Some("127.0.0.1:5555".to_string());
        config
            .source_attribution
            .insert("device.serial".to_string(), ConfigSource::Cli);
        config
            .source_attribution
            .insert("templates".to_string(), ConfigSource::Config);

        let effective = config.effective_config();
        assert_eq!(
            effective.get("device.serial").unwrap(),
            &("127.0.0.1:5555".to_string(), "cli".to_string())
        );
        assert_eq!(effective.get("templates.win").unwrap().1, "config");
    }

    #[test]
    fn test_unset_optionals_are_omitted() {
        let effective = Config::default().effective_config();
        assert!(!effective.contains_key("device.serial"));
    }

    #[test]
    fn test_source_labels_are_stable() {
        assert_eq!(ConfigSource::Cli.to_string(), "cli");
        assert_eq!(ConfigSource::Programmatic.label(), "programmatic");
        assert_eq!(
            serde_json::to_string(&ConfigSource::Config).unwrap(),
            "\"config\""
        );
    }
}
