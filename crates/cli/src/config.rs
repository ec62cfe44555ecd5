use anyhow::{anyhow, bail, Context, Result};
use provreq_graph::DataFiles;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG: &str = include_str!("../etc/config.toml");

const CONFIG_ID: &str = "provreq";
const CONFIG_NAME: &str = "config.toml";
const CONFIG_ENV: &str = "PROVREQ_CONFIG";

/// Keys accepted in `[default]` and in per-tool tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolSection {
    pub data_dir: Option<PathBuf>,
    pub promise_descriptions: Option<PathBuf>,
    pub conditions: Option<PathBuf>,
    pub agent_promises: Option<PathBuf>,
    pub agent_bundle: Option<PathBuf>,
    pub seeds: Option<Vec<String>>,
    pub system_conditions: Option<Vec<String>>,
    pub end_condition: Option<String>,
    pub nop_promises: Option<Vec<String>>,
}

impl ToolSection {
    /// `self` with every key set in `overlay` replaced.
    pub fn merged(&self, overlay: &ToolSection) -> ToolSection {
        ToolSection {
            data_dir: overlay.data_dir.clone().or_else(|| self.data_dir.clone()),
            promise_descriptions: overlay
                .promise_descriptions
                .clone()
                .or_else(|| self.promise_descriptions.clone()),
            conditions: overlay.conditions.clone().or_else(|| self.conditions.clone()),
            agent_promises: overlay
                .agent_promises
                .clone()
                .or_else(|| self.agent_promises.clone()),
            agent_bundle: overlay.agent_bundle.clone().or_else(|| self.agent_bundle.clone()),
            seeds: overlay.seeds.clone().or_else(|| self.seeds.clone()),
            system_conditions: overlay
                .system_conditions
                .clone()
                .or_else(|| self.system_conditions.clone()),
            end_condition: overlay
                .end_condition
                .clone()
                .or_else(|| self.end_condition.clone()),
            nop_promises: overlay.nop_promises.clone().or_else(|| self.nop_promises.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub default: ToolSection,

    #[serde(flatten)]
    pub tools: BTreeMap<String, ToolSection>,
}

impl ConfigFile {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|err| anyhow!("Config is not valid TOML: {err}"))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Load the first config found: explicit path, `$PROVREQ_CONFIG`, user, system.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::from_file(Path::new(&path));
        }
        for path in [user_config_path(), Some(system_config_path())]
            .into_iter()
            .flatten()
        {
            if path.is_file() {
                log::debug!("Using config {}", path.display());
                return Self::from_file(&path);
            }
        }
        Ok(Self::default())
    }

    /// `[default]` overlaid by the table named `tool`.
    pub fn section(&self, tool: &str) -> ToolSection {
        match self.tools.get(tool) {
            Some(section) => self.default.merged(section),
            None => self.default.clone(),
        }
    }
}

pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_ID).join(CONFIG_NAME))
}

pub fn system_config_path() -> PathBuf {
    Path::new("/etc").join(CONFIG_ID).join(CONFIG_NAME)
}

/// Write the default config to `path`, refusing to overwrite.
pub fn save_config(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("Config already exists: {}", path.display());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Fully resolved settings for one tool invocation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub promise_descriptions: PathBuf,
    pub conditions: PathBuf,
    pub agent_promises: PathBuf,
    pub agent_bundle: Option<PathBuf>,
    pub seeds: Vec<String>,
    pub system_conditions: Vec<String>,
    pub end_condition: String,
    pub nop_promises: Vec<String>,
}

impl Settings {
    /// Fill unset keys of `section` with built-in defaults.
    pub fn from_section(section: ToolSection) -> Self {
        Self {
            data_dir: section.data_dir.unwrap_or_else(|| PathBuf::from(".")),
            promise_descriptions: section
                .promise_descriptions
                .unwrap_or_else(|| PathBuf::from("promise_descriptions.csv")),
            conditions: section
                .conditions
                .unwrap_or_else(|| PathBuf::from("conditions.csv")),
            agent_promises: section
                .agent_promises
                .unwrap_or_else(|| PathBuf::from("agent_promises.json")),
            agent_bundle: section.agent_bundle,
            seeds: section.seeds.unwrap_or_default(),
            system_conditions: section.system_conditions.unwrap_or_default(),
            end_condition: section
                .end_condition
                .unwrap_or_else(|| "objective_exfiltration".to_string()),
            nop_promises: section
                .nop_promises
                .unwrap_or_else(|| vec!["defense_evasion".to_string()]),
        }
    }

    /// `path` joined onto the data directory unless it is absolute.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }

    /// Resolved data file, or an error naming the missing path.
    pub fn existing_file(&self, path: &Path, what: &str) -> Result<PathBuf> {
        let resolved = self.resolve(path);
        if !resolved.is_file() {
            bail!("{what} file does not exist: {}", resolved.display());
        }
        Ok(resolved)
    }

    pub fn data_files(&self) -> Result<DataFiles> {
        Ok(DataFiles {
            agent_promises: self.existing_file(&self.agent_promises, "agent-promises")?,
            promise_descriptions: self
                .existing_file(&self.promise_descriptions, "promise-descriptions")?,
            conditions: self.existing_file(&self.conditions, "conditions")?,
        })
    }

    pub fn bundle_file(&self) -> Result<PathBuf> {
        let bundle = self
            .agent_bundle
            .as_deref()
            .ok_or_else(|| anyhow!("--agent-bundle must be specified"))?;
        self.existing_file(bundle, "agent-bundle")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_config_parses() {
        let config = ConfigFile::parse(DEFAULT_CONFIG).expect("bundled config");
        let settings = Settings::from_section(config.section("generate"));
        assert_eq!(settings.agent_promises, PathBuf::from("agent_promises.json"));
        assert_eq!(settings.nop_promises, vec!["defense_evasion".to_string()]);
    }

    #[test]
    fn tool_section_overrides_default() {
        let config = ConfigFile::parse(
            r#"
            [default]
            data_dir = "/data"
            seeds = ["a"]

            [generate]
            seeds = ["b", "c"]
            "#,
        )
        .unwrap();

        let generate = config.section("generate");
        assert_eq!(generate.data_dir, Some(PathBuf::from("/data")));
        assert_eq!(generate.seeds, Some(vec!["b".to_string(), "c".to_string()]));

        let other = config.section("show-agent");
        assert_eq!(other.seeds, Some(vec!["a".to_string()]));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = ConfigFile::parse("[default]\ndata_directory = \"x\"\n").unwrap_err();
        assert!(err.to_string().contains("data_directory"));
    }

    #[test]
    fn relative_paths_resolve_against_data_dir() {
        let settings = Settings::from_section(ToolSection {
            data_dir: Some(PathBuf::from("/srv/provreq")),
            ..Default::default()
        });
        assert_eq!(
            settings.resolve(Path::new("conditions.csv")),
            PathBuf::from("/srv/provreq/conditions.csv")
        );
        assert_eq!(
            settings.resolve(Path::new("/abs/file.json")),
            PathBuf::from("/abs/file.json")
        );
    }

    #[test]
    fn save_refuses_to_overwrite() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("nested").join(CONFIG_NAME);
        save_config(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), DEFAULT_CONFIG);
        assert!(save_config(&path).is_err());
    }
}
