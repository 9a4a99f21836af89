use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use kbox_types::{HostEnv, InvocationMode, Tool, ToolSpec, normalize_version};
use serde::Deserialize;
use tracing::debug;

use crate::defaults::{DEFAULT_RUNTIME, default_spec};
use crate::error::ConfigError;

/// Contents of `config.toml`
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub runtime: Option<String>,
    pub mode: Option<InvocationMode>,
    pub tools: BTreeMap<String, ToolOverride>,
}

/// Per-tool table in `config.toml`
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolOverride {
    pub image: Option<String>,
    pub version: Option<String>,
    pub mode: Option<InvocationMode>,
}

impl FileConfig {
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::TomlParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read a config file; a missing file yields `None`
    pub fn read(path: &Path) -> Result<Option<Self>, ConfigError> {
        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content, path).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

/// Overrides from command-line flags
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Run every tool with the host binary
    pub native: bool,
}

/// Resolved settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// Container runtime executable
    pub runtime: String,

    /// Initial spec for every tool
    pub tools: BTreeMap<Tool, ToolSpec>,
}

/// Location of the config file for this host
pub fn config_path(host: &HostEnv) -> PathBuf {
    if let Some(path) = host.var("KBOX_CONFIG") {
        return PathBuf::from(path);
    }
    let config_home = host
        .var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| host.home().join(".config"));
    config_home.join("kbox").join("config.toml")
}

impl Settings {
    /// Built-in defaults only
    pub fn defaults() -> Self {
        Self {
            runtime: DEFAULT_RUNTIME.to_string(),
            tools: Tool::ALL.iter().map(|&t| (t, default_spec(t))).collect(),
        }
    }

    /// Load all layers; `path` overrides the default config file location
    pub fn load(
        host: &HostEnv,
        path: Option<&Path>,
        cli: &CliOverrides,
    ) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| config_path(host));

        let mut settings = Self::defaults();
        if let Some(file) = FileConfig::read(&path)? {
            debug!(path = %path.display(), "loaded config file");
            settings.apply_file(file)?;
        }
        settings.apply_env(host)?;
        settings.apply_cli(cli);

        for spec in settings.tools.values() {
            debug!(
                tool = %spec.tool,
                image = %spec.image_ref(),
                mode = ?spec.mode,
                "resolved tool"
            );
        }
        Ok(settings)
    }

    pub fn spec(&self, tool: Tool) -> &ToolSpec {
        // Every tool is populated by `defaults()`
        &self.tools[&tool]
    }

    fn spec_mut(&mut self, tool: Tool) -> &mut ToolSpec {
        self.tools
            .entry(tool)
            .or_insert_with(|| default_spec(tool))
    }

    fn set_mode_all(&mut self, mode: InvocationMode) {
        for spec in self.tools.values_mut() {
            spec.mode = mode;
        }
    }

    pub fn apply_file(&mut self, file: FileConfig) -> Result<(), ConfigError> {
        if let Some(runtime) = file.runtime {
            self.runtime = runtime;
        }
        if let Some(mode) = file.mode {
            self.set_mode_all(mode);
        }

        for (name, over) in file.tools {
            let tool = name
                .parse::<Tool>()
                .map_err(|e| ConfigError::invalid_value(format!("tools.{}", name), e.to_string()))?;
            let spec = self.spec_mut(tool);
            if let Some(image) = over.image {
                spec.image = image;
            }
            if let Some(version) = over.version {
                spec.version = normalize_version(&version);
            }
            if let Some(mode) = over.mode {
                spec.mode = mode;
            }
        }
        Ok(())
    }

    pub fn apply_env(&mut self, host: &HostEnv) -> Result<(), ConfigError> {
        if let Some(runtime) = host.var("KBOX_RUNTIME") {
            self.runtime = runtime.to_string();
        }
        if let Some(mode) = host.var("KBOX_MODE") {
            let mode = mode
                .parse::<InvocationMode>()
                .map_err(|m| ConfigError::invalid_value("KBOX_MODE", m))?;
            self.set_mode_all(mode);
        }

        for tool in Tool::ALL {
            let image = host.var(&tool.image_var()).map(str::to_string);
            let version = host.var(&tool.version_var()).map(normalize_version);
            let mode = match host.var(&tool.mode_var()) {
                Some(m) => Some(
                    m.parse::<InvocationMode>()
                        .map_err(|msg| ConfigError::invalid_value(tool.mode_var(), msg))?,
                ),
                None => None,
            };

            let spec = self.spec_mut(tool);
            if let Some(image) = image {
                spec.image = image;
            }
            if let Some(version) = version {
                spec.version = version;
            }
            if let Some(mode) = mode {
                spec.mode = mode;
            }
        }
        Ok(())
    }

    pub fn apply_cli(&mut self, cli: &CliOverrides) {
        if cli.native {
            self.set_mode_all(InvocationMode::Native);
        }
    }
}
