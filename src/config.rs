use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::util::xdg;
use crate::version::ToolVersion;

/// File name searched for from the start directory up to the repository root.
pub const CONFIG_FILE_NAME: &str = "bootstrap.toml";

/// Bootstrap procedure settings.
///
/// Every field has a default, so an absent file runs the built-in procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BootstrapConfig {
    /// Substring the starting branch name must contain
    pub branch_marker: String,
    /// Branch checked out once setup is done
    pub default_branch: String,
    /// Probe the filesystem and enable the untracked cache when supported
    pub untracked_cache: bool,
    pub requirements: Requirements,
    pub assets: AssetConfig,
    pub prune: PruneConfig,
    /// Local git settings applied in order
    pub settings: Vec<Setting>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Requirements {
    pub git: ToolVersion,
    pub git_lfs: ToolVersion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssetConfig {
    /// Primary pack archive, relative to the repository root
    pub archive: PathBuf,
    /// `git lfs pull --include` pattern selecting every pack archive
    pub include: String,
    /// Extraction target, relative to the repository root; the repository's
    /// own LFS directory (`git rev-parse --git-path lfs`) when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    /// `lfs.concurrenttransfers` hint for the pull
    pub transfer_jobs: u32,
    /// Expected SHA-256 of the primary archive, hex encoded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PruneConfig {
    pub enabled: bool,
}

/// A single `git config --local` key/value pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Setting {
    pub key: String,
    pub value: String,
}

impl Setting {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            branch_marker: "bootstrap".to_string(),
            default_branch: "main".to_string(),
            untracked_cache: true,
            requirements: Requirements::default(),
            assets: AssetConfig::default(),
            prune: PruneConfig::default(),
            settings: default_settings(),
        }
    }
}

impl Default for Requirements {
    fn default() -> Self {
        Self {
            git: ToolVersion::new(2, 16, 0),
            git_lfs: ToolVersion::new(2, 3, 4),
        }
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            archive: PathBuf::from("lfs-pack/lfs-objects.tar.gz"),
            include: "lfs-pack/*".to_string(),
            destination: None,
            transfer_jobs: 8,
            sha256: None,
        }
    }
}

impl Default for PruneConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_settings() -> Vec<Setting> {
    vec![
        Setting::new("core.autocrlf", "false"),
        Setting::new("core.preloadindex", "true"),
        Setting::new("core.fscache", "true"),
        Setting::new("fetch.prune", "true"),
        Setting::new("pull.rebase", "true"),
        Setting::new("rerere.enabled", "true"),
        Setting::new("submodule.fetchJobs", "8"),
        Setting::new("lfs.concurrenttransfers", "8"),
        Setting::new("lfs.setlockablereadonly", "false"),
    ]
}

impl BootstrapConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;

        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file {:?}", path))?;
        Ok(config)
    }

    /// Find and load the configuration for a run starting in `start`.
    ///
    /// Lookup order:
    /// 1. `explicit` (from `--config` or `REPO_BOOTSTRAP_CONFIG`), `~` and `$VARS` expanded
    /// 2. the nearest `bootstrap.toml` between `start` and the repository root
    /// 3. `$XDG_CONFIG_HOME/repo-bootstrap/config.toml`
    /// 4. built-in defaults
    pub fn locate(start: &Path, explicit: Option<&str>) -> Result<(Self, Option<PathBuf>)> {
        if let Some(raw) = explicit {
            let expanded = shellexpand::full(raw)
                .with_context(|| format!("Failed to expand config path '{raw}'"))?;
            let path = PathBuf::from(expanded.as_ref());
            if !path.is_file() {
                bail!("Config file {:?} does not exist", path);
            }
            return Ok((Self::load(&path)?, Some(path)));
        }

        if let Some(path) = find_upwards(start) {
            debug!(path = %path.display(), "using repository config");
            return Ok((Self::load(&path)?, Some(path)));
        }

        let user_config = xdg::config_dir()?.join("config.toml");
        if user_config.is_file() {
            debug!(path = %user_config.display(), "using user config");
            return Ok((Self::load(&user_config)?, Some(user_config)));
        }

        Ok((Self::default(), None))
    }

    pub fn validate(&self) -> Result<()> {
        if self.branch_marker.trim().is_empty() {
            bail!("branch_marker must not be empty");
        }
        if self.default_branch.trim().is_empty() {
            bail!("default_branch must not be empty");
        }
        if self.assets.transfer_jobs == 0 {
            bail!("assets.transfer_jobs must be at least 1");
        }
        if let Some(sha) = &self.assets.sha256 {
            if sha.len() != 64 || !sha.chars().all(|c| c.is_ascii_hexdigit()) {
                bail!("assets.sha256 must be 64 hex characters");
            }
        }
        for setting in &self.settings {
            if !setting.key.contains('.') || setting.key.starts_with('.') || setting.key.ends_with('.') {
                bail!("setting key '{}' must look like section.name", setting.key);
            }
        }
        Ok(())
    }
}

/// Walk from `start` towards the filesystem root, stopping after the
/// directory that holds `.git`.
fn find_upwards(start: &Path) -> Option<PathBuf> {
    for dir in start.ancestors() {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        if dir.join(".git").exists() {
            break;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = BootstrapConfig::default();
        config.validate().unwrap();
        assert_eq!(config.requirements.git.to_string(), "2.16.0");
        assert_eq!(config.requirements.git_lfs.to_string(), "2.3.4");
        assert_eq!(config.branch_marker, "bootstrap");
        assert!(!config.settings.is_empty());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            "default_branch = \"develop\"\n\n[requirements]\ngit = \"2.30.1\"\n",
        )
        .unwrap();

        let config = BootstrapConfig::load(&path).unwrap();
        assert_eq!(config.default_branch, "develop");
        assert_eq!(config.requirements.git, ToolVersion::new(2, 30, 1));
        assert_eq!(config.requirements.git_lfs, ToolVersion::new(2, 3, 4));
        assert_eq!(config.settings, default_settings());
    }

    #[test]
    fn test_destination_only_set_when_configured() {
        assert_eq!(BootstrapConfig::default().assets.destination, None);

        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[assets]\ndestination = \"cache/lfs\"\n").unwrap();

        let config = BootstrapConfig::load(&path).unwrap();
        assert_eq!(config.assets.destination, Some(PathBuf::from("cache/lfs")));
        assert_eq!(config.assets.archive, AssetConfig::default().archive);
    }

    #[test]
    fn test_settings_replace_default_list() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            "[[settings]]\nkey = \"core.longpaths\"\nvalue = \"true\"\n",
        )
        .unwrap();

        let config = BootstrapConfig::load(&path).unwrap();
        assert_eq!(config.settings, vec![Setting::new("core.longpaths", "true")]);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "default_brnach = \"main\"\n").unwrap();
        assert!(BootstrapConfig::load(&path).is_err());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);

        fs::write(&path, "branch_marker = \"\"\n").unwrap();
        assert!(BootstrapConfig::load(&path).is_err());

        fs::write(&path, "[assets]\nsha256 = \"abc\"\n").unwrap();
        assert!(BootstrapConfig::load(&path).is_err());

        fs::write(&path, "[[settings]]\nkey = \"nodot\"\nvalue = \"1\"\n").unwrap();
        assert!(BootstrapConfig::load(&path).is_err());
    }

    #[test]
    #[serial]
    fn test_locate_prefers_nearest_repository_file() {
        let temp = TempDir::new().unwrap();
        let repo = temp.path().join("repo");
        let nested = repo.join("tools/scripts");
        fs::create_dir_all(&nested).unwrap();
        fs::create_dir_all(repo.join(".git")).unwrap();
        fs::write(repo.join(CONFIG_FILE_NAME), "default_branch = \"trunk\"\n").unwrap();
        // Outside the repository; must not be picked up
        fs::write(temp.path().join(CONFIG_FILE_NAME), "default_branch = \"outer\"\n").unwrap();

        std::env::set_var("XDG_CONFIG_HOME", temp.path().join("xdg"));
        let (config, source) = BootstrapConfig::locate(&nested, None).unwrap();
        std::env::remove_var("XDG_CONFIG_HOME");

        assert_eq!(config.default_branch, "trunk");
        assert_eq!(source, Some(repo.join(CONFIG_FILE_NAME)));
    }

    #[test]
    #[serial]
    fn test_locate_falls_back_to_user_config_then_defaults() {
        let temp = TempDir::new().unwrap();
        let repo = temp.path().join("repo");
        fs::create_dir_all(repo.join(".git")).unwrap();
        let xdg_home = temp.path().join("xdg");

        std::env::set_var("XDG_CONFIG_HOME", &xdg_home);
        let (config, source) = BootstrapConfig::locate(&repo, None).unwrap();
        assert_eq!(config, BootstrapConfig::default());
        assert_eq!(source, None);

        let user_file = xdg_home.join("repo-bootstrap/config.toml");
        fs::create_dir_all(user_file.parent().unwrap()).unwrap();
        fs::write(&user_file, "branch_marker = \"setup\"\n").unwrap();
        let (config, source) = BootstrapConfig::locate(&repo, None).unwrap();
        std::env::remove_var("XDG_CONFIG_HOME");

        assert_eq!(config.branch_marker, "setup");
        assert_eq!(source, Some(user_file));
    }

    #[test]
    #[serial]
    fn test_locate_explicit_path_expands_variables() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("custom.toml");
        fs::write(&path, "default_branch = \"release\"\n").unwrap();

        std::env::set_var("REPO_BOOTSTRAP_TEST_DIR", temp.path());
        let (config, source) =
            BootstrapConfig::locate(temp.path(), Some("$REPO_BOOTSTRAP_TEST_DIR/custom.toml"))
                .unwrap();
        std::env::remove_var("REPO_BOOTSTRAP_TEST_DIR");

        assert_eq!(config.default_branch, "release");
        assert_eq!(source, Some(path));

        assert!(BootstrapConfig::locate(temp.path(), Some("/nonexistent/bootstrap.toml")).is_err());
    }
}
