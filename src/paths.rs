//! Filesystem locations: config directory, session-relative raster paths,
//! world file sidecar names.

use anyhow::{Context, Result};
use std::path::{Component, Path, PathBuf};

/// Env var overriding the config directory
pub const CONFIG_DIR_ENV: &str = "FREEHAND_CONFIG_DIR";

/// Configuration for overriding default application paths
#[derive(Debug, Clone, Default)]
pub struct PathConfig {
    /// Custom config directory (from CLI or ENV)
    pub config_dir: Option<PathBuf>,
}

impl PathConfig {
    /// Create PathConfig from CLI arguments and environment variables
    ///
    /// Priority: CLI args → ENV var (FREEHAND_CONFIG_DIR) → None (use defaults)
    pub fn from_env_and_cli(cli_dir: Option<PathBuf>) -> Self {
        let config_dir = cli_dir.or_else(|| std::env::var(CONFIG_DIR_ENV).ok().map(PathBuf::from));
        Self { config_dir }
    }
}

/// Get path to a configuration file
///
/// Priority:
/// 1. CLI --config-dir argument
/// 2. FREEHAND_CONFIG_DIR environment variable
/// 3. Platform-specific config directory from dirs-next (default)
///
/// Platform paths:
/// - Linux: ~/.config/freehand/{name}
/// - macOS: ~/Library/Application Support/freehand/{name}
/// - Windows: %APPDATA%\freehand\{name}
pub fn config_file(name: &str, config: &PathConfig) -> PathBuf {
    get_config_dir(config).join(name)
}

/// Create the config directory if it does not exist yet.
pub fn ensure_dirs(config: &PathConfig) -> Result<()> {
    let config_dir = get_config_dir(config);
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create config directory: {}", config_dir.display()))?;
    }
    Ok(())
}

fn get_config_dir(config: &PathConfig) -> PathBuf {
    if let Some(dir) = &config.config_dir {
        return dir.clone();
    }
    if let Some(dir) = dirs_next::config_dir() {
        return dir.join("freehand");
    }
    PathBuf::from(".")
}

// === Session-relative paths ===

/// Express `path` relative to `base_dir` when it lives below it.
///
/// Paths outside `base_dir` (or on another drive) are returned unchanged.
pub fn to_project_relative(path: &Path, base_dir: &Path) -> PathBuf {
    match path.strip_prefix(base_dir) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel.to_path_buf(),
        _ => path.to_path_buf(),
    }
}

/// Resolve a stored path against `base_dir`. Absolute paths pass through.
pub fn resolve_project_path(path: &Path, base_dir: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    let mut out = base_dir.to_path_buf();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

// === World file sidecars ===

/// Sidecar world file for a raster.
///
/// The extension is the first and last letter of the raster extension
/// followed by `w` (`png` → `pgw`, `tif` → `tfw`, `jpeg` → `jgw`).
/// Rasters with a short or missing extension get `wld`.
pub fn world_file_path(raster: &Path) -> PathBuf {
    let ext = raster
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| e.chars().count() >= 2);
    match ext {
        Some(ext) => {
            let mut chars = ext.chars();
            let (Some(first), Some(last)) = (chars.next(), chars.next_back()) else {
                return raster.with_extension("wld");
            };
            raster.with_extension(format!("{}{}w", first, last))
        }
        None => raster.with_extension("wld"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file_with_custom_dir() {
        let config = PathConfig {
            config_dir: Some(PathBuf::from("/custom")),
        };

        let path = config_file("freehand.json", &config);
        assert_eq!(path, PathBuf::from("/custom/freehand.json"));
    }

    #[test]
    fn test_config_file_uses_platform_defaults() {
        let config = PathConfig { config_dir: None };

        let path = config_file("freehand.json", &config);
        assert!(path.to_string_lossy().contains("freehand.json"));
    }

    #[test]
    fn test_cli_dir_wins() {
        let config = PathConfig::from_env_and_cli(Some(PathBuf::from("/from/cli")));
        assert_eq!(config.config_dir, Some(PathBuf::from("/from/cli")));
    }

    #[test]
    fn test_ensure_dirs_creates() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("cfg");
        let config = PathConfig {
            config_dir: Some(dir.clone()),
        };
        ensure_dirs(&config).unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn test_project_relative() {
        let base = Path::new("/work/project");
        assert_eq!(
            to_project_relative(Path::new("/work/project/scans/a.png"), base),
            PathBuf::from("scans/a.png")
        );
        assert_eq!(
            to_project_relative(Path::new("/elsewhere/a.png"), base),
            PathBuf::from("/elsewhere/a.png")
        );
        assert_eq!(
            resolve_project_path(Path::new("scans/a.png"), base),
            PathBuf::from("/work/project/scans/a.png")
        );
        assert_eq!(
            resolve_project_path(Path::new("../shared/./b.tif"), base),
            PathBuf::from("/work/shared/b.tif")
        );
    }

    #[test]
    fn test_world_file_names() {
        assert_eq!(world_file_path(Path::new("a/map.png")), PathBuf::from("a/map.pgw"));
        assert_eq!(world_file_path(Path::new("map.tif")), PathBuf::from("map.tfw"));
        assert_eq!(world_file_path(Path::new("map.jpeg")), PathBuf::from("map.jgw"));
        assert_eq!(world_file_path(Path::new("map")), PathBuf::from("map.wld"));
        assert_eq!(world_file_path(Path::new("map.x")), PathBuf::from("map.wld"));
    }
}
