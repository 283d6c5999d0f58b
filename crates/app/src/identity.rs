//! Install locations and the persistent node identity

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use ratelimit_core::{PlayerId, ServerSettings};
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Overrides the settings file location
pub const CONFIG_ENV: &str = "RATELIMIT_CONFIG";

const NODE_FILE: &str = "node_id";

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("net", "ratelimit", "ratelimit").ok_or(AppError::NoProjectDirs("home"))
}

/// Where logs, reports and the node id live
pub fn data_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.data_dir().to_path_buf())
}

/// Settings file: `$RATELIMIT_CONFIG`, else `settings.toml` in the config dir
pub fn settings_path() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }
    Ok(project_dirs()?.config_dir().join("settings.toml"))
}

/// Identity presented in the handshake and compared against turn holders.
///
/// A node fixed in settings wins; otherwise a UUID is generated on first
/// run and kept in `data_dir`.
pub fn node_id(server: &ServerSettings, data_dir: &Path) -> Result<PlayerId> {
    if let Some(node) = server.node.as_deref().filter(|n| !n.trim().is_empty()) {
        return Ok(PlayerId::new(node.trim()));
    }

    let path = data_dir.join(NODE_FILE);
    match std::fs::read_to_string(&path) {
        Ok(text) if !text.trim().is_empty() => return Ok(PlayerId::new(text.trim())),
        Ok(_) => tracing::warn!(path = %path.display(), "Empty node id file, regenerating"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    std::fs::create_dir_all(data_dir)?;
    let node = Uuid::new_v4().to_string();
    std::fs::write(&path, &node)?;
    tracing::info!(node = %node, "Generated node id");
    Ok(PlayerId::new(node))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_node_id_is_stable() {
        let temp = TempDir::new().unwrap();
        let data = temp.path().join("data");
        let server = ServerSettings::default();

        let first = node_id(&server, &data).unwrap();
        let second = node_id(&server, &data).unwrap();

        assert_eq!(first, second);
        assert!(Uuid::parse_str(first.as_str()).is_ok());
    }

    #[test]
    fn test_settings_node_wins() {
        let temp = TempDir::new().unwrap();
        let server = ServerSettings {
            node: Some("alice-laptop".to_string()),
            ..ServerSettings::default()
        };

        let id = node_id(&server, temp.path()).unwrap();
        assert_eq!(id.as_str(), "alice-laptop");
        assert!(!temp.path().join(NODE_FILE).exists());
    }

    #[test]
    fn test_blank_file_regenerated() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(NODE_FILE), "  \n").unwrap();

        let id = node_id(&ServerSettings::default(), temp.path()).unwrap();
        assert!(!id.as_str().is_empty());
        assert_eq!(
            std::fs::read_to_string(temp.path().join(NODE_FILE)).unwrap(),
            id.as_str()
        );
    }
}
