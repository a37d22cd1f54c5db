use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use edge_api::Payload;

use crate::error::PersistError;

pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Mode of the persisted file. Other agents on the node read it.
#[cfg(unix)]
const CONFIG_FILE_MODE: u32 = 0o644;

/// Persisted application config: `<config_dir>/<app_key>/config.yaml`.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(config_dir: impl AsRef<Path>, app_key: &str) -> Self {
        Self { path: config_dir.as_ref().join(app_key).join(CONFIG_FILE_NAME) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Replace the config file atomically.
    ///
    /// The new content goes to a temp file in the same directory and is then
    /// renamed over the target. Readers see the old file or the new one,
    /// never a partial write.
    pub fn save(&self, config: &Payload) -> Result<(), PersistError> {
        self.stage(config)?.commit()
    }

    /// Write `config` to a temp file next to the target without touching it.
    pub(crate) fn stage(&self, config: &Payload) -> Result<StagedConfig<'_>, PersistError> {
        let dir = self.dir();
        fs::create_dir_all(dir)
            .map_err(|source| PersistError::CreateDir { path: dir.to_path_buf(), source })?;

        let yaml = serde_yaml::to_string(config).map_err(PersistError::Encode)?;

        let write_err = |source| PersistError::Write { path: self.path.clone(), source };
        let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(yaml.as_bytes()).map_err(write_err)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(fs::Permissions::from_mode(CONFIG_FILE_MODE))
                .map_err(write_err)?;
        }
        tmp.as_file().sync_all().map_err(write_err)?;

        Ok(StagedConfig { store: self, tmp })
    }

    /// Read the persisted config. A missing or empty file is an empty map.
    pub fn load(&self) -> Result<Payload, PersistError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Payload::new()),
            Err(source) => return Err(PersistError::Read { path: self.path.clone(), source }),
        };
        if content.trim().is_empty() {
            return Ok(Payload::new());
        }
        serde_yaml::from_str(&content)
            .map_err(|source| PersistError::Decode { path: self.path.clone(), source })
    }
}

/// A fully written temp file waiting to replace the config.
/// Dropping it without [`commit`](Self::commit) removes the temp file.
pub(crate) struct StagedConfig<'a> {
    store: &'a ConfigStore,
    tmp: NamedTempFile,
}

impl StagedConfig<'_> {
    pub fn commit(self) -> Result<(), PersistError> {
        let path = &self.store.path;
        self.tmp
            .persist(path)
            .map_err(|e| PersistError::Rename { path: path.clone(), source: e.error })?;
        tracing::debug!(path = %path.display(), "config persisted");
        Ok(())
    }
}
