use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, info};

pub const STUDENTS_KEY: &str = "students";
pub const COURSES_KEY: &str = "courses";
pub const GRADES_KEY: &str = "grades";
pub const CURRENT_USER_KEY: &str = "currentUser";
pub const THEME_KEY: &str = "theme";

/// String-valued key-value persistence, the shape of browser local storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()>;
    fn remove(&mut self, key: &str) -> anyhow::Result<()>;
}

/// One file per key under a data directory. A missing or blank file reads as
/// an absent key.
#[derive(Debug)]
pub struct FileStore {
    pub data_dir: PathBuf,
}

impl FileStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        info!(data_dir = %data_dir.display(), "opened file store");
        Ok(Self { data_dir })
    }

    pub fn path_for(&self, key: &str) -> anyhow::Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(anyhow!("invalid storage key: {key:?}"));
        }
        Ok(self.data_dir.join(format!("{key}.data")))
    }
}

impl KeyValueStore for FileStore {
    #[tracing::instrument(skip(self))]
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            debug!(file = %path.display(), "key file absent");
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed reading {}", path.display()))?;
        if raw.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(raw))
    }

    #[tracing::instrument(skip(self, value), fields(bytes = value.len()))]
    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        write_atomic(&path, value)
    }

    #[tracing::instrument(skip(self))]
    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("failed removing {}", path.display()))?;
        }
        Ok(())
    }
}

/// In-process store; nothing outlives the value.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

pub fn load_json<S, T>(port: &S, key: &str) -> anyhow::Result<Option<T>>
where
    S: KeyValueStore + ?Sized,
    T: DeserializeOwned,
{
    let Some(raw) = port.get(key)? else {
        return Ok(None);
    };
    let value = serde_json::from_str(&raw)
        .with_context(|| format!("failed parsing stored value for key {key}"))?;
    Ok(Some(value))
}

pub fn save_json<S, T>(port: &mut S, key: &str, value: &T) -> anyhow::Result<()>
where
    S: KeyValueStore + ?Sized,
    T: Serialize + ?Sized,
{
    let serialized = serde_json::to_string(value)
        .with_context(|| format!("failed serializing value for key {key}"))?;
    port.set(key, &serialized)
}

#[tracing::instrument(skip(path, contents))]
pub(crate) fn write_atomic(path: &Path, contents: &str) -> anyhow::Result<()> {
    debug!(file = %path.display(), bytes = contents.len(), "writing atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(contents.as_bytes())?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::{FileStore, KeyValueStore, MemoryStore, load_json, save_json};

    #[test]
    fn file_store_reads_back_and_survives_reopen() {
        let temp = tempdir().expect("tempdir");
        let mut store = FileStore::open(temp.path()).expect("open store");
        store.set("theme", "dark").expect("set theme");

        let reopened = FileStore::open(temp.path()).expect("reopen store");
        assert_eq!(reopened.get("theme").expect("get"), Some("dark".to_string()));
        assert!(temp.path().join("theme.data").exists());
    }

    #[test]
    fn missing_and_removed_keys_read_as_none() {
        let temp = tempdir().expect("tempdir");
        let mut store = FileStore::open(temp.path()).expect("open store");
        assert_eq!(store.get("currentUser").expect("get"), None);

        store.set("currentUser", "{}").expect("set");
        store.remove("currentUser").expect("remove");
        assert_eq!(store.get("currentUser").expect("get"), None);
    }

    #[test]
    fn path_like_keys_are_rejected() {
        let temp = tempdir().expect("tempdir");
        let store = FileStore::open(temp.path()).expect("open store");
        assert!(store.path_for("../escape").is_err());
        assert!(store.path_for("").is_err());
    }

    #[test]
    fn json_helpers_round_trip() {
        let mut store = MemoryStore::new();
        save_json(&mut store, "numbers", &vec![3, 1, 2]).expect("save");
        let back: Option<Vec<u32>> = load_json(&store, "numbers").expect("load");
        assert_eq!(back, Some(vec![3, 1, 2]));

        store.set("numbers", "not json").expect("set");
        let err = load_json::<_, Vec<u32>>(&store, "numbers").expect_err("corrupt value");
        assert!(format!("{err:#}").contains("numbers"));
    }
}
