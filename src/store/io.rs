use std::collections::BTreeMap;
use std::env::current_exe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use directories_next::ProjectDirs;
use std::ffi::OsString;
use std::io::ErrorKind;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use serde_json;
use fd_lock::{RwLock, RwLockWriteGuard};
use log::{info, warn};
use std::fs::OpenOptions;
use std::str;

use crate::error::StoreError;

pub type StoreContent = BTreeMap<String, String>;

// creates a path to geto-stepper.json in the same directory as the executable
// this could be useful for usb sticks
fn get_portable_store_path() -> Option<PathBuf> {
    match current_exe() {
        Ok(mut path) => {
            // F:\geto-stepper.exe => F:\geto-stepper.json
            if !path.set_extension("json") {
                warn!("current exe has no filename: {}", path.to_string_lossy());
                return None
            }

            Some(path)
        },
        Err(err) => {
            warn!("failed to get current exe path: {:?}", err);
            None
        },
    }
}

// creates a path to geto-stepper.json in an os dependent standard directory, such as %AppData% on
// windows.
fn get_local_store_path() -> Option<PathBuf> {
    ProjectDirs::from("id", "geto", "geto-stepper").map(|dirs| {
        dirs.config_dir().join("geto-stepper.json")
    })
}

pub fn get_store_path(explicit: Option<&Path>) -> Result<PathBuf, StoreError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    if let Some(path) = get_portable_store_path() {
        match std::fs::metadata(&path) {
            Ok(attr) => {
                if attr.is_file() {
                    return Ok(path);
                }
            }
            Err(err) => {
                info!("No portable store at {}; Using local path instead. ({})", path.to_string_lossy(), err);
            },
        }
    }

    match get_local_store_path() {
        None => Err(StoreError::NoStorePath),
        Some(path) => Ok(path),
    }
}

pub struct StoreIOLocker {
    rw_lock: RwLock<std::fs::File>,
}

impl StoreIOLocker {
    pub fn lock(&mut self) -> Result<RwLockWriteGuard<std::fs::File>, StoreError> {
        match self.rw_lock.try_write() {
            Ok(guard) => Ok(guard),
            Err(source) => Err(StoreError::CanNotLock { source }),
        }
    }
}

struct StoreIOInner {
    path: PathBuf,
    // the store file itself is replaced on every save, so the lock lives on a sibling file
    lock_file: std::fs::File,
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_else(|| OsString::from("store"));
    name.push(suffix);
    path.with_file_name(name)
}

/// Reads and replaces the whole store file. A save writes the new content to a temporary
/// sibling, syncs it and renames it over the store, so a reader sees either the previous
/// content or the new content.
#[derive(Clone)]
pub struct StoreIO {
    inner: Arc<Mutex<StoreIOInner>>,
}

impl StoreIO {
    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        info!("Using settings store {}", path.to_string_lossy());

        if let Some(directory) = path.parent() {
            std::fs::create_dir_all(directory)?;
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .truncate(false)
            .create(true)
            .open(sibling_path(&path, ".lock"))?;

        let inner = StoreIOInner {
            path,
            lock_file,
        };
        Ok(StoreIO { inner: Arc::new(Mutex::new(inner)) })
    }

    // obtain an exclusive file lock so that this store is used by only one instance of
    // this application.
    pub fn locker(&self) -> Result<StoreIOLocker, StoreError> {
        let inner = self.inner.lock().expect("Failed to lock StoreIO inner");

        Ok(StoreIOLocker {
            rw_lock: RwLock::new(inner.lock_file.try_clone()?),
        })
    }

    pub fn path(&self) -> PathBuf {
        let inner = self.inner.lock().expect("Failed to lock StoreIO inner");
        inner.path.clone()
    }

    pub async fn read(&self) -> Result<StoreContent, StoreError> {
        let content = match fs::read(self.path()).await {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(StoreContent::new()),
            Err(err) => return Err(err.into()),
        };

        let content = str::from_utf8(&content)?;
        if content.trim().is_empty() {
            return Ok(StoreContent::new());
        }

        Ok(serde_json::from_str(content)?)
    }

    pub async fn save(&self, content: &StoreContent) -> Result<(), StoreError> {
        let path = self.path();
        let temp_path = sibling_path(&path, ".tmp");
        let content = serde_json::to_string_pretty(content)?;

        let mut file = File::create(&temp_path).await?;
        file.write_all(content.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_file_reads_as_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let io = StoreIO::open(dir.path().join("store.json")).unwrap();
        assert!(io.read().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_replaces_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let io = StoreIO::open(dir.path().join("nested").join("store.json")).unwrap();

        let mut content = StoreContent::new();
        content.insert("darkMode".to_string(), "false".to_string());
        content.insert("savedProfiles".to_string(), "[\"a long profile name\"]".to_string());
        io.save(&content).await.unwrap();

        content.remove("savedProfiles");
        io.save(&content).await.unwrap();

        let read = io.read().await.unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read.get("darkMode").map(String::as_str), Some("false"));
    }

    #[tokio::test]
    async fn garbage_is_a_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{not json").unwrap();

        let io = StoreIO::open(path).unwrap();
        assert!(matches!(io.read().await, Err(StoreError::JsonError { .. })));
    }

    #[tokio::test]
    async fn interrupted_save_keeps_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let io = StoreIO::open(path.clone()).unwrap();

        let mut content = StoreContent::new();
        content.insert("autoConnect".to_string(), "true".to_string());
        io.save(&content).await.unwrap();

        // a save that died halfway leaves only its temporary file behind
        std::fs::write(sibling_path(&path, ".tmp"), r#"{"autoConnect": "fal"#).unwrap();
        assert_eq!(io.read().await.unwrap(), content);

        content.insert("autoConnect".to_string(), "false".to_string());
        io.save(&content).await.unwrap();
        assert_eq!(io.read().await.unwrap(), content);
        assert!(!sibling_path(&path, ".tmp").exists());
    }

    #[test]
    fn explicit_path_wins() {
        let path = Path::new("/tmp/explicit.json");
        assert_eq!(get_store_path(Some(path)).unwrap(), path.to_path_buf());
    }

    #[test]
    fn second_lock_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let io = StoreIO::open(dir.path().join("store.json")).unwrap();
        let mut first = io.locker().unwrap();
        let _guard = first.lock().unwrap();

        let other = StoreIO::open(dir.path().join("store.json")).unwrap();
        let mut second = other.locker().unwrap();
        assert!(matches!(second.lock(), Err(StoreError::CanNotLock { .. })));
    }

    #[tokio::test]
    async fn lock_holds_across_saves() {
        let dir = tempfile::tempdir().unwrap();
        let io = StoreIO::open(dir.path().join("store.json")).unwrap();
        let mut first = io.locker().unwrap();
        let _guard = first.lock().unwrap();

        io.save(&StoreContent::new()).await.unwrap();

        let other = StoreIO::open(dir.path().join("store.json")).unwrap();
        let mut second = other.locker().unwrap();
        assert!(matches!(second.lock(), Err(StoreError::CanNotLock { .. })));
    }
}
