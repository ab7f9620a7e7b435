use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{Error, Result};

#[derive(Clone, Copy, Debug, Default)]
pub struct AtomicWriteOptions {
    pub sync: bool,
}

impl AtomicWriteOptions {
    pub fn new() -> Self { Self::default() }

    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }
}

fn temp_sibling(target: &Path) -> Result<PathBuf> {
    let parent = target.parent().ok_or_else(|| Error::NoParent(target.to_path_buf()))?;
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    Ok(parent.join(format!(".tmp.{}.{nanos}.fileshare", std::process::id())))
}

/// Replace `path` with `content` so readers never observe a partial file.
pub fn atomic_write(path: impl AsRef<Path>, content: &[u8], options: AtomicWriteOptions) -> Result<()> {
    let path = path.as_ref();
    let tmp_path = temp_sibling(path)?;

    let write = || -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(content)?;
        if options.sync {
            file.sync_all()?;
        }
        Ok(())
    };
    write().map_err(|source| {
        let _ = fs::remove_file(&tmp_path);
        Error::Write { path: tmp_path.clone(), source }
    })?;

    fs::rename(&tmp_path, path).map_err(|source| {
        let _ = fs::remove_file(&tmp_path);
        Error::Write { path: path.to_path_buf(), source }
    })
}

/// Move `src` to `dest`, copying when a rename would cross devices.
///
/// The copy goes to a temporary sibling of `dest` first and is renamed into
/// place, so `dest` is either absent or complete.
pub fn move_file(src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<()> {
    let src = src.as_ref();
    let dest = dest.as_ref();

    match fs::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(18) || e.kind() == std::io::ErrorKind::CrossesDevices => {
            tracing::debug!(from = %src.display(), to = %dest.display(), "cross-device move, copying");
            let tmp_path = temp_sibling(dest)?;
            fs::copy(src, &tmp_path)
                .and_then(|_| fs::rename(&tmp_path, dest))
                .map_err(|source| {
                    let _ = fs::remove_file(&tmp_path);
                    Error::Move { from: src.to_path_buf(), to: dest.to_path_buf(), source }
                })?;
            fs::remove_file(src).map_err(|source| Error::Write { path: src.to_path_buf(), source })
        }
        Err(source) => Err(Error::Move { from: src.to_path_buf(), to: dest.to_path_buf(), source }),
    }
}

/// Persist `content` as a new uniquely named file in `dir`.
///
/// The file survives this call; the caller owns its removal.
pub fn persist_temp(dir: &Path, prefix: &str, suffix: &str, content: &[u8]) -> Result<PathBuf> {
    let mut file = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(suffix)
        .tempfile_in(dir)
        .map_err(|source| Error::Write { path: dir.to_path_buf(), source })?;
    file.write_all(content)
        .map_err(|source| Error::Write { path: file.path().to_path_buf(), source })?;
    let (_, path) = file.keep().map_err(|e| Error::Write { path: dir.to_path_buf(), source: e.error })?;
    Ok(path)
}

/// Set the modification time of an existing file.
pub fn set_modified(path: impl AsRef<Path>, time: SystemTime) -> Result<()> {
    let path = path.as_ref();
    fs::OpenOptions::new()
        .write(true)
        .open(path)
        .and_then(|file| file.set_modified(time))
        .map_err(|source| Error::Write { path: path.to_path_buf(), source })
}
