// Locked, atomic file persistence shared by the ledger, event cache and config.
//
// Every persisted file is rewritten whole: the new contents go to a sibling
// `.tmp` file which is flushed to disk and then renamed over the target.
// Readers therefore only ever observe the old file or the new one.
//
// Overlapping processes serialise their read-modify-write cycles through an
// advisory lock held on a sibling `.lock` file.
use fs2::FileExt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub struct LocalStorage;

impl LocalStorage {
    fn get_lock_path(file_path: &Path) -> PathBuf {
        let mut name = file_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        file_path.with_file_name(name)
    }

    /// Runs `f` while holding an exclusive advisory lock for `file_path`.
    ///
    /// The lock is released when the lock file handle is dropped, even if `f`
    /// returns an error.
    pub fn with_lock<F, T, E>(file_path: &Path, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<io::Error>,
    {
        if let Some(parent) = file_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
        }
        let lock_path = Self::get_lock_path(file_path);
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        file.lock_exclusive()?;
        let result = f();
        file.unlock()?;
        result
    }

    /// Atomic write: Write to .tmp file, sync, then rename
    pub fn atomic_write<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, contents: C) -> io::Result<()> {
        let path = path.as_ref();
        let tmp_path = path.with_extension("tmp");
        {
            let mut tmp = fs::File::create(&tmp_path)?;
            tmp.write_all(contents.as_ref())?;
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Reads `path` to a string, mapping a missing file to `None`.
    pub fn read_optional(path: &Path) -> io::Result<Option<String>> {
        match fs::read_to_string(path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}
