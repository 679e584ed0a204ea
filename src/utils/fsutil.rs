use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Open a file for read/write, creating it but never truncating existing content.
///
/// # Errors
/// Returns an error if the file cannot be opened.
pub fn open_rw_no_trunc(path: &Path) -> io::Result<File> {
    OpenOptions::new().read(true).write(true).create(true).truncate(false).open(path)
}

/// Write `bytes` durably to `path` by writing a sibling temp file, fsyncing it, then
/// renaming it over the destination and fsyncing the containing directory.
///
/// This is the single reusable commit primitive every persistence path (root, manifest,
/// page, iteration, snapshot pointer) funnels through; a half-written file can never be
/// observed at `path` because the rename is atomic on the same filesystem.
///
/// # Errors
/// Returns an error if any write, sync, or rename step fails.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;
    let tmp_path = tmp_sibling(path);
    {
        let mut tmp = OpenOptions::new().write(true).create(true).truncate(true).open(&tmp_path)?;
        use std::io::Write;
        tmp.write_all(bytes)?;
        tmp.sync_data()?;
    }
    atomic_rename(&tmp_path, path)?;
    sync_dir(parent)
}

/// Rename `from` to `to`, replacing any existing file at `to`.
///
/// # Errors
/// Returns an error if the rename fails.
pub fn atomic_rename(from: &Path, to: &Path) -> io::Result<()> {
    fs::rename(from, to)
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("tmp");
    path.with_file_name(format!(".{file_name}.tmp"))
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
