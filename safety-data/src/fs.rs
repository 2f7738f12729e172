//! Filesystem helpers built on `cap-std` and `camino`.
#![forbid(unsafe_code)]

use std::io;
use std::path::Component;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};

/// Ensure the parent directory of a database path exists.
///
/// Absolute paths are resolved from the filesystem root, relative ones from
/// the current directory.
pub(crate) fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() || parent == Utf8Path::new("/") {
        return Ok(());
    }

    let (base_dir, relative) = base_dir_and_relative(parent)?;
    if relative.as_os_str().is_empty() {
        return Ok(());
    }
    base_dir.create_dir_all(&relative)
}

fn base_dir_and_relative(parent: &Utf8Path) -> io::Result<(fs_utf8::Dir, Utf8PathBuf)> {
    let (base, relative) = match parent.as_std_path().components().next() {
        Some(Component::RootDir) => {
            let relative = parent
                .strip_prefix("/")
                .map_err(|_| io::Error::other("failed to strip root from absolute path"))?;
            (Utf8Path::new("/"), relative.to_path_buf())
        }
        Some(Component::Prefix(_)) => {
            return Err(io::Error::other(format!(
                "prefixed paths are not supported: {parent}"
            )));
        }
        _ => (Utf8Path::new("."), parent.to_path_buf()),
    };
    let dir = fs_utf8::Dir::open_ambient_dir(base, ambient_authority())?;
    Ok((dir, relative))
}
