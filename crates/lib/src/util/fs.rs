//! Timestamp-driven file helpers for target bodies.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;

/// Modification time of `path`, or `None` when it does not exist.
pub fn modified(path: &Path) -> io::Result<Option<SystemTime>> {
  match fs::metadata(path) {
    Ok(meta) => meta.modified().map(Some),
    Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
    Err(err) => Err(err),
  }
}

/// The most recently modified of `paths`, ignoring paths that do not exist.
pub fn newest_modification<I, P>(paths: I) -> io::Result<Option<(PathBuf, SystemTime)>>
where
  I: IntoIterator<Item = P>,
  P: AsRef<Path>,
{
  let mut newest: Option<(PathBuf, SystemTime)> = None;
  for path in paths {
    let path = path.as_ref();
    let Some(time) = modified(path)? else {
      continue;
    };
    if newest.as_ref().is_none_or(|(_, best)| time > *best) {
      newest = Some((path.to_path_buf(), time));
    }
  }
  Ok(newest)
}

/// True when `artifact` is missing or not strictly newer than every existing source.
///
/// An empty source set never makes an existing artifact out of date.
pub fn is_out_of_date<I, P>(artifact: &Path, sources: I) -> io::Result<bool>
where
  I: IntoIterator<Item = P>,
  P: AsRef<Path>,
{
  let Some(built) = modified(artifact)? else {
    return Ok(true);
  };
  Ok(match newest_modification(sources)? {
    Some((_, newest)) => built <= newest,
    None => false,
  })
}

fn ensure_parent(path: &Path) -> io::Result<()> {
  match path.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
    _ => Ok(()),
  }
}

/// Copy `src` to `dst` unless `dst` is already newer. Returns whether a copy happened.
pub fn copy_if_newer(src: &Path, dst: &Path) -> io::Result<bool> {
  let source_time = modified(src)?.ok_or_else(|| {
    io::Error::new(
      io::ErrorKind::NotFound,
      format!("source file not found: {}", src.display()),
    )
  })?;
  if let Some(dest_time) = modified(dst)?
    && dest_time >= source_time
  {
    debug!(src = %src.display(), dst = %dst.display(), "destination is up to date");
    return Ok(false);
  }

  ensure_parent(dst)?;
  fs::copy(src, dst)?;
  debug!(src = %src.display(), dst = %dst.display(), "copied");
  Ok(true)
}

/// Hard-link `src` at `dst`, replacing any existing file; copy when linking is not possible.
///
/// A `dst` that resolves to `src` itself is left alone.
pub fn hard_link_or_copy(src: &Path, dst: &Path) -> io::Result<()> {
  let source = fs::canonicalize(src)?;
  if fs::canonicalize(dst).is_ok_and(|dest| dest == source) {
    debug!(src = %src.display(), dst = %dst.display(), "source and destination are the same file");
    return Ok(());
  }

  ensure_parent(dst)?;
  match fs::remove_file(dst) {
    Ok(()) => {}
    Err(err) if err.kind() == io::ErrorKind::NotFound => {}
    Err(err) => return Err(err),
  }

  if let Err(err) = fs::hard_link(src, dst) {
    debug!(src = %src.display(), dst = %dst.display(), error = %err, "hard link failed, copying");
    fs::copy(src, dst)?;
  }
  Ok(())
}
