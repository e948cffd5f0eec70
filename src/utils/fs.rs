use std::fs::{read_dir, remove_dir, remove_file, File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::prelude::AsRawFd;
use std::path::Path;

use log::debug;
use nix::fcntl::{flock, FlockArg};
use nix::unistd::AccessFlags;

pub const PATH_SEPARATOR: char = '/';

/// Join two path fragments with exactly one separator between them
pub fn join(dirname: &str, basename: &str) -> String {
  if dirname.is_empty() {
    return basename.to_string();
  }
  if basename.is_empty() {
    return dirname.to_string();
  }
  let dir_sep = dirname.ends_with(PATH_SEPARATOR);
  let base_sep = basename.starts_with(PATH_SEPARATOR);
  match (dir_sep, base_sep) {
    (true, true) => format!("{}{}", dirname, &basename[1..]),
    (false, false) => format!("{}{}{}", dirname, PATH_SEPARATOR, basename),
    _ => format!("{}{}", dirname, basename),
  }
}

pub fn join3(path1: &str, path2: &str, path3: &str) -> String {
  join(&join(path1, path2), path3)
}

pub fn dirname(path: &str) -> String {
  match path.rfind(PATH_SEPARATOR) {
    Some(pos) => path[..pos].to_string(),
    None => String::new(),
  }
}

pub fn basename(path: &str) -> String {
  match path.rfind(PATH_SEPARATOR) {
    Some(pos) => path[pos + 1..].to_string(),
    None => path.to_string(),
  }
}

/// Extension of the final path component, including the leading dot
pub fn extname(path: &str) -> String {
  let name = basename(path);
  match name.rfind('.') {
    Some(pos) => name[pos..].to_string(),
    None => String::new(),
  }
}

pub fn is_absolute(path: &str) -> bool {
  path.starts_with(PATH_SEPARATOR)
}

pub fn exists(path: &str) -> bool {
  Path::new(path).exists()
}

pub fn is_dir(path: &str) -> bool {
  Path::new(path).is_dir()
}

pub fn is_accessible(path: &str, mode: AccessFlags) -> bool {
  if path.is_empty() {
    return false;
  }
  nix::unistd::access(path, mode).is_ok()
}

pub fn read(path: &str) -> String {
  String::from_utf8_lossy(&read_bytes(path)).into_owned()
}

pub fn read_bytes(path: &str) -> Vec<u8> {
  std::fs::read(path).unwrap_or_default()
}

/// Read at most `len` bytes
pub fn nread(path: &str, len: usize) -> String {
  let mut buf = Vec::new();
  if let Ok(file) = File::open(path) {
    let _ = file.take(len as u64).read_to_end(&mut buf);
  }
  String::from_utf8_lossy(&buf).into_owned()
}

pub fn write(path: &str, content: &[u8]) -> std::io::Result<usize> {
  let mut file = File::create(path)?;
  file.write_all(content)?;
  Ok(content.len())
}

pub fn mkdir_p(path: &str) -> std::io::Result<()> {
  std::fs::create_dir_all(path)
}

/// Create the file if it does not exist, keep content otherwise
pub fn touch(path: &str) -> bool {
  OpenOptions::new().create(true).append(true).open(path).is_ok()
}

pub fn rm_rf(path: &str) -> bool {
  if remove_file(path).is_ok() {
    return true;
  }
  if remove_dir(path).is_ok() {
    return true;
  }
  if let Ok(entries) = read_dir(path) {
    for entry in entries.flatten() {
      let name = entry.file_name();
      let name = name.to_string_lossy();
      if name == "." || name == ".." {
        continue;
      }
      rm_rf(&join(path, &name));
    }
  }
  remove_dir(path).is_ok()
}

/// List directory entries, skipping `.` and `..`, sorted by name
pub fn scandir(path: &str) -> Vec<String> {
  let mut result = vec![];
  if let Ok(entries) = read_dir(path) {
    for entry in entries.flatten() {
      let name = entry.file_name().to_string_lossy().into_owned();
      if name == "." || name == ".." {
        continue;
      }
      result.push(name);
    }
  }
  result.sort();
  result
}

pub fn resolve(path: &str) -> String {
  match std::fs::canonicalize(path) {
    Ok(real) => real.to_string_lossy().into_owned(),
    Err(_) => String::new(),
  }
}

pub fn full_path(path: &str) -> String {
  if is_absolute(path) {
    return path.to_string();
  }
  let cwd = std::env::current_dir().unwrap_or_default();
  join(&cwd.to_string_lossy(), path)
}

/// Search `name` in `PATH`
pub fn which(name: &str) -> String {
  which_mode(name, AccessFlags::R_OK | AccessFlags::X_OK)
}

pub fn which_mode(name: &str, mode: AccessFlags) -> String {
  let path_env = std::env::var("PATH").unwrap_or_default();
  for dir in path_env.split(':') {
    let path = join(dir, name);
    if is_accessible(&path, mode) {
      return path;
    }
  }
  String::new()
}

/// Advisory exclusive whole-file lock, released on drop.
///
/// Failing to open or lock the path is not an error for the caller: the
/// lock simply holds nothing and releases nothing.
pub struct ScopedFileLock {
  file: Option<File>,
}

impl ScopedFileLock {
  pub fn new(path: &str) -> Self {
    let file = match File::open(path) {
      Ok(file) => file,
      Err(_) => return ScopedFileLock { file: None },
    };
    match flock(file.as_raw_fd(), FlockArg::LockExclusive) {
      Ok(_) => ScopedFileLock { file: Some(file) },
      Err(err) => {
        debug!("flock {} fails: {}", path, err);
        ScopedFileLock { file: None }
      }
    }
  }
}

impl Drop for ScopedFileLock {
  fn drop(&mut self) {
    if let Some(file) = self.file.take() {
      let _ = flock(file.as_raw_fd(), FlockArg::Unlock);
    }
  }
}
