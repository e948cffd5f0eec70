use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use log::debug;
use nix::unistd::getpid;

use crate::error::CatJudgeError;
use crate::utils::fs;
use crate::utils::{lock, sha1_hex};

// sub-directory names in the cache dir
pub const SUBDIR_USER_CODE: &str = "code";
pub const SUBDIR_CHECKER: &str = "checker";
pub const SUBDIR_TEMP: &str = "tmp";
pub const SUBDIR_KERNEL_CONFIG_CACHE: &str = "kconfig";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Shared state of one judge invocation: the cache layout, the paths that
/// must be removed on exit, and the per-source workdir memoization.
///
/// Dropping the context is the single cleanup point of the process.
pub struct CatJudgeContext {
  cache_dir: String,
  cleanup_paths: Mutex<Vec<String>>,
  process_tmp_dir: Mutex<Option<String>>,
  work_dirs: Mutex<HashMap<String, String>>,
}

/// Cleanup is skipped entirely when DEBUG or NOCLEANUP is set
pub fn keep_temp_files() -> bool {
  std::env::var_os("DEBUG").is_some() || std::env::var_os("NOCLEANUP").is_some()
}

impl CatJudgeContext {
  pub fn new(cache_dir: &str) -> Self {
    CatJudgeContext {
      cache_dir: cache_dir.to_string(),
      cleanup_paths: Mutex::new(vec![]),
      process_tmp_dir: Mutex::new(None),
      work_dirs: Mutex::new(HashMap::new()),
    }
  }

  pub fn register_cleanup(&self, path: &str) {
    if path.is_empty() {
      return;
    }
    self.cleanup_paths.lock().unwrap().push(path.to_string());
  }

  /// The per-process temp root `<cache>/tmp/<pid>`, created lazily and
  /// removed when the context drops
  pub fn process_tmp_dir(&self) -> Result<String, CatJudgeError> {
    let mut cached = self.process_tmp_dir.lock().unwrap();
    if let Some(dir) = cached.as_ref() {
      return Ok(dir.clone());
    }
    let dir = fs::join3(
      &self.cache_dir,
      SUBDIR_TEMP,
      &format!("{}", getpid().as_raw()),
    );
    fs::mkdir_p(&dir).map_err(|_| CatJudgeError::fs(format!("cannot mkdir: {}", dir)))?;
    self.register_cleanup(&dir);
    *cached = Some(dir.clone());
    Ok(dir)
  }

  /// Content-addressed workdir `<base>/<sha1[:2]>/<sha1[2:]>`, memoized
  /// per (code path, base). Assumes the code file does not change while
  /// the judge runs.
  pub fn work_dir(&self, base_dir: &str, code_path: &str) -> Result<String, CatJudgeError> {
    let key = format!("{}///{}", code_path, base_dir);
    let mut cache = self.work_dirs.lock().unwrap();
    if let Some(dest) = cache.get(&key) {
      return Ok(dest.clone());
    }
    let content = fs::read_bytes(code_path);
    if content.is_empty() && !fs::exists(code_path) {
      return Err(CatJudgeError::fs(format!("cannot read {}", code_path)));
    }
    let code_sha1 = sha1_hex(&content);
    let dest = fs::join3(base_dir, &code_sha1[..2], &code_sha1[2..]);
    cache.insert(key, dest.clone());
    Ok(dest)
  }

  /// Allocate a fresh file under the process temp root. Uniqueness is the
  /// filesystem exists-check under "temp_file_path_lock".
  pub fn temp_file_path(&self, prefix: &str) -> Result<String, CatJudgeError> {
    let lock = lock::named("temp_file_path_lock");
    let _guard = lock.lock().unwrap();
    let tmp_dir = self.process_tmp_dir()?;
    let dest = loop {
      let hash = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
      let name = if prefix.is_empty() {
        format!("{:08x}", hash)
      } else {
        format!("{}-{:08x}", prefix, hash)
      };
      let dest = fs::join(&tmp_dir, &name);
      if !fs::exists(&dest) {
        break dest;
      }
    };
    if !fs::touch(&dest) {
      return Err(CatJudgeError::fs(format!(
        "can not prepare temp file {}",
        dest
      )));
    }
    Ok(dest)
  }
}

impl Drop for CatJudgeContext {
  fn drop(&mut self) {
    if keep_temp_files() {
      debug!("skip cleaning up");
      return;
    }
    let paths = self.cleanup_paths.lock().unwrap();
    for path in paths.iter() {
      if !fs::exists(path) {
        continue;
      }
      debug!("cleaning: rm -rf {}", path);
      fs::rm_rf(path);
    }
  }
}
