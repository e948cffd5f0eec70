use std::process::{Command, Stdio};
use std::time::Duration;

use log::debug;
use nix::unistd::AccessFlags;

use crate::config::{self, Phase, EXT_MIRRORFS};
use crate::error::CatJudgeError;
use crate::utils::fs::{self, ScopedFileLock};
use crate::utils::{lock, sha1_hex};

/// lrun-mirrorfs chroot path (lrun-mirrorfs --show-root)
pub const CHROOT_BASE_DIR: &str = "/run/lrun/mirrorfs";

/// Materialize the chroot tree for `phase` of `code_path` and return its
/// root. The tree is keyed by the SHA-1 of the mirrorfs config content, so
/// preparation runs once per config revision and is shared host-wide.
///
/// Serialized against both sibling threads ("chroot_lock") and other
/// processes (flock on the mirrorfs config).
pub fn prepare_chroot(
  etc_dir: &str,
  code_path: &str,
  phase: Phase,
) -> Result<String, CatJudgeError> {
  let mirrorfs_config_path = config::get_config_path(
    etc_dir,
    code_path,
    &phase.config_name(EXT_MIRRORFS),
    false,
  );
  if mirrorfs_config_path.is_empty() {
    return Err(CatJudgeError::config("cannot find mirrorfs config"));
  }

  let content = fs::read_bytes(&mirrorfs_config_path);
  let name = sha1_hex(&content);
  let dest = fs::join(CHROOT_BASE_DIR, &name);

  debug!(
    "prepare_chroot: config = {} dest = {}",
    mirrorfs_config_path, dest
  );

  {
    let chroot_lock = lock::named("chroot_lock");
    let _guard = chroot_lock.lock().unwrap();
    let _file_lock = ScopedFileLock::new(&mirrorfs_config_path);

    if fs::is_accessible(&dest, AccessFlags::F_OK) {
      debug!("already mounted: {}", dest);
      return Ok(dest);
    }

    let comment = fs::join(
      &fs::basename(&fs::dirname(&mirrorfs_config_path)),
      phase.as_str(),
    );
    debug!(
      "running: lrun-mirrorfs --name {} --setup {} --comment {}",
      name, mirrorfs_config_path, comment
    );
    let status = Command::new("lrun-mirrorfs")
      .arg("--name")
      .arg(&name)
      .arg("--setup")
      .arg(&mirrorfs_config_path)
      .arg("--comment")
      .arg(&comment)
      .stdout(Stdio::null())
      .stderr(Stdio::inherit())
      .status()
      .map_err(|err| CatJudgeError::exec(format!("failed to run lrun-mirrorfs: {}", err)))?;
    if !status.success() {
      return Err(CatJudgeError::exec(format!(
        "failed to run lrun-mirrorfs --setup {}",
        mirrorfs_config_path
      )));
    }

    // wait 5s until the mount finishes
    let mut mounted = false;
    for _ in 0..50 {
      if fs::is_accessible(&dest, AccessFlags::F_OK) {
        mounted = true;
        break;
      }
      std::thread::sleep(Duration::from_millis(100));
    }
    if !mounted {
      return Err(CatJudgeError::fs(format!(
        "{} is not mounted correctly",
        dest
      )));
    }
  }

  Ok(dest)
}
