use std::process::{Command, Stdio};
use std::sync::Once;
use std::time::Duration;

use log::{debug, info, warn};
use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, FdFlag, OFlag};
use nix::libc;
use nix::sys::stat::Mode;
use nix::sys::utsname::uname;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{close, dup2, execvp, fork, getgid, getuid, AccessFlags, ForkResult, Pid};
use std::os::unix::prelude::RawFd;

use crate::config::{self, Phase, EXT_FS_OVERRIDE, EXT_OPT_FAKE_PASSWD};
use crate::context::SUBDIR_KERNEL_CONFIG_CACHE;
use crate::error::CatJudgeError;
use crate::options::Limit;
use crate::utils::fs::{self, ScopedFileLock};
use crate::utils::{into_c_string, lock, CatJudgePipe};

const ETC_PASSWD: &str = "/etc/passwd";
const EMPTY_NETNS_PATH: &str = "/var/run/netns/lrun-empty";
const NETNS_ATTEMPT_MARKER: &str = "/dev/shm/catjudge-netns-attempted";

/// lrun writes its telemetry on this fd
const LRUN_FILENO: RawFd = 3;

/// Placeholder mappings applied to user-origin tokens:
/// `$src`, `$exe`, `$dir` and (run phase only) `$chroot`
pub type Mappings = Vec<(String, String)>;

pub fn get_mappings(src_name: &str, exe_name: &str, work_dir: &str) -> Mappings {
  vec![
    ("$src".to_string(), src_name.to_string()),
    ("$exe".to_string(), exe_name.to_string()),
    ("$dir".to_string(), work_dir.to_string()),
  ]
}

pub fn substitute(items: &[String], mappings: &Mappings) -> Vec<String> {
  items
    .iter()
    .map(|item| {
      let mut item = item.clone();
      for (key, value) in mappings.iter() {
        item = item.replace(key, value);
      }
      item
    })
    .collect()
}

/// The argument vector handed to lrun, assembled in a fixed order
#[derive(Debug, Clone, Default)]
pub struct LrunArgs(Vec<String>);

impl LrunArgs {
  pub fn new() -> Self {
    LrunArgs(vec![])
  }

  pub fn append<S: Into<String>>(&mut self, arg: S) {
    self.0.push(arg.into());
  }

  pub fn append2<S1: Into<String>, S2: Into<String>>(&mut self, arg1: S1, arg2: S2) {
    self.0.push(arg1.into());
    self.0.push(arg2.into());
  }

  pub fn append3<S1: Into<String>, S2: Into<String>, S3: Into<String>>(
    &mut self,
    arg1: S1,
    arg2: S2,
    arg3: S3,
  ) {
    self.0.push(arg1.into());
    self.0.push(arg2.into());
    self.0.push(arg3.into());
  }

  pub fn append_list(&mut self, args: &[String]) {
    self.0.extend(args.iter().cloned());
  }

  /// Skip every component that is not positive: it means unbounded
  pub fn append_limit(&mut self, limit: &Limit) {
    if limit.real_time > 0.0 {
      self.append2("--max-real-time", format!("{}", limit.real_time));
    }
    if limit.cpu_time > 0.0 {
      self.append2("--max-cpu-time", format!("{}", limit.cpu_time));
    }
    if limit.memory > 0 {
      self.append2("--max-memory", format!("{}", limit.memory));
    }
    if limit.output > 0 {
      self.append2("--max-output", format!("{}", limit.output));
    }
    if limit.stack > 0 {
      self.append2("--max-stack", format!("{}", limit.stack));
    }
  }

  pub fn append_default(&mut self) {
    self.append2("--reset-env", "true");
    self.append2("--basic-devices", "true");
    self.append2("--remount-dev", "true");
    if maybe_create_empty_netns() {
      self.append2("--netns", "lrun-empty");
    } else {
      self.append2("--network", "false");
    }
    self.append2("--chdir", "/tmp");
    self.append3("--env", "ONLINE_JUDGE", "1");
    self.append3("--env", "LANG", "en_US.UTF-8");
    self.append3("--env", "LC_ALL", "en_US.UTF-8");
    self.append3("--env", "HOME", "/tmp");
    self.append3(
      "--env",
      "PATH",
      "/usr/bin:/bin:/etc/alternatives:/usr/local/bin",
    );
    // pass as-is
    for name in ["JAVA_HOME", "R_HOME"] {
      if let Ok(value) = std::env::var(name) {
        self.append3("--env", name, value);
      }
    }
  }

  pub fn as_slice(&self) -> &[String] {
    &self.0
  }
}

fn has_empty_netns() -> bool {
  fs::exists(EMPTY_NETNS_PATH)
}

/// The marker records that creation was attempted, not that it worked:
/// when the netns is still missing later runs fall back to --network false
fn maybe_create_empty_netns() -> bool {
  if has_empty_netns() {
    return true;
  }
  if !fs::exists(NETNS_ATTEMPT_MARKER) {
    debug!("running 'lrun-netns-empty create' to create empty netns");
    let _ = Command::new("lrun-netns-empty")
      .arg("create")
      .stdout(Stdio::null())
      .stderr(Stdio::null())
      .status();
    fs::touch(NETNS_ATTEMPT_MARKER);
    has_empty_netns()
  } else {
    debug!("lrun-empty netns does not exist");
    false
  }
}

fn uname_release() -> String {
  match uname() {
    Ok(name) => name.release().to_string_lossy().into_owned(),
    Err(_) => String::new(),
  }
}

/// Whether the kernel supports lrun --fopen-filter. The probe result is
/// cached under `<cache>/kconfig/` where the user can override it.
fn is_fopen_filter_supported(cache_dir: &str) -> bool {
  let cached_result_path = fs::join3(
    cache_dir,
    SUBDIR_KERNEL_CONFIG_CACHE,
    "CONFIG_FANOTIFY_ACCESS_PERMISSIONS",
  );
  if fs::is_accessible(&cached_result_path, AccessFlags::R_OK) {
    return fs::read(&cached_result_path).starts_with('y');
  }

  // most distros enable it: Arch, Ubuntu, Fedora ... except for Debian
  let mut result = true;
  let kconfig_path = format!("/boot/config-{}", uname_release());
  if fs::is_accessible(&kconfig_path, AccessFlags::R_OK)
    && !fs::read(&kconfig_path).contains("CONFIG_FANOTIFY_ACCESS_PERMISSIONS=y")
  {
    result = false;
  }
  let _ = fs::mkdir_p(&fs::dirname(&cached_result_path));
  let _ = fs::write(&cached_result_path, if result { b"y" } else { b"n" });
  result
}

/// Keep only known-safe lrun args from user-origin config tokens.
///
/// A whitelisted flag passes together with its bounded number of value
/// tokens; the first token outside a whitelisted run drops itself and
/// everything after it.
pub fn filter_user_args(items: Vec<String>, cache_dir: &str) -> Vec<String> {
  static FOPEN_FILTER_WARNING: Once = Once::new();

  let mut result = vec![];
  let mut next_safe = 0;
  let mut next_ignored = 0;
  for item in items {
    if next_safe > 0 {
      if next_ignored == 0 {
        result.push(item);
      } else {
        next_ignored -= 1;
      }
      next_safe -= 1;
      continue;
    }
    match item.as_str() {
      "--syscalls" | "--domainname" | "--hostname" | "--ostype" | "--osrelease"
      | "--osversion" => {
        next_safe = 1;
      }
      "--fopen-filter" => {
        next_safe = 2;
        if !is_fopen_filter_supported(cache_dir) {
          next_ignored = next_safe;
          FOPEN_FILTER_WARNING.call_once(|| {
            warn!(
              "Your system does not support --fopen-filter. The kernel must be compiled with {}",
              "CONFIG_FANOTIFY_ACCESS_PERMISSIONS"
            );
          });
          continue;
        }
      }
      // tmpfs may be unsafe, we only use it in the R lang config
      "--tmpfs" | "--env" => {
        next_safe = 2;
      }
      _ => {
        info!("lrun arg '{}' is unsafe, dropping it and following args", item);
        break;
      }
    }
    result.push(item);
  }
  result
}

/// Hide the real /etc/passwd with a single-user one owned by the current
/// uid (some interpreters insist on resolving their own user)
fn prepare_dummy_passwd(cache_dir: &str) -> Result<String, CatJudgeError> {
  let passwd_lock = lock::named("dummy_passwd_lock");
  let _guard = passwd_lock.lock().unwrap();

  let path = fs::join(
    cache_dir,
    &format!("tmp/etc/passwd-{}", getuid().as_raw()),
  );
  let content = format!(
    "nobody:{}:{}::/tmp:/bin/false\n",
    getuid().as_raw(),
    getgid().as_raw()
  );
  if !fs::exists(&path) || fs::read(&path) != content {
    fs::mkdir_p(&fs::dirname(&path))
      .map_err(|_| CatJudgeError::fs(format!("cannot mkdir: {}", fs::dirname(&path))))?;
    fs::touch(&path);
    let _lock = ScopedFileLock::new(&path);
    fs::write(&path, content.as_bytes())?;
  }
  Ok(path)
}

/// Bind-mount overrides: the dummy passwd (configurable per phase, default
/// on) and every file in the resolved `<phase>.fs_override` directory,
/// whose names map `a__b__c` to `/a/b/c` inside the chroot
pub fn get_override_args(
  etc_dir: &str,
  cache_dir: &str,
  code_path: &str,
  phase: Phase,
  chroot_path: &str,
) -> Result<Vec<String>, CatJudgeError> {
  let mut result = vec![];

  if fs::exists(&fs::join(chroot_path, ETC_PASSWD))
    && config::get_config_option(etc_dir, code_path, &phase.config_name(EXT_OPT_FAKE_PASSWD))
  {
    let passwd_path = prepare_dummy_passwd(cache_dir)?;
    result.push("--bindfs-ro".to_string());
    result.push(fs::join(chroot_path, ETC_PASSWD));
    result.push(passwd_path);
  }

  let override_dir =
    config::get_config_path(etc_dir, code_path, &phase.config_name(EXT_FS_OVERRIDE), false);
  if override_dir.is_empty() {
    return Ok(result);
  }

  for name in fs::scandir(&override_dir) {
    let path = name.replace("__", "/");
    if fs::is_accessible(&fs::join(chroot_path, &path), AccessFlags::R_OK) {
      result.push("--bindfs-ro".to_string());
      result.push(fs::join(chroot_path, &path));
      result.push(fs::join(&override_dir, &name));
    }
  }
  Ok(result)
}

/// What lrun reported about one sandboxed run
#[derive(Debug, Clone, Default)]
pub struct LrunResult {
  /// empty on success
  pub error: String,
  /// bytes
  pub memory: i64,
  /// seconds
  pub cpu_time: f64,
  /// seconds
  pub real_time: f64,
  pub signaled: bool,
  pub exit_code: i32,
  pub term_sig: i32,
  /// empty | CPU_TIME | REAL_TIME | MEMORY | OUTPUT
  pub exceed: String,
}

/// Parse the line-oriented fd-3 telemetry. Keys are the leading word, the
/// value starts at byte offset 9 (lrun pads the field to a fixed width).
pub fn parse_lrun_output(output: &str) -> LrunResult {
  let mut result = LrunResult::default();
  for line in output.lines() {
    if line.is_empty() {
      continue;
    }
    let key = line.split(' ').next().unwrap_or("");
    let value = line.get(9..).unwrap_or("");
    match key {
      "MEMORY" => match value.trim().parse::<i64>() {
        Ok(memory) => result.memory = memory,
        Err(_) => result.error = "cannot read MEMORY".to_string(),
      },
      "CPUTIME" => match value.trim().parse::<f64>() {
        Ok(time) => result.cpu_time = time,
        Err(_) => result.error = "cannot read CPUTIME".to_string(),
      },
      "REALTIME" => match value.trim().parse::<f64>() {
        Ok(time) => result.real_time = time,
        Err(_) => result.error = "cannot read REALTIME".to_string(),
      },
      "SIGNALED" => match value {
        "0" => result.signaled = false,
        "1" => result.signaled = true,
        _ => result.error = "cannot read SIGNALED".to_string(),
      },
      "EXITCODE" => match value.trim().parse::<i32>() {
        Ok(code) => result.exit_code = code,
        Err(_) => result.error = "cannot read EXITCODE".to_string(),
      },
      "TERMSIG" => match value.trim().parse::<i32>() {
        Ok(sig) => result.term_sig = sig,
        Err(_) => result.error = "cannot read TERMSIG".to_string(),
      },
      "EXCEED" => {
        if value != "none" {
          result.exceed = value.to_string();
        }
      }
      _ => {}
    }
  }
  result
}

fn setfd(dst: RawFd, src: RawFd) {
  if src == dst {
    // keep the fd across exec
    let _ = fcntl(dst, FcntlArg::F_SETFD(FdFlag::empty()));
    return;
  }
  if src < 0 {
    return;
  }
  let _ = dup2(src, dst);
  let _ = close(src);
}

fn wait_lrun(child: Pid) -> Option<WaitStatus> {
  loop {
    match waitpid(child, Some(WaitPidFlag::WNOHANG)) {
      Ok(WaitStatus::StillAlive) => std::thread::sleep(Duration::from_millis(10)),
      Ok(status @ WaitStatus::Exited(_, _)) => return Some(status),
      Ok(status @ WaitStatus::Signaled(_, _, _)) => return Some(status),
      Ok(_) => std::thread::sleep(Duration::from_millis(10)),
      Err(Errno::EINTR) => continue,
      Err(_) => return None,
    }
  }
}

fn contains_exceed_line(output: &[u8]) -> bool {
  output.windows(8).any(|window| window == b"EXCEED  ")
}

/// Fork and exec lrun with stdio redirected to the given paths and the
/// telemetry pipe on fd 3.
///
/// The parent returns as soon as the terminal EXCEED line arrives and does
/// not wait for lrun: tearing down the pid and ipc namespaces takes tens
/// of milliseconds per run, lrun ignores SIGPIPE, and the orphan is reaped
/// by init when this process exits shortly after the last testcase.
pub fn lrun(
  args: &LrunArgs,
  stdin_path: &str,
  stdout_path: &str,
  stderr_path: &str,
) -> Result<LrunResult, CatJudgeError> {
  let mut result = LrunResult::default();
  let pipe = CatJudgePipe::new()?;

  debug!(
    "running: lrun {} <{} >{} 2>{}",
    crate::utils::shell_escape_list(args.as_slice()),
    stdin_path,
    stdout_path,
    stderr_path
  );

  match unsafe { fork() } {
    Ok(ForkResult::Parent { child, .. }) => {
      let pipe = pipe.read()?;

      let mut output: Vec<u8> = vec![];
      loop {
        match pipe.read_byte() {
          Some(byte) => {
            output.push(byte);
            if byte == b'\n' && contains_exceed_line(&output) {
              // EXCEED ... "\n" is the last telemetry line
              result = parse_lrun_output(&String::from_utf8_lossy(&output));
              break;
            }
          }
          None => {
            // EOF before the terminal line: fetch lrun's exit status
            result.error = match wait_lrun(child) {
              Some(WaitStatus::Signaled(_, signal, _)) => {
                format!("lrun was signaled ({})", signal as i32)
              }
              Some(WaitStatus::Exited(_, code)) if code != 0 => {
                format!("lrun exited with non-zero ({})", code)
              }
              _ => "lrun did not generate expected output".to_string(),
            };
            break;
          }
        }
      }
      debug!("lrun output:\n{}", String::from_utf8_lossy(&output));

      Ok(result)
    }
    Ok(ForkResult::Child) => {
      // 子进程只负责重定向和 exec，出错直接退出
      unsafe {
        libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM);
      }
      let pipe = match pipe.write() {
        Ok(pipe) => pipe,
        Err(_) => unsafe { libc::_exit(1) },
      };
      setfd(LRUN_FILENO, pipe.fd());

      if !stdin_path.is_empty() {
        match nix::fcntl::open(stdin_path, OFlag::O_RDONLY, Mode::empty()) {
          Ok(fd) => setfd(libc::STDIN_FILENO, fd),
          Err(_) => unsafe { libc::_exit(1) },
        }
      }
      if !stderr_path.is_empty() {
        match nix::fcntl::open(
          stderr_path,
          OFlag::O_WRONLY | OFlag::O_TRUNC | OFlag::O_CREAT,
          Mode::from_bits_truncate(0o600),
        ) {
          Ok(fd) => setfd(libc::STDERR_FILENO, fd),
          Err(_) => unsafe { libc::_exit(1) },
        }
      }
      if !stdout_path.is_empty() {
        if stdout_path == stderr_path {
          let _ = dup2(libc::STDERR_FILENO, libc::STDOUT_FILENO);
        } else {
          match nix::fcntl::open(
            stdout_path,
            OFlag::O_WRONLY | OFlag::O_TRUNC | OFlag::O_CREAT,
            Mode::from_bits_truncate(0o600),
          ) {
            Ok(fd) => setfd(libc::STDOUT_FILENO, fd),
            Err(_) => unsafe { libc::_exit(1) },
          }
        }
      }

      let program = into_c_string("lrun");
      let argv = [
        vec![program.clone()],
        args.as_slice().iter().map(|arg| into_c_string(arg)).collect(),
      ]
      .concat();
      let _ = execvp(&program, &argv);
      // exec 失败，不能在子进程里做清理
      unsafe { libc::_exit(1) };
    }
    Err(_) => Err(CatJudgeError::fork("cannot fork to run lrun")),
  }
}
