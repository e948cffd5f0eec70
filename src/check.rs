use std::process::Command;

use nix::libc;
use nix::unistd::{getuid, AccessFlags};
use serde_json::{Map, Value};

use crate::config::{self, Phase, DEFAULT_CONF_DIR, EXT_CMD_LIST, EXT_NAME};
use crate::error::CatJudgeError;
use crate::options::Options;
use crate::utils::fs;
use crate::utils::{chomp, shell_escape_list};

const DEV_NULL: &str = "/dev/null";
const PROC_CGROUP: &str = "/proc/cgroups";

/// like Python's subprocess.check_output but without the check part
fn check_output(command: &str, capture_stderr: bool) -> String {
  let mut real_command = format!("{} <{}", command, DEV_NULL);
  if !real_command.contains(" 2>") {
    if capture_stderr {
      real_command += " 2>&1";
    } else {
      real_command += " 2>";
      real_command += DEV_NULL;
    }
  }
  match Command::new("sh").arg("-c").arg(&real_command).output() {
    Ok(output) => String::from_utf8_lossy(&output.stdout).into_owned(),
    Err(_) => String::new(),
  }
}

fn print_checkpoint(name: &str, passed: bool, solution: &str) {
  let badge = if passed {
    "\x1b[1;97;42m Y \x1b[0m"
  } else {
    "\x1b[1;97;41m N \x1b[0m"
  };
  println!("{} \x1b[1m{}\x1b[0m", badge, name);
  if !passed {
    println!("    {}\n", solution.replace('\n', "\n    "));
  }
}

fn print_checkfail(name: &str, message: &str, symbol: char) {
  let bg = if symbol == 'S' || symbol == 'W' { 43 } else { 41 };
  println!("\x1b[1;97;{}m {} \x1b[0m \x1b[1m{}\x1b[0m", bg, symbol, name);
  println!("    {}\n", message.replace('\n', "\n    "));
}

fn is_cgroup_enabled(subsystem: &str) -> bool {
  if !fs::exists(PROC_CGROUP) {
    return false;
  }
  for line in fs::read(PROC_CGROUP).lines() {
    if line.starts_with('#') {
      continue;
    }
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() >= 4 && fields[0] == subsystem {
      return fields[3] != "0";
    }
  }
  false
}

/// Environment diagnostic behind `--check`: verify the cgroup
/// controllers, the lrun toolchain and the kernel knobs this judge
/// depends on, with a suggested fix for each failed checkpoint
pub fn do_check() -> Result<(), CatJudgeError> {
  if getuid().is_root() {
    return Err(CatJudgeError::cli(
      "Running catjudge --check using root is not supported.\n\
       Please switch to a non-root user and try again.",
    ));
  }

  let username = std::env::var("USER").unwrap_or_else(|_| "username".to_string());

  // cgroup
  print_checkpoint(
    "cgroup memory controller is enabled",
    is_cgroup_enabled("memory"),
    "This is common on Debian-based systems. Add `cgroup_enable=memory`\n\
     to the kernel parameters and reboot.",
  );
  print_checkpoint(
    "cgroup cpuacct, devices, freezer controllers are enabled",
    is_cgroup_enabled("cpuacct") && is_cgroup_enabled("devices") && is_cgroup_enabled("freezer"),
    "Most modern Linux distributions have cgroup enabled by default.\n\
     Upgrade the kernel or switch to another distribution.",
  );

  // lrun
  let lrun_path = fs::which("lrun");
  if lrun_path.is_empty() {
    if fs::which_mode("lrun", AccessFlags::F_OK).is_empty() {
      print_checkfail("lrun not found", "lrun is required. Please install it.", '!');
    } else {
      print_checkfail(
        "lrun is not executable",
        &format!(
          "lrun is installed but the current user cannot execute it.\n\
           This is probably because the current user is not in the `lrun`\n\
           group. To fix it, add the user to the `lrun` group:\n\n  sudo gpasswd -a {} lrun",
          username
        ),
        '!',
      );
    }
  } else {
    let lrun_help = check_output("lrun --help", true);
    print_checkpoint(
      "lrun supports --syscalls",
      lrun_help.contains("--syscalls"),
      "lrun is compiled without libseccomp support.\n\
       Install the libseccomp packages and recompile lrun.",
    );
    print_checkpoint(
      "lrun supports --bindfs-ro",
      lrun_help.contains("--bindfs-ro"),
      "Please upgrade lrun to at least v1.1.3",
    );
    print_checkpoint(
      "lrun supports --fopen-filter",
      lrun_help.contains("--fopen-filter"),
      "Please upgrade lrun to at least v1.1.3",
    );
    print_checkpoint(
      "lrun supports --netns",
      lrun_help.contains("--netns"),
      "Please upgrade lrun to at least v1.2.1",
    );
    print_checkpoint(
      "lrun actually works",
      check_output("lrun echo foofoo", false).contains("foofoo"),
      "lrun doesn't work. Please make sure other issues are resolved\n\
       and try `lrun --debug echo foo` to get some help.",
    );
    print_checkpoint(
      "lrun-netns-empty runs",
      check_output("lrun-netns-empty", false).contains("/lrun-empty:"),
      "lrun-netns-empty doesn't work. Please make sure it is installed with lrun >= 1.2.1",
    );
  }

  // lrun-mirrorfs
  if fs::which("lrun-mirrorfs").is_empty() {
    print_checkfail(
      "lrun-mirrorfs not found",
      "lrun-mirrorfs is required. Please upgrade lrun to v1.1.3",
      '!',
    );
  }

  // kernel
  if fs::nread("/proc/sys/debug/exception-trace", 1) == "1" {
    print_checkfail(
      "debug.exception-trace is 1",
      "Programs being judged may die in many ways, some of which\n\
       will write the kernel log. Consider setting the flag to 0 to\n\
       keep the kernel log clean:\n\n  sudo sysctl -w debug.exception-trace=0",
      'W',
    );
  }
  if !fs::exists("/proc/self/ns/pid") {
    print_checkfail(
      "kernel does not have full pid namespace support",
      "lrun will use a legacy method to run programs.\n\
       Not a big deal. But upgrading the kernel is recommended.",
      'W',
    );
  }
  if unsafe { libc::sysconf(libc::_SC_ARG_MAX) } < 4096 {
    print_checkfail(
      "Maximum length of arguments for a new process is too small.",
      "Not a serious one. But upgrading the kernel is recommended.",
      'W',
    );
  }

  // kernel config
  let kernel_config = if fs::is_accessible("/proc/config.gz", AccessFlags::R_OK) {
    // Arch Linux puts the kernel config at /proc/config.gz
    check_output("zcat /proc/config.gz", false)
  } else {
    // Debian puts it at /boot/config-`uname -r`
    let config_path = format!("/boot/config-{}", check_output("uname -r", false).trim());
    fs::read(&config_path)
  };
  if kernel_config.is_empty() {
    print_checkfail(
      "kernel config not found",
      "Related checks are skipped. Please make sure\n\
       the kernel is compiled with\nCONFIG_FANOTIFY_ACCESS_PERMISSIONS",
      'W',
    );
  } else {
    print_checkpoint(
      "kernel supports fanotify permission check",
      kernel_config.contains("CONFIG_FANOTIFY_ACCESS_PERMISSIONS=y"),
      "CONFIG_FANOTIFY_ACCESS_PERMISSIONS not found.\n\
       lrun --fopen-filter will not work properly.",
    );
  }

  Ok(())
}

/// find something like a.b.c in a long string
fn scan_version_string(content: &str) -> String {
  let mut result = String::new();
  let mut current_word_is_version = false;
  for c in content.chars() {
    if c.is_ascii_digit() {
      result.push(c);
      current_word_is_version = true;
    } else if c == '.' {
      if current_word_is_version {
        result.push(c);
      }
    } else {
      if current_word_is_version {
        // exiting the word, drop a trailing dot and check
        if result.ends_with('.') {
          result.pop();
        }
        if result.contains('.') && result.len() >= 2 {
          return result;
        }
        // no '.', not a version string
        result.clear();
      }
      current_word_is_version = false;
    }
  }
  result
}

fn fetch_compiler_versions(etc_dir: &str, only_present: bool) -> Vec<Value> {
  let mut result = vec![];
  for ext in fs::scandir(etc_dir) {
    if ext == DEFAULT_CONF_DIR {
      continue;
    }

    // every supported language configures a version command
    let dummy_code_path = format!("a.{}", ext);
    let version_cmd = shell_escape_list(&config::get_config_list(
      etc_dir,
      &dummy_code_path,
      &Phase::Version.config_name(EXT_CMD_LIST),
      true,
    ));
    if version_cmd.is_empty() {
      continue;
    }
    let content = check_output(&version_cmd, true);

    // when no version is found the compiler is considered not installed
    let version = scan_version_string(&content);

    let mut entry = Map::new();
    if !version.is_empty() {
      entry.insert("version".to_string(), Value::String(version));
    } else if only_present {
      continue;
    }

    let mut name = chomp(&config::get_config_content(
      etc_dir,
      &dummy_code_path,
      &Phase::Version.config_name(EXT_NAME),
      "",
      true,
    ))
    .to_string();
    let compile_cmds = config::get_config_list(
      etc_dir,
      &dummy_code_path,
      &Phase::Compile.config_name(EXT_CMD_LIST),
      true,
    );
    let run_cmds = config::get_config_list(
      etc_dir,
      &dummy_code_path,
      &Phase::Run.config_name(EXT_CMD_LIST),
      true,
    );

    if name.is_empty() {
      name = compile_cmds
        .first()
        .or_else(|| run_cmds.first())
        .cloned()
        .unwrap_or_else(|| ext.clone());
    }

    if !compile_cmds.is_empty() {
      entry.insert(
        "compileCmd".to_string(),
        Value::String(shell_escape_list(&compile_cmds)),
      );
    }
    if !run_cmds.is_empty() {
      entry.insert(
        "runCmd".to_string(),
        Value::String(shell_escape_list(&run_cmds)),
      );
    }
    entry.insert("name".to_string(), Value::String(name));
    entry.insert("ext".to_string(), Value::String(ext));
    result.push(Value::Object(entry));
  }
  result
}

pub fn print_compiler_versions(options: &Options, only_present: bool) {
  let versions = Value::Array(fetch_compiler_versions(&options.etc_dir, only_present));
  let serialized = if options.pretty_print {
    serde_json::to_string_pretty(&versions).unwrap_or_default()
  } else {
    serde_json::to_string(&versions).unwrap_or_default()
  };
  print!("{}", serialized);
}
