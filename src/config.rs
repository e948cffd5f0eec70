use std::fmt::{self, Display};

use log::debug;

use crate::utils::fs;

// config file extensions
pub const EXT_CMD_LIST: &str = ".cmd_list";
pub const EXT_EXE_NAME: &str = ".exe_name";
pub const EXT_SRC_NAME: &str = ".src_name";
pub const EXT_MIRRORFS: &str = ".mirrorfs";
pub const EXT_LRUN_ARGS: &str = ".lrun_args";
pub const EXT_NAME: &str = ".name";
pub const EXT_FS_OVERRIDE: &str = ".fs_override";
pub const EXT_OPT_FAKE_PASSWD: &str = ".fake_passwd";

pub const OPTION_VALUE_TRUE: &str = "true";

pub const DEFAULT_EXE_NAME: &str = "a.out";
pub const DEFAULT_CONF_DIR: &str = "_default";

/// Config file name prefix: which stage of the pipeline a config applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  Compile,
  Run,
  Check,
  Version,
  Extra,
}

impl Phase {
  pub fn as_str(&self) -> &'static str {
    match self {
      Phase::Compile => "compile",
      Phase::Run => "run",
      Phase::Check => "check",
      Phase::Version => "version",
      Phase::Extra => "extra",
    }
  }

  pub fn config_name(&self, ext: &str) -> String {
    format!("{}{}", self.as_str(), ext)
  }
}

impl Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Resolve a config file for a source path.
///
/// For `/path.to/bla.clang.cc` and config name `foo`, the candidates are
/// tried in order:
///
/// - `<etc_dir>/clang.cc/foo`
/// - `<etc_dir>/cc/foo`
/// - `<etc_dir>/_default/foo` (only when `strict` is false)
///
/// Returns an empty string when none exists.
pub fn get_config_path(etc_dir: &str, code_path: &str, config_name: &str, strict: bool) -> String {
  let basename = fs::basename(code_path);
  debug!("get_config_path: {} {}", config_name, basename);

  let mut search = basename.as_str();
  while let Some(pos) = search.find('.') {
    let ext = &search[pos + 1..];
    let path = fs::join3(etc_dir, ext, config_name);
    if fs::exists(&path) {
      return path;
    }
    search = ext;
  }
  if !strict {
    let path = fs::join3(etc_dir, DEFAULT_CONF_DIR, config_name);
    if fs::exists(&path) {
      return path;
    }
  }

  String::new()
}

/// Read a config file as a single chomped value, with a fallback when the
/// file is missing or empty
pub fn get_config_content(
  etc_dir: &str,
  code_path: &str,
  name: &str,
  fallback: &str,
  strict: bool,
) -> String {
  let config_path = get_config_path(etc_dir, code_path, name, strict);
  debug!("get_config_content: {} {}", name, config_path);
  let mut result = String::new();
  if !config_path.is_empty() {
    result = crate::utils::chomp(&fs::read(&config_path)).to_string();
  }
  if result.is_empty() {
    result = fallback.to_string();
  }
  result
}

/// Read a config file as a list: one item per non-empty non-comment line,
/// left-trimmed. Lines starting with `#` are comments.
pub fn get_config_list(etc_dir: &str, code_path: &str, name: &str, strict: bool) -> Vec<String> {
  let path = get_config_path(etc_dir, code_path, name, strict);
  debug!("get_config_list: {}", path);
  let mut result = vec![];

  if !path.is_empty() {
    for line in fs::read(&path).lines() {
      if line.is_empty() || line.starts_with('#') {
        continue;
      }
      let item = line.trim_start_matches(' ');
      if item.is_empty() {
        continue;
      }
      result.push(item.to_string());
    }
  }
  result
}

pub fn get_src_name(etc_dir: &str, code_path: &str) -> String {
  let fallback = format!("a{}", fs::extname(code_path));
  get_config_content(
    etc_dir,
    code_path,
    &Phase::Compile.config_name(EXT_SRC_NAME),
    &fallback,
    false,
  )
}

pub fn get_exe_name(etc_dir: &str, code_path: &str) -> String {
  get_config_content(
    etc_dir,
    code_path,
    &Phase::Compile.config_name(EXT_EXE_NAME),
    DEFAULT_EXE_NAME,
    false,
  )
}

/// A supported language must have a version command configured
pub fn is_language_supported(etc_dir: &str, code_path: &str) -> bool {
  !get_config_path(
    etc_dir,
    code_path,
    &Phase::Version.config_name(EXT_CMD_LIST),
    true,
  )
  .is_empty()
}

/// True when the resolved option config is "true" (also the default)
pub fn get_config_option(etc_dir: &str, code_path: &str, name: &str) -> bool {
  get_config_content(etc_dir, code_path, name, OPTION_VALUE_TRUE, false) == OPTION_VALUE_TRUE
}
