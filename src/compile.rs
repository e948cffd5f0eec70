use log::debug;

use crate::chroot::prepare_chroot;
use crate::config::{self, Phase, EXT_CMD_LIST, EXT_LRUN_ARGS};
use crate::context::keep_temp_files;
use crate::error::CatJudgeError;
use crate::lrun::{self, LrunArgs, LrunResult};
use crate::options::Limit;
use crate::report::TRUNC_LOG;
use crate::utils::fs::{self, ScopedFileLock};
use crate::utils::{chomp, truncate_log};

const DEV_NULL: &str = "/dev/null";

/// Outcome of building one source file inside the sandbox
#[derive(Debug, Clone, Default)]
pub struct CompileResult {
  /// compiler output, shown to end-users
  pub log: String,
  /// internal error, not meant for end-users
  pub error: String,
  pub success: bool,
}

/// Compile `code_path` into the content-addressed `dest` workdir.
///
/// The workdir doubles as a build cache: when the expected binary is
/// already present the compiler is not run again. Writers hold an advisory
/// file lock on the workdir, so concurrent judges on the same source are
/// serialized. A failed build removes the workdir so a broken binary is
/// never cached.
pub fn compile_code(
  etc_dir: &str,
  cache_dir: &str,
  dest: &str,
  code_path: &str,
  limit: &Limit,
) -> Result<CompileResult, CatJudgeError> {
  debug!("compile_code: {} {}", code_path, dest);

  let mut result = CompileResult::default();

  if !config::is_language_supported(etc_dir, code_path) {
    result.error = format!(
      "Compiling `{}` is not supported. No appropriate config found.",
      fs::basename(code_path)
    );
    return Ok(result);
  }

  fs::mkdir_p(dest).map_err(|_| CatJudgeError::fs(format!("cannot mkdir: {}", dest)))?;

  {
    let _lock = ScopedFileLock::new(dest);

    let src_name = config::get_src_name(etc_dir, code_path);
    let dest_code_path = fs::join(dest, &src_name);
    if !fs::exists(&dest_code_path) {
      debug!("copying code from {} to {}", code_path, dest_code_path);
      let code_content = fs::read_bytes(code_path);
      let written = fs::write(&dest_code_path, &code_content)?;
      if written != code_content.len() {
        return Err(CatJudgeError::fs(format!(
          "fail to copy code file to {}",
          dest_code_path
        )));
      }
    }

    let compile_cmd = config::get_config_list(
      etc_dir,
      code_path,
      &Phase::Compile.config_name(EXT_CMD_LIST),
      false,
    );
    if compile_cmd.is_empty() {
      result.success = true;
      debug!("skip compilation because the language has no compile command");
      return Ok(result);
    }

    let dest_compile_log_path = fs::join(dest, "compile.log");
    let exe_name = config::get_exe_name(etc_dir, code_path);
    let dest_exe_path = fs::join(dest, &exe_name);
    if fs::exists(&dest_exe_path) {
      result.success = true;
      debug!("skip compilation because binary exists: {}", dest_exe_path);
      result.log = fs::nread(&dest_compile_log_path, TRUNC_LOG);
      return Ok(result);
    }

    let chroot_path = prepare_chroot(etc_dir, code_path, Phase::Compile)?;

    let mappings = lrun::get_mappings(&src_name, &exe_name, dest);

    let mut lrun_args = LrunArgs::new();
    lrun_args.append_default();
    lrun_args.append2("--chroot", &chroot_path);
    lrun_args.append3("--bindfs", fs::join(&chroot_path, "/tmp"), dest);
    lrun_args.append_limit(limit);
    lrun_args.append_list(&lrun::filter_user_args(
      lrun::substitute(
        &config::get_config_list(
          etc_dir,
          code_path,
          &Phase::Compile.config_name(EXT_LRUN_ARGS),
          false,
        ),
        &mappings,
      ),
      cache_dir,
    ));
    lrun_args.append_list(&lrun::filter_user_args(
      lrun::substitute(
        &config::get_config_list(
          etc_dir,
          code_path,
          &Phase::Extra.config_name(EXT_LRUN_ARGS),
          false,
        ),
        &mappings,
      ),
      cache_dir,
    ));
    // hide files using the configured overrides
    lrun_args.append_list(&lrun::get_override_args(
      etc_dir,
      cache_dir,
      code_path,
      Phase::Compile,
      &chroot_path,
    )?);
    lrun_args.append("--");
    lrun_args.append_list(&lrun::substitute(&compile_cmd, &mappings));

    let lrun_result = lrun::lrun(
      &lrun_args,
      DEV_NULL,
      &dest_compile_log_path,
      &dest_compile_log_path,
    )
    .unwrap_or_else(|err| LrunResult {
      error: format!("{}", err),
      ..LrunResult::default()
    });

    let log = chomp(&fs::nread(&dest_compile_log_path, TRUNC_LOG)).to_string();

    // an internal error mostly means lrun can not exec the compiler
    if !lrun_result.error.is_empty() {
      result.error = format!("{}\n{}", lrun_result.error, log);
    } else {
      result.log = log;
      let sep = if result.log.is_empty() { "" } else { "\n\n" };
      if !lrun_result.exceed.is_empty() {
        result.log = format!(
          "{}{}Compiler exceeded {} limit",
          result.log, sep, lrun_result.exceed
        );
      } else if lrun_result.signaled {
        result.log = format!(
          "{}{}Compiler was killed by signal {}\n\n",
          result.log, sep, lrun_result.term_sig
        );
      } else if lrun_result.exit_code != 0 {
        // the message is too common, only use it when the log is empty
        if result.log.is_empty() {
          result.log = format!("Compiler exited with code {}", lrun_result.exit_code);
        }
      } else if !fs::exists(&dest_exe_path) {
        if result.log.is_empty() {
          result.log = "Compiler did not create the expected binary".to_string();
        }
      } else {
        result.success = true;
      }
    }
  }

  result.log = truncate_log(&result.log, TRUNC_LOG);

  if !result.success && !keep_temp_files() {
    debug!("cleaning: rm -rf {}", dest);
    fs::rm_rf(dest);
  }

  Ok(result)
}
