use log::debug;
use nix::libc;

use crate::checker;
use crate::chroot::prepare_chroot;
use crate::config::{self, Phase, EXT_CMD_LIST, EXT_LRUN_ARGS};
use crate::context::{CatJudgeContext, SUBDIR_USER_CODE};
use crate::error::CatJudgeError;
use crate::lrun::{self, LrunArgs, LrunResult};
use crate::options::{Limit, Options, Testcase};
use crate::report::{TestcaseReport, TestcaseStatus, TRUNC_LOG};
use crate::utils::fs;

pub const DEV_NULL: &str = "/dev/null";

/// Run a precompiled binary inside its sandbox.
///
/// `dest` must be the workdir `compile_code` produced for `code_path`; it
/// is bound read-only onto the chroot /tmp, which is the immutability
/// boundary between the build cache and the running program.
pub fn run_code(
  etc_dir: &str,
  cache_dir: &str,
  dest: &str,
  code_path: &str,
  limit: &Limit,
  stdin_path: &str,
  stdout_path: &str,
  stderr_path: &str,
  extra_lrun_args: &[String],
  phase: Phase,
  extra_argv: &[String],
) -> Result<LrunResult, CatJudgeError> {
  debug!("run_code: {}", code_path);

  let chroot_path = prepare_chroot(etc_dir, code_path, phase)?;
  let exe_name = config::get_exe_name(etc_dir, code_path);

  let mut run_cmd = config::get_config_list(
    etc_dir,
    code_path,
    &Phase::Run.config_name(EXT_CMD_LIST),
    false,
  );
  if run_cmd.is_empty() {
    // interpreted languages configure a run command, compiled ones
    // fall back to their exe name
    run_cmd.push(format!("./{}", exe_name));
  }

  let src_name = config::get_src_name(etc_dir, code_path);
  let mut mappings = lrun::get_mappings(&src_name, &exe_name, dest);
  mappings.push(("$chroot".to_string(), chroot_path.clone()));

  let mut lrun_args = LrunArgs::new();
  lrun_args.append_default();
  lrun_args.append2("--chroot", &chroot_path);
  lrun_args.append3("--bindfs-ro", fs::join(&chroot_path, "/tmp"), dest);
  lrun_args.append_limit(limit);
  lrun_args.append_list(&lrun::substitute(extra_lrun_args, &mappings));
  lrun_args.append_list(&lrun::filter_user_args(
    lrun::substitute(
      &config::get_config_list(etc_dir, code_path, &phase.config_name(EXT_LRUN_ARGS), false),
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
  lrun_args.append_list(&lrun::get_override_args(
    etc_dir,
    cache_dir,
    code_path,
    phase,
    &chroot_path,
  )?);
  lrun_args.append("--");
  lrun_args.append_list(&lrun::substitute(&run_cmd, &mappings));
  lrun_args.append_list(&lrun::substitute(extra_argv, &mappings));

  lrun::lrun(&lrun_args, stdin_path, stdout_path, stderr_path)
}

/// Judge one testcase against the precompiled user program
pub fn run_testcase(ctx: &CatJudgeContext, opts: &Options, case: &Testcase) -> TestcaseReport {
  debug!("run_testcase: {}", case.input_path);

  let mut report = TestcaseReport::new(TestcaseStatus::InternalError);

  let stdout_path = if case.user_stdout_path.is_empty() {
    match ctx.temp_file_path("out") {
      Ok(path) => path,
      Err(err) => {
        report.error = Some(format!("{}", err));
        return report;
      }
    }
  } else {
    case.user_stdout_path.clone()
  };
  let stderr_path = if !case.user_stderr_path.is_empty() {
    case.user_stderr_path.clone()
  } else if opts.keep_stderr {
    match ctx.temp_file_path("err") {
      Ok(path) => path,
      Err(err) => {
        report.error = Some(format!("{}", err));
        return report;
      }
    }
  } else {
    DEV_NULL.to_string()
  };

  let run_result = ctx
    .work_dir(&fs::join(&opts.cache_dir, SUBDIR_USER_CODE), &opts.user_code_path)
    .and_then(|dest| {
      run_code(
        &opts.etc_dir,
        &opts.cache_dir,
        &dest,
        &opts.user_code_path,
        &case.runtime_limit,
        &case.input_path,
        &stdout_path,
        &stderr_path,
        &[],
        Phase::Run,
        &[],
      )
    });

  if opts.keep_stdout {
    report.stdout = Some(fs::nread(&stdout_path, TRUNC_LOG));
  }
  if opts.keep_stderr {
    report.stderr = Some(fs::nread(&stderr_path, TRUNC_LOG));
  }

  let run_result = match run_result {
    Ok(result) => result,
    Err(err) => {
      report.result = TestcaseStatus::InternalError;
      report.error = Some(format!("{}", err));
      return report;
    }
  };

  if !run_result.error.is_empty() {
    report.result = TestcaseStatus::InternalError;
    report.error = Some(run_result.error);
    return report;
  }

  if !run_result.exceed.is_empty() {
    report.result = match run_result.exceed.as_str() {
      "CPU_TIME" | "REAL_TIME" => TestcaseStatus::TimeLimitExceeded,
      "MEMORY" => TestcaseStatus::MemoryLimitExceeded,
      _ => TestcaseStatus::OutputLimitExceeded,
    };
    report.exceed = Some(run_result.exceed);
    return report;
  }

  report.time = Some(run_result.cpu_time);
  report.memory = Some(run_result.memory);

  if run_result.signaled {
    let termsig = run_result.term_sig;
    report.termsig = Some(termsig);
    report.result = if termsig == libc::SIGFPE {
      TestcaseStatus::FloatPointException
    } else if termsig == libc::SIGSEGV {
      TestcaseStatus::SegmentationFault
    } else {
      TestcaseStatus::RuntimeError
    };
    return report;
  }
  if run_result.exit_code != 0 {
    report.exitcode = Some(run_result.exit_code);
    report.result = TestcaseStatus::NonZeroExitCode;
    return report;
  }

  if opts.skip_checker {
    report.result = TestcaseStatus::Accepted;
  } else if opts.checker_code_path.is_empty() {
    checker::run_standard_checker(&mut report, case, &stdout_path);
  } else {
    checker::run_custom_checker(&mut report, ctx, opts, case, &stdout_path);
  }
  report
}
