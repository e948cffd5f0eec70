use log::debug;

use crate::config::Phase;
use crate::context::{CatJudgeContext, SUBDIR_CHECKER};
use crate::error::CatJudgeError;
use crate::lrun::LrunResult;
use crate::options::{Options, Testcase};
use crate::report::{TestcaseReport, TestcaseStatus, TRUNC_LOG};
use crate::run::{run_code, DEV_NULL};
use crate::utils::fs;
use crate::utils::{chomp_bytes, remove_space, sha1_hex};

const CHECKER_EXITCODE_ACCEPTED: i32 = 0;
const CHECKER_EXITCODE_WRONG_ANSWER: i32 = 1;
const CHECKER_EXITCODE_PRESENTATION_ERROR: i32 = 2;
// exit codes are 8 bits on most unix systems, a legacy checker's -1
// arrives as 255
const LEGACY_CHECKER_EXITCODE_WRONG_ANSWER: i32 = 255;

/// Byte-compare the user output against the expected answer.
///
/// Both sides are chomped of a single trailing newline. A mismatch that
/// disappears after removing all whitespace is a presentation error. When
/// the testcase carries SHA-1 digests the expected file is never read:
/// the accepted digest is taken over the chomped output and the
/// presentation digest over the whitespace-stripped output.
pub fn run_standard_checker(
  report: &mut TestcaseReport,
  case: &Testcase,
  user_output_path: &str,
) {
  debug!(
    "run_standard_checker: {} {}",
    case.output_path, user_output_path
  );
  let use_sha1 = !case.output_sha1.is_empty();
  let user_bytes = fs::read_bytes(user_output_path);
  let user = chomp_bytes(&user_bytes);

  report.result = if use_sha1 {
    if sha1_hex(user) == case.output_sha1 {
      TestcaseStatus::Accepted
    } else if !case.output_pe_sha1.is_empty()
      && sha1_hex(&remove_space(user)) == case.output_pe_sha1
    {
      TestcaseStatus::PresentationError
    } else {
      TestcaseStatus::WrongAnswer
    }
  } else {
    let expected_bytes = fs::read_bytes(&case.output_path);
    let expected = chomp_bytes(&expected_bytes);
    if user == expected {
      TestcaseStatus::Accepted
    } else if remove_space(user) == remove_space(expected) {
      TestcaseStatus::PresentationError
    } else {
      TestcaseStatus::WrongAnswer
    }
  };
}

/// The four files the checker sandbox binds read-only under its /tmp.
/// lrun requires the bind targets to exist up front.
pub fn prepare_checker_bind_files(dest: &str) {
  fs::touch(&fs::join(dest, "input"));
  fs::touch(&fs::join(dest, "output"));
  fs::touch(&fs::join(dest, "user_output"));
  fs::touch(&fs::join(dest, "user_code"));
}

/// Run the custom checker against one testcase.
///
/// Legacy checker contract: stdin is the testcase input, a file named
/// `output` is the expected answer, and argv[1] names the user output
/// file. Exit code 0 accepts, 1 (or legacy -1) rejects, 2 is a
/// presentation error; everything else is an internal error.
pub fn run_custom_checker(
  report: &mut TestcaseReport,
  ctx: &CatJudgeContext,
  opts: &Options,
  case: &Testcase,
  user_output_path: &str,
) {
  debug!(
    "run_custom_checker: {} {}",
    case.output_path, user_output_path
  );

  let mut extra_lrun_args: Vec<String> = vec![];
  for (target, source) in [
    ("$chroot/tmp/input", case.input_path.as_str()),
    ("$chroot/tmp/output", case.output_path.as_str()),
    ("$chroot/tmp/user_output", user_output_path),
    ("$chroot/tmp/user_code", opts.user_code_path.as_str()),
  ] {
    extra_lrun_args.push("--bindfs-ro".to_string());
    extra_lrun_args.push(target.to_string());
    extra_lrun_args.push(fs::full_path(source));
  }
  for (name, value) in opts.envs.iter() {
    extra_lrun_args.push("--env".to_string());
    extra_lrun_args.push(name.clone());
    extra_lrun_args.push(value.clone());
  }

  let checker_argv = vec!["user_output".to_string()];

  let run_result: Result<(LrunResult, String), CatJudgeError> = (|| {
    let output_path = ctx.temp_file_path("checker-out")?;
    // dest must be the same workdir compile_code used for the checker
    let dest = ctx.work_dir(
      &fs::join(&opts.cache_dir, SUBDIR_CHECKER),
      &opts.checker_code_path,
    )?;
    let lrun_result = run_code(
      &opts.etc_dir,
      &opts.cache_dir,
      &dest,
      &opts.checker_code_path,
      &case.checker_limit,
      &case.input_path,
      &output_path,
      DEV_NULL,
      &extra_lrun_args,
      Phase::Check,
      &checker_argv,
    )?;
    Ok((lrun_result, fs::nread(&output_path, TRUNC_LOG)))
  })();

  let (lrun_result, checker_output) = match run_result {
    Ok(result) => result,
    Err(err) => {
      report.result = TestcaseStatus::InternalError;
      report.error = Some(format!("{}", err));
      return;
    }
  };

  let mut status = TestcaseStatus::InternalError;
  let mut error_message = String::new();

  if !lrun_result.error.is_empty() {
    error_message = format!("lrun internal error: {}", lrun_result.error);
  } else if !lrun_result.exceed.is_empty() {
    error_message = format!("checker exceeded {} limit", lrun_result.exceed);
  } else if lrun_result.signaled {
    error_message = format!("checker was killed by signal {}", lrun_result.term_sig);
  } else if lrun_result.exit_code == CHECKER_EXITCODE_ACCEPTED {
    status = TestcaseStatus::Accepted;
  } else if lrun_result.exit_code == CHECKER_EXITCODE_WRONG_ANSWER
    || lrun_result.exit_code == LEGACY_CHECKER_EXITCODE_WRONG_ANSWER
  {
    status = TestcaseStatus::WrongAnswer;
  } else if lrun_result.exit_code == CHECKER_EXITCODE_PRESENTATION_ERROR {
    status = TestcaseStatus::PresentationError;
  } else {
    error_message = format!("unknown checker exit code {}", lrun_result.exit_code);
  }

  if !checker_output.is_empty() {
    report.checker_output = Some(checker_output);
  }
  if !error_message.is_empty() {
    report.error = Some(error_message);
  }
  report.result = status;
}
