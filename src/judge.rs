use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread::available_parallelism;

use log::debug;

use crate::checker::prepare_checker_bind_files;
use crate::compile::{compile_code, CompileResult};
use crate::context::{CatJudgeContext, SUBDIR_CHECKER, SUBDIR_USER_CODE};
use crate::error::CatJudgeError;
use crate::options::Options;
use crate::report::{CompilationReport, JudgeReport, TestcaseReport, TestcaseStatus};
use crate::run::run_testcase;
use crate::utils::fs;

fn to_compilation_report(result: CompileResult) -> CompilationReport {
  CompilationReport {
    log: result.log,
    error: if result.error.is_empty() {
      None
    } else {
      Some(result.error)
    },
    success: result.success,
  }
}

/// Run every testcase of a successfully compiled submission.
///
/// Testcases are independent: under `skip_on_first_failure` they run
/// sequentially and everything after the first non-accepted verdict is
/// reported SKIPPED without touching the sandbox; otherwise a scoped
/// worker pool pulls indices until the list is drained.
pub fn run_testcases(ctx: &CatJudgeContext, opts: &Options) -> Vec<TestcaseReport> {
  debug!("nthread = {}", opts.nthread);

  if opts.skip_on_first_failure {
    let mut results = Vec::with_capacity(opts.cases.len());
    for (i, case) in opts.cases.iter().enumerate() {
      let report = run_testcase(ctx, opts, case);
      let failed = report.result != TestcaseStatus::Accepted;
      results.push(report);
      if failed {
        for _ in i + 1..opts.cases.len() {
          results.push(TestcaseReport::skipped());
        }
        break;
      }
    }
    return results;
  }

  let nthread = if opts.nthread > 0 {
    opts.nthread as usize
  } else {
    available_parallelism().map(|n| n.get()).unwrap_or(1)
  };
  let jobs = nthread.min(opts.cases.len()).max(1);

  let next = AtomicUsize::new(0);
  let results: Mutex<Vec<Option<TestcaseReport>>> = Mutex::new(vec![None; opts.cases.len()]);

  std::thread::scope(|scope| {
    for _ in 0..jobs {
      scope.spawn(|| loop {
        let idx = next.fetch_add(1, Ordering::Relaxed);
        if idx >= opts.cases.len() {
          return;
        }
        let report = run_testcase(ctx, opts, &opts.cases[idx]);
        if let Ok(mut guard) = results.lock() {
          guard[idx] = Some(report);
        }
      });
    }
  });

  results
    .into_inner()
    .unwrap_or_else(|err| err.into_inner())
    .into_iter()
    .map(|report| report.unwrap_or_else(TestcaseReport::skipped))
    .collect()
}

/// The whole pipeline: precompile the user code (and the checker), then
/// judge the testcases. Compilation always happens-before every run.
pub fn judge(ctx: &CatJudgeContext, opts: &Options) -> Result<JudgeReport, CatJudgeError> {
  let mut compiled = true;

  // precompile user code
  let dest = ctx.work_dir(
    &fs::join(&opts.cache_dir, SUBDIR_USER_CODE),
    &opts.user_code_path,
  )?;
  let compile_result = compile_code(
    &opts.etc_dir,
    &opts.cache_dir,
    &dest,
    &opts.user_code_path,
    &opts.compiler_limit,
  )?;
  if !compile_result.success {
    compiled = false;
  }
  let mut report = JudgeReport {
    compilation: to_compilation_report(compile_result),
    checker_compilation: None,
    testcases: None,
  };

  if compiled && !opts.checker_code_path.is_empty() {
    // precompile checker code
    let dest = ctx.work_dir(
      &fs::join(&opts.cache_dir, SUBDIR_CHECKER),
      &opts.checker_code_path,
    )?;
    let compile_result = compile_code(
      &opts.etc_dir,
      &opts.cache_dir,
      &dest,
      &opts.checker_code_path,
      &opts.compiler_limit,
    )?;
    if !compile_result.success {
      compiled = false;
    }
    report.checker_compilation = Some(to_compilation_report(compile_result));
    prepare_checker_bind_files(&dest);
  }

  if compiled {
    report.testcases = Some(run_testcases(ctx, opts));
  }

  Ok(report)
}
