use log::debug;
use nix::libc::{STDIN_FILENO, STDOUT_FILENO};
use nix::unistd::{getuid, isatty, AccessFlags};

use crate::config;
use crate::error::CatJudgeError;
use crate::utils::fs;
use crate::utils::{is_sha1, parse_bytes, to_number};

/// Resource bounds for one sandboxed process. Any component <= 0 means
/// unbounded and is not passed to the sandbox.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limit {
  /// seconds
  pub cpu_time: f64,
  /// seconds
  pub real_time: f64,
  /// bytes
  pub memory: i64,
  /// bytes
  pub output: i64,
  /// bytes
  pub stack: i64,
}

#[derive(Debug, Clone)]
pub struct Testcase {
  pub input_path: String,
  pub output_path: String,
  pub output_sha1: String,
  pub output_pe_sha1: String,
  pub user_stdout_path: String,
  pub user_stderr_path: String,
  pub runtime_limit: Limit,
  pub checker_limit: Limit,
}

pub struct Options {
  pub etc_dir: String,
  pub cache_dir: String,
  pub user_code_path: String,
  pub checker_code_path: String,
  pub compiler_limit: Limit,
  pub cases: Vec<Testcase>,
  pub envs: Vec<(String, String)>,
  pub pretty_print: bool,
  /// do not run any checker, but capture the user program's output
  pub skip_checker: bool,
  pub keep_stdout: bool,
  pub keep_stderr: bool,
  /// just run the program and print the result
  pub direct_mode: bool,
  /// how many testcases can run in parallel, 0 = host parallelism
  pub nthread: i64,
  /// skip test cases after the first failure occurred
  pub skip_on_first_failure: bool,
  pub debug: bool,
}

/// What a finished CLI parse asks the program to do
pub enum CliAction {
  Judge(Options),
  Help,
  JsonSchema,
  Version,
  CompilerVersions { only_present: bool, options: Options },
  Check,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Opt {
  UserCode,
  CheckerCode,
  TestcaseBoundary,
  Env,
  Input,
  Output,
  OutputSha1,
  UserStdout,
  UserStderr,
  MaxCpuTime,
  MaxRealTime,
  MaxMemory,
  MaxOutput,
  MaxStack,
  MaxCompilerCpuTime,
  MaxCompilerRealTime,
  MaxCompilerMemory,
  MaxCompilerOutput,
  MaxCompilerStack,
  MaxCheckerCpuTime,
  MaxCheckerRealTime,
  MaxCheckerMemory,
  MaxCheckerOutput,
  MaxCheckerStack,
  EtcDir,
  CacheDir,
  Threads,
  PrettyPrint,
  SkipChecker,
  KeepStdout,
  KeepStderr,
  SkipOnFirstFailure,
  Debug,
  Help,
  JsonSchema,
  Version,
  CompilerVersions,
  AllCompilerVersions,
  Check,
}

struct OptionSpec {
  names: &'static [&'static str],
  arity: usize,
  opt: Opt,
}

/// Flag table the argument loop consumes: names, value arity, effect
static OPTION_TABLE: &[OptionSpec] = &[
  OptionSpec { names: &["user-code", "u"], arity: 1, opt: Opt::UserCode },
  OptionSpec { names: &["checker-code", "c"], arity: 1, opt: Opt::CheckerCode },
  OptionSpec { names: &["testcase"], arity: 0, opt: Opt::TestcaseBoundary },
  OptionSpec { names: &["env"], arity: 2, opt: Opt::Env },
  OptionSpec { names: &["input", "i"], arity: 1, opt: Opt::Input },
  OptionSpec { names: &["output", "o"], arity: 1, opt: Opt::Output },
  OptionSpec { names: &["output-sha1", "osha1"], arity: 1, opt: Opt::OutputSha1 },
  OptionSpec { names: &["user-stdout"], arity: 1, opt: Opt::UserStdout },
  OptionSpec { names: &["user-stderr"], arity: 1, opt: Opt::UserStderr },
  OptionSpec { names: &["max-cpu-time"], arity: 1, opt: Opt::MaxCpuTime },
  OptionSpec { names: &["max-real-time"], arity: 1, opt: Opt::MaxRealTime },
  OptionSpec { names: &["max-memory"], arity: 1, opt: Opt::MaxMemory },
  OptionSpec { names: &["max-output"], arity: 1, opt: Opt::MaxOutput },
  OptionSpec { names: &["max-stack"], arity: 1, opt: Opt::MaxStack },
  OptionSpec { names: &["max-compiler-cpu-time"], arity: 1, opt: Opt::MaxCompilerCpuTime },
  OptionSpec { names: &["max-compiler-real-time"], arity: 1, opt: Opt::MaxCompilerRealTime },
  OptionSpec { names: &["max-compiler-memory"], arity: 1, opt: Opt::MaxCompilerMemory },
  OptionSpec { names: &["max-compiler-output"], arity: 1, opt: Opt::MaxCompilerOutput },
  OptionSpec { names: &["max-compiler-stack"], arity: 1, opt: Opt::MaxCompilerStack },
  OptionSpec { names: &["max-checker-cpu-time"], arity: 1, opt: Opt::MaxCheckerCpuTime },
  OptionSpec { names: &["max-checker-real-time"], arity: 1, opt: Opt::MaxCheckerRealTime },
  OptionSpec { names: &["max-checker-memory"], arity: 1, opt: Opt::MaxCheckerMemory },
  OptionSpec { names: &["max-checker-output"], arity: 1, opt: Opt::MaxCheckerOutput },
  OptionSpec { names: &["max-checker-stack"], arity: 1, opt: Opt::MaxCheckerStack },
  OptionSpec { names: &["etc-dir"], arity: 1, opt: Opt::EtcDir },
  OptionSpec { names: &["cache-dir"], arity: 1, opt: Opt::CacheDir },
  OptionSpec { names: &["threads", "jobs", "j"], arity: 1, opt: Opt::Threads },
  OptionSpec { names: &["pretty-print", "pp"], arity: 0, opt: Opt::PrettyPrint },
  OptionSpec { names: &["skip-checker"], arity: 0, opt: Opt::SkipChecker },
  OptionSpec { names: &["keep-stdout"], arity: 0, opt: Opt::KeepStdout },
  OptionSpec { names: &["keep-stderr"], arity: 0, opt: Opt::KeepStderr },
  OptionSpec { names: &["skip-on-first-failure"], arity: 0, opt: Opt::SkipOnFirstFailure },
  OptionSpec { names: &["debug"], arity: 0, opt: Opt::Debug },
  OptionSpec { names: &["help", "h"], arity: 0, opt: Opt::Help },
  OptionSpec { names: &["json-schema"], arity: 0, opt: Opt::JsonSchema },
  OptionSpec { names: &["version", "v"], arity: 0, opt: Opt::Version },
  OptionSpec { names: &["compiler-versions", "cvs"], arity: 0, opt: Opt::CompilerVersions },
  OptionSpec { names: &["all-compiler-versions", "acvs"], arity: 0, opt: Opt::AllCompilerVersions },
  OptionSpec { names: &["check"], arity: 0, opt: Opt::Check },
];

fn lookup(name: &str) -> Option<&'static OptionSpec> {
  OPTION_TABLE.iter().find(|spec| spec.names.contains(&name))
}

impl Limit {
  pub const fn unlimited() -> Self {
    Limit { cpu_time: 0.0, real_time: 0.0, memory: 0, output: 0, stack: 0 }
  }
}

impl Testcase {
  pub fn new() -> Self {
    Testcase {
      input_path: String::new(),
      output_path: String::new(),
      output_sha1: String::new(),
      output_pe_sha1: String::new(),
      user_stdout_path: String::new(),
      user_stderr_path: String::new(),
      // 1s CPU, 3s real, 64M memory, 32M output, 8M stack
      runtime_limit: Limit {
        cpu_time: 1.0,
        real_time: 3.0,
        memory: 1 << 26,
        output: 1 << 25,
        stack: 1 << 23,
      },
      checker_limit: Limit {
        cpu_time: 5.0,
        real_time: 10.0,
        memory: 1 << 30,
        output: 1 << 30,
        stack: 1 << 30,
      },
    }
  }

  /// Finalize this case and keep the sticky limits for the next one
  fn reset_paths(&mut self) {
    self.input_path.clear();
    self.output_path.clear();
    self.output_sha1.clear();
    self.output_pe_sha1.clear();
    self.user_stdout_path.clear();
    self.user_stderr_path.clear();
  }
}

impl Options {
  pub fn new() -> Self {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    let etc_dir_candidates = [
      "/etc/catjudge".to_string(),
      fs::join(&home, ".config/catjudge"),
      fs::join(&home, "catjudge/etc/catjudge"),
      "./etc/catjudge".to_string(),
      "../etc/catjudge".to_string(),
    ];
    let etc_dir = etc_dir_candidates
      .iter()
      .find(|candidate| fs::is_dir(candidate))
      .cloned()
      .unwrap_or_default();

    Options {
      etc_dir,
      cache_dir: fs::join(&home, ".cache/catjudge"),
      user_code_path: String::new(),
      checker_code_path: String::new(),
      // 5s CPU, 10s real, 512M memory, 128M output
      compiler_limit: Limit {
        cpu_time: 5.0,
        real_time: 10.0,
        memory: 1 << 29,
        output: 1 << 27,
        stack: 0,
      },
      cases: vec![],
      envs: vec![],
      pretty_print: isatty(STDOUT_FILENO).unwrap_or(false),
      skip_checker: false,
      keep_stdout: false,
      keep_stderr: false,
      direct_mode: false,
      nthread: 0,
      skip_on_first_failure: false,
      debug: false,
    }
  }
}

fn append_testcase(options: &mut Options, current: &mut Testcase) {
  if !current.input_path.is_empty() {
    options.cases.push(current.clone());
    current.reset_paths();
  }
}

/// substr-style slices of the `ac,pe` argument; `pe` is optional
fn parse_output_sha1(current: &mut Testcase, value: &str) {
  current.output_sha1 = value.get(..40).unwrap_or(value).to_string();
  current.output_pe_sha1 = match value.get(41..) {
    Some(rest) => rest.get(..40).unwrap_or(rest).to_string(),
    None => String::new(),
  };
}

pub fn parse_cli_options(args: &[String]) -> Result<CliAction, CatJudgeError> {
  let mut options = Options::new();
  let mut current = Testcase::new();

  let mut i = 1;
  while i < args.len() {
    let arg = &args[i];
    let name = if let Some(name) = arg.strip_prefix("--") {
      name
    } else if let Some(name) = arg.strip_prefix('-') {
      name
    } else {
      // a bare trailing positional with a supported extension enters
      // direct mode
      if options.user_code_path.is_empty()
        && i == args.len() - 1
        && config::is_language_supported(&options.etc_dir, arg)
        && options.cases.len() <= 1
        && !options.skip_checker
        && options.checker_code_path.is_empty()
      {
        options.user_code_path = arg.clone();
        options.skip_checker = true;
        options.direct_mode = true;
        options.keep_stdout = true;
        options.keep_stderr = true;
        i += 1;
        continue;
      }
      return Err(CatJudgeError::cli(format!(
        "`{}` is not a valid option. Use `--help` for more information",
        arg
      )));
    };

    let spec = lookup(name).ok_or_else(|| {
      CatJudgeError::cli(format!("'{}' is not a valid option", arg))
    })?;
    if i + spec.arity >= args.len() {
      return Err(CatJudgeError::cli(format!(
        "Option '{}' requires {} argument{}.",
        name,
        spec.arity,
        if spec.arity > 1 { "s" } else { "" }
      )));
    }
    let values = &args[i + 1..=i + spec.arity];
    i += spec.arity + 1;

    match spec.opt {
      Opt::UserCode => options.user_code_path = values[0].clone(),
      Opt::CheckerCode => options.checker_code_path = values[0].clone(),
      Opt::TestcaseBoundary => append_testcase(&mut options, &mut current),
      Opt::Env => options.envs.push((values[0].clone(), values[1].clone())),
      Opt::Input => {
        append_testcase(&mut options, &mut current);
        current.input_path = values[0].clone();
      }
      Opt::Output => current.output_path = values[0].clone(),
      Opt::OutputSha1 => parse_output_sha1(&mut current, &values[0]),
      Opt::UserStdout => current.user_stdout_path = values[0].clone(),
      Opt::UserStderr => current.user_stderr_path = values[0].clone(),
      Opt::MaxCpuTime => current.runtime_limit.cpu_time = to_number(&values[0]),
      Opt::MaxRealTime => current.runtime_limit.real_time = to_number(&values[0]),
      Opt::MaxMemory => current.runtime_limit.memory = parse_bytes(&values[0]),
      Opt::MaxOutput => current.runtime_limit.output = parse_bytes(&values[0]),
      Opt::MaxStack => current.runtime_limit.stack = parse_bytes(&values[0]),
      Opt::MaxCompilerCpuTime => options.compiler_limit.cpu_time = to_number(&values[0]),
      Opt::MaxCompilerRealTime => options.compiler_limit.real_time = to_number(&values[0]),
      Opt::MaxCompilerMemory => options.compiler_limit.memory = parse_bytes(&values[0]),
      Opt::MaxCompilerOutput => options.compiler_limit.output = parse_bytes(&values[0]),
      Opt::MaxCompilerStack => options.compiler_limit.stack = parse_bytes(&values[0]),
      Opt::MaxCheckerCpuTime => current.checker_limit.cpu_time = to_number(&values[0]),
      Opt::MaxCheckerRealTime => current.checker_limit.real_time = to_number(&values[0]),
      Opt::MaxCheckerMemory => current.checker_limit.memory = parse_bytes(&values[0]),
      Opt::MaxCheckerOutput => current.checker_limit.output = parse_bytes(&values[0]),
      Opt::MaxCheckerStack => current.checker_limit.stack = parse_bytes(&values[0]),
      Opt::EtcDir => options.etc_dir = values[0].clone(),
      Opt::CacheDir => options.cache_dir = values[0].clone(),
      Opt::Threads => options.nthread = to_number(&values[0]) as i64,
      Opt::PrettyPrint => options.pretty_print = true,
      Opt::SkipChecker => {
        options.skip_checker = true;
        options.keep_stdout = true;
      }
      Opt::KeepStdout => options.keep_stdout = true,
      Opt::KeepStderr => options.keep_stderr = true,
      Opt::SkipOnFirstFailure => {
        if options.nthread > 1 {
          return Err(CatJudgeError::cli(
            "'--skip-on-first-failure' does not work with --threads",
          ));
        }
        options.nthread = 1;
        options.skip_on_first_failure = true;
      }
      Opt::Debug => {
        options.debug = true;
        options.keep_stdout = true;
        options.keep_stderr = true;
      }
      Opt::Help => return Ok(CliAction::Help),
      Opt::JsonSchema => return Ok(CliAction::JsonSchema),
      Opt::Version => return Ok(CliAction::Version),
      Opt::CompilerVersions => {
        return Ok(CliAction::CompilerVersions { only_present: true, options })
      }
      Opt::AllCompilerVersions => {
        return Ok(CliAction::CompilerVersions { only_present: false, options })
      }
      Opt::Check => return Ok(CliAction::Check),
    }
  }
  append_testcase(&mut options, &mut current);

  // if the user decided to skip the checker and did not provide any
  // testcase, add a stdin-backed one
  if options.cases.is_empty() && options.skip_checker {
    let mut input_path = if isatty(STDIN_FILENO).unwrap_or(false) {
      if options.direct_mode {
        String::new()
      } else {
        "/dev/null".to_string()
      }
    } else {
      // stdin was redirected from a file with '<'
      fs::resolve(&format!("/proc/self/fd/{}", STDIN_FILENO))
    };
    if !fs::is_accessible(&input_path, AccessFlags::R_OK) {
      input_path = "/dev/null".to_string();
    }
    if options.direct_mode && input_path != "/dev/null" && !input_path.is_empty() {
      // reading from a real file, no need to bound real time
      current.runtime_limit.real_time = 0.0;
    }
    current.input_path = input_path;
    options.cases.push(current);
  }

  debug!("etc-dir = {}", options.etc_dir);
  debug!("cache-dir = {}", options.cache_dir);

  Ok(CliAction::Judge(options))
}

fn check_path(errors: &mut Vec<String>, path: &str, is_dir: bool, name: &str) {
  if path.is_empty() {
    errors.push(format!("{} is required", name));
    return;
  }

  let accessible = if is_dir {
    fs::is_dir(path) && fs::is_accessible(path, AccessFlags::R_OK | AccessFlags::X_OK)
  } else {
    !fs::is_dir(path) && fs::is_accessible(path, AccessFlags::R_OK)
  };
  if !accessible {
    errors.push(format!("{} ({}) is not accessible", name, path));
  }
}

/// Validate the parsed options, collecting every problem before failing
pub fn check_options(options: &Options) -> Result<(), CatJudgeError> {
  let mut errors: Vec<String> = vec![];

  if fs::mkdir_p(&options.cache_dir).is_err() {
    return Err(CatJudgeError::fs(format!(
      "cannot mkdir: {}",
      options.cache_dir
    )));
  }

  check_path(&mut errors, &options.etc_dir, true, "--etc-dir");
  check_path(&mut errors, &options.cache_dir, true, "--cache-dir");
  check_path(&mut errors, &options.user_code_path, false, "--user-code");

  for (i, case) in options.cases.iter().enumerate() {
    if !options.direct_mode || !case.input_path.is_empty() {
      check_path(
        &mut errors,
        &case.input_path,
        false,
        &format!("--input of testcases[{}]", i),
      );
    }
    if options.skip_checker {
      if !case.output_path.is_empty() {
        errors.push("--output conflicts with --skip-checker".to_string());
      }
      if !case.output_sha1.is_empty() {
        errors.push("--output-sha1 conflicts with --skip-checker".to_string());
      }
    } else if !case.output_sha1.is_empty() {
      if !is_sha1(&case.output_sha1) {
        errors.push(format!("'{}' is not a valid hex SHA1", case.output_sha1));
      }
      // allow output_pe_sha1 to be empty
      if !case.output_pe_sha1.is_empty() && !is_sha1(&case.output_pe_sha1) {
        errors.push(format!("'{}' is not a valid hex SHA1", case.output_pe_sha1));
      }
    } else {
      check_path(
        &mut errors,
        &case.output_path,
        false,
        &format!("--output of testcases[{}]", i),
      );
    }
  }

  if options.cases.is_empty() {
    errors.push("At least one testcase is required".to_string());
  }

  if options.skip_checker && !options.checker_code_path.is_empty() {
    errors.push("--skip-checker conflicts with --checker-code".to_string());
  }

  if getuid().is_root() {
    errors.push("Running catjudge using root is forbidden".to_string());
  }

  if options.nthread < 0 {
    errors.push("--threads cannot < 0".to_string());
  }

  if errors.is_empty() {
    Ok(())
  } else {
    errors.push("--help will show valid options".to_string());
    Err(CatJudgeError::cli(errors.join("\n")))
  }
}
