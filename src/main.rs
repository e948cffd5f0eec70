use std::env;

use flexi_logger::{FileSpec, Logger};
use log::{error, info};

use catjudge::check::{do_check, print_compiler_versions};
use catjudge::context::CatJudgeContext;
use catjudge::error::{CatJudgeError, CatJudgeExit};
use catjudge::judge::judge;
use catjudge::options::{check_options, parse_cli_options, CliAction, Options};
use catjudge::report::{JudgeReport, TRUNC_LOG};
use catjudge::utils::default_format;

const USAGE: &str = "Compile, run, judge and print the response JSON:
  catjudge --user-code (or -u) user-code-path
           [--checker-code (or -c) checker-code-path]
           [--testcase] --input (or -i) input-path --output (or -o) output-path
           (or: --input input-path --output-sha1 ac-chomp-sha1,pe-sha1)
           [--user-stdout path] [--user-stderr path]
           [[--testcase] --input path --output path (or --output-sha1 sha1)] ...

Compile, run and print the response JSON:
  catjudge --skip-checker (implies --keep-stdout)
           --user-code user-code-path
           [--input input-path] ...

Compile, run, print output instead of the JSON response (the \"direct mode\"):
  catjudge user-code-path

Available options: (put these before the first `--input`)
  catjudge [--etc-dir path] [--cache-dir path]
           [--keep-stdout] [--keep-stderr]
           [--threads n]
           [--skip-on-first-failure]
           [--max-cpu-time seconds] [--max-real-time seconds]
           [--max-memory bytes] [--max-output bytes] [--max-stack bytes]
           [--max-checker-cpu-time seconds] [--max-checker-real-time seconds]
           [--max-checker-memory bytes] [--max-checker-output bytes]
           [--max-compiler-cpu-time seconds] [--max-compiler-real-time seconds]
           [--max-compiler-memory bytes] [--max-compiler-output bytes]
           [--env name value] [--env name value] ...

Check the environment:
  catjudge --check

Print compiler / interpreter versions:
  catjudge --compiler-versions      (only list compilers installed)
  catjudge --all-compiler-versions  (including configured but not installed ones)

Print information (help, schema of the response JSON, version):
  catjudge --help (or -h)
  catjudge --json-schema
  catjudge --version (or -v)
";

const JSON_SCHEMA: &str = r##"{
  "$schema": "http://json-schema.org/draft-04/schema#",
  "type": "object",
  "definitions": {
    "compilationResult": {
      "type": "object",
      "description": "The compilation result of the source code",
      "properties": {
        "log": {
          "type": "string",
          "description": "Compiler log, including warnings and errors. Show this to end-users"
        },
        "success": {
          "type": "boolean",
          "description": "Whether compilation has succeeded"
        },
        "error": {
          "type": "string",
          "description": "Internal error message. Should not be visible to end-users. Present only when an internal error (ex. required compiler is not installed) happens"
        }
      },
      "additionalProperties": false,
      "required": ["log", "success"]
    },
    "testcaseResult": {
      "type": "object",
      "properties": {
        "result": {
          "type": "string",
          "enum": [
            "ACCEPTED",
            "PRESENTATION_ERROR",
            "WRONG_ANSWER",
            "NON_ZERO_EXIT_CODE",
            "MEMORY_LIMIT_EXCEEDED",
            "TIME_LIMIT_EXCEEDED",
            "OUTPUT_LIMIT_EXCEEDED",
            "FLOAT_POINT_EXCEPTION",
            "SEGMENTATION_FAULT",
            "RUNTIME_ERROR",
            "INTERNAL_ERROR",
            "SKIPPED"
          ],
          "description": "Judge response for the test case"
        },
        "exceed": {
          "type": "string",
          "enum": [
            "CPU_TIME",
            "REAL_TIME",
            "MEMORY",
            "OUTPUT"
          ],
          "description": "The limit that the program exceeded. Present only when the program has exceeded one limit"
        },
        "time": {
          "type": "number",
          "description": "CPU time used by the program, in seconds. Present only when \"exceed\" is missing, and \"result\" is not \"SKIPPED\" or \"INTERNAL_ERROR\""
        },
        "memory": {
          "type": "number",
          "description": "Peak memory used by the program, in bytes. Present only when \"exceed\" is missing, and \"result\" is not \"SKIPPED\" or \"INTERNAL_ERROR\""
        },
        "exitcode": {
          "type": "number",
          "description": "Exit code of the program. Present only when the program exits normally, and \"result\" is not \"SKIPPED\" or \"INTERNAL_ERROR\""
        },
        "termsig": {
          "type": "number",
          "description": "Signal number that terminates the program. Present only when the program has not exceeded any limit and has exited abnormally (is signaled)"
        },
        "error": {
          "type": "string",
          "description": "Internal error message. Present only when \"result\" is \"INTERNAL_ERROR\". Should not be visible to end-users"
        },
        "stdout": {
          "type": "string",
          "description": "stdout output of the program. Present only when the command line option \"--keep-stdout\" is set"
        },
        "stderr": {
          "type": "string",
          "description": "stderr output of the program. Present only when the command line option \"--keep-stderr\" is set"
        },
        "checkerOutput": {
          "type": "string",
          "description": "Custom checker output (stdout). Present only when a custom checker is used and it writes something to stdout"
        }
      },
      "additionalProperties": false,
      "required": ["result"]
    }
  },
  "properties": {
    "compilation": {
      "$ref": "#/definitions/compilationResult",
      "description": "Compilation result of the user code"
    },
    "checkerCompilation": {
      "$ref": "#/definitions/compilationResult",
      "description": "Compilation result of the custom checker code. Present only when the command line option \"--checker-code\" is provided"
    },
    "testcases": {
      "type": "array",
      "description": "Test case results. Present only when compilation has succeeded",
      "items": {"$ref": "#/definitions/testcaseResult"}
    }
  },
  "additionalProperties": false,
  "required": ["compilation"]
}
"##;

fn print_usage() {
  eprint!("{}", USAGE);
  eprintln!(
    "\nNote:\n  catjudge will truncate any output (compiler log, stdout, stderr, etc.)\n  longer than {} bytes.\n",
    TRUNC_LOG
  );
}

fn print_json_schema() {
  eprint!("{}", JSON_SCHEMA);
}

fn print_version() {
  println!("catjudge v{}", env!("CARGO_PKG_VERSION"));
}

/// stderr line with a foreground color, ensuring a trailing newline
fn print_with_color(content: &str, color: u8) {
  if content.is_empty() {
    return;
  }
  eprint!("\x1b[0m\x1b[{}m{}", color, content);
  if !content.ends_with('\n') {
    eprintln!();
  }
  eprint!("\x1b[0m");
}

fn print_final_result(opts: &Options, report: &JudgeReport) {
  if opts.direct_mode {
    // direct mode is a convenience, skip the JSON and show the raw
    // compiler log and program output
    print_with_color(&report.compilation.log, 33);

    if let Some(testcases) = &report.testcases {
      if let Some(case) = testcases.first() {
        print!("{}", case.stdout.as_deref().unwrap_or(""));
        print_with_color(case.stderr.as_deref().unwrap_or(""), 31);
      }
    }
  } else {
    print!("{}", report.serialize(opts.pretty_print));
  }
}

fn bootstrap() -> Result<(), CatJudgeError> {
  let args: Vec<String> = env::args().collect();
  if args.len() == 1 {
    print_usage();
    return Ok(());
  }

  let debug_mode = env::var_os("DEBUG").is_some()
    || args.iter().any(|arg| arg == "--debug" || arg == "-debug");
  Logger::try_with_str(if debug_mode {
    "catjudge=debug"
  } else {
    "catjudge=info"
  })?
  .log_to_file(
    FileSpec::default()
      .directory(env::var("CATJUDGE_LOG").unwrap_or("./logs/".into()))
      .basename("catjudge")
      .discriminant(format!(
        "{}",
        chrono::offset::Local::now().format("%Y-%m-%d")
      ))
      .suppress_timestamp(),
  )
  .append()
  .format_for_files(default_format)
  .start()?;

  info!("Start running catjudge");

  match parse_cli_options(&args)? {
    CliAction::Help => print_usage(),
    CliAction::JsonSchema => print_json_schema(),
    CliAction::Version => print_version(),
    CliAction::CompilerVersions { only_present, options } => {
      print_compiler_versions(&options, only_present);
    }
    CliAction::Check => do_check()?,
    CliAction::Judge(options) => {
      check_options(&options)?;
      let context = CatJudgeContext::new(&options.cache_dir);
      let report = judge(&context, &options)?;
      print_final_result(&options, &report);
      info!("Running catjudge finished");
    }
  }

  Ok(())
}

fn main() -> CatJudgeExit {
  match bootstrap() {
    Ok(_) => CatJudgeExit::Ok,
    Err(err) => {
      error!("Running catjudge failed: {}", err);
      CatJudgeExit::Err(err)
    }
  }
}
