use catjudge::options::{parse_cli_options, CliAction, Options};
use catjudge::utils::fs;
use tempfile::tempdir;

mod common;

fn args(items: &[&str]) -> Vec<String> {
  let mut result = vec!["catjudge".to_string()];
  result.extend(items.iter().map(|item| item.to_string()));
  result
}

fn parse_judge(items: &[&str]) -> Options {
  match parse_cli_options(&args(items)).unwrap() {
    CliAction::Judge(options) => options,
    _ => panic!("expected a judge action"),
  }
}

#[test]
fn it_should_group_testcases_by_input() {
  common::setup();
  let options = parse_judge(&[
    "--user-code", "sol.cc",
    "--input", "1.in", "--output", "1.out",
    "--input", "2.in", "--output-sha1",
    "da39a3ee5e6b4b0d3255bfef95601890afd80709,77de68daecd823babbb58edb1c8e14d7106e83bb",
    "--testcase", "--input", "3.in", "--output", "3.out",
  ]);

  assert_eq!(options.user_code_path, "sol.cc");
  assert_eq!(options.cases.len(), 3);
  assert_eq!(options.cases[0].input_path, "1.in");
  assert_eq!(options.cases[0].output_path, "1.out");
  assert_eq!(options.cases[1].input_path, "2.in");
  assert_eq!(options.cases[1].output_path, "");
  assert_eq!(
    options.cases[1].output_sha1,
    "da39a3ee5e6b4b0d3255bfef95601890afd80709"
  );
  assert_eq!(
    options.cases[1].output_pe_sha1,
    "77de68daecd823babbb58edb1c8e14d7106e83bb"
  );
  assert_eq!(options.cases[2].input_path, "3.in");
}

#[test]
fn it_should_keep_limits_sticky_across_cases() {
  common::setup();
  let options = parse_judge(&[
    "-u", "sol.cc",
    "--max-cpu-time", "2",
    "-i", "a.in", "-o", "a.out",
    "-i", "b.in", "-o", "b.out",
    "--max-cpu-time", "3.5",
    "--max-memory", "64m",
    "-i", "c.in", "-o", "c.out",
  ]);

  assert_eq!(options.cases.len(), 3);
  assert_eq!(options.cases[0].runtime_limit.cpu_time, 2.0);
  // the limit flag between b and c modified the case under construction
  assert_eq!(options.cases[1].runtime_limit.cpu_time, 3.5);
  assert_eq!(options.cases[2].runtime_limit.cpu_time, 3.5);
  assert_eq!(options.cases[2].runtime_limit.memory, 64 << 20);
}

#[test]
fn it_should_parse_pe_sha1_as_optional() {
  common::setup();
  let options = parse_judge(&[
    "-u", "sol.cc",
    "-i", "a.in",
    "--osha1", "da39a3ee5e6b4b0d3255bfef95601890afd80709",
  ]);
  assert_eq!(
    options.cases[0].output_sha1,
    "da39a3ee5e6b4b0d3255bfef95601890afd80709"
  );
  assert_eq!(options.cases[0].output_pe_sha1, "");
}

#[test]
fn it_should_collect_env_pairs() {
  common::setup();
  let options = parse_judge(&[
    "-u", "sol.cc", "-i", "a.in", "-o", "a.out",
    "--env", "A", "1", "--env", "B", "2",
  ]);
  assert_eq!(
    options.envs,
    vec![("A".to_string(), "1".to_string()), ("B".to_string(), "2".to_string())]
  );
}

#[test]
fn it_should_force_one_thread_with_skip_on_first_failure() {
  common::setup();
  let options = parse_judge(&["-u", "sol.cc", "-i", "a.in", "-o", "a.out", "--skip-on-first-failure"]);
  assert!(options.skip_on_first_failure);
  assert_eq!(options.nthread, 1);

  let result = parse_cli_options(&args(&[
    "-u", "sol.cc", "--threads", "2", "--skip-on-first-failure",
  ]));
  assert!(result.is_err());
}

#[test]
fn it_should_reject_unknown_options_and_missing_values() {
  common::setup();
  assert!(parse_cli_options(&args(&["--no-such-option"])).is_err());
  assert!(parse_cli_options(&args(&["--user-code"])).is_err());
  assert!(parse_cli_options(&args(&["--env", "only-name"])).is_err());
}

#[test]
fn it_should_return_immediate_actions() {
  common::setup();
  assert!(matches!(
    parse_cli_options(&args(&["--help"])).unwrap(),
    CliAction::Help
  ));
  assert!(matches!(
    parse_cli_options(&args(&["--version"])).unwrap(),
    CliAction::Version
  ));
  assert!(matches!(
    parse_cli_options(&args(&["--json-schema"])).unwrap(),
    CliAction::JsonSchema
  ));
}

#[test]
fn it_should_add_a_synthetic_case_with_skip_checker() {
  common::setup();
  let options = parse_judge(&["-u", "sol.cc", "--skip-checker"]);
  assert!(options.skip_checker);
  // --skip-checker implies --keep-stdout
  assert!(options.keep_stdout);
  assert_eq!(options.cases.len(), 1);
  assert!(!options.cases[0].input_path.is_empty());
}

#[test]
fn it_should_enter_direct_mode_for_a_supported_positional() {
  common::setup();
  let dir = tempdir().unwrap();
  let etc = dir.path().to_string_lossy().to_string();
  fs::mkdir_p(&fs::join(&etc, "cc")).unwrap();
  fs::write(&fs::join(&etc, "cc/version.cmd_list"), b"g++\n--version\n").unwrap();

  let options = parse_judge(&["--etc-dir", &etc, "sol.cc"]);
  assert!(options.direct_mode);
  assert!(options.skip_checker);
  assert!(options.keep_stdout);
  assert!(options.keep_stderr);
  assert_eq!(options.user_code_path, "sol.cc");
  assert_eq!(options.cases.len(), 1);

  // an unsupported extension is not a valid option
  let result = parse_cli_options(&args(&["--etc-dir", &etc, "sol.py"]));
  assert!(result.is_err());
}
