use catjudge::lrun::parse_lrun_output;

mod common;

#[test]
fn it_should_parse_a_finished_run() {
  common::setup();
  let output = "\
MEMORY   262144
CPUTIME  0.012
REALTIME 0.034
SIGNALED 0
EXITCODE 0
TERMSIG  0
EXCEED   none
";
  let result = parse_lrun_output(output);
  assert_eq!(result.error, "");
  assert_eq!(result.memory, 262144);
  assert!((result.cpu_time - 0.012).abs() < 1e-9);
  assert!((result.real_time - 0.034).abs() < 1e-9);
  assert!(!result.signaled);
  assert_eq!(result.exit_code, 0);
  assert_eq!(result.term_sig, 0);
  assert_eq!(result.exceed, "");
}

#[test]
fn it_should_parse_a_signaled_run() {
  common::setup();
  let output = "\
MEMORY   1048576
CPUTIME  0.002
REALTIME 0.004
SIGNALED 1
EXITCODE 0
TERMSIG  11
EXCEED   none
";
  let result = parse_lrun_output(output);
  assert!(result.signaled);
  assert_eq!(result.term_sig, 11);
}

#[test]
fn it_should_parse_an_exceeded_run() {
  common::setup();
  let output = "\
MEMORY   8388608
CPUTIME  0.503
REALTIME 0.641
SIGNALED 0
EXITCODE 0
TERMSIG  9
EXCEED   CPU_TIME
";
  let result = parse_lrun_output(output);
  assert_eq!(result.exceed, "CPU_TIME");
}

#[test]
fn it_should_report_malformed_values() {
  common::setup();
  let result = parse_lrun_output("MEMORY   garbage\n");
  assert_eq!(result.error, "cannot read MEMORY");

  let result = parse_lrun_output("SIGNALED 2\n");
  assert_eq!(result.error, "cannot read SIGNALED");

  // unknown keys and short lines are ignored
  let result = parse_lrun_output("WHATEVER value\nX\n");
  assert_eq!(result.error, "");
}
