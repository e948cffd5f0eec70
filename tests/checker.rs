use catjudge::checker::run_standard_checker;
use catjudge::options::Testcase;
use catjudge::report::{TestcaseReport, TestcaseStatus};
use catjudge::utils::fs;
use catjudge::utils::sha1_hex;
use tempfile::tempdir;

mod common;

fn check(case: &Testcase, user_output: &[u8]) -> TestcaseStatus {
  let dir = tempdir().unwrap();
  let user_path = fs::join(&dir.path().to_string_lossy(), "user.out");
  fs::write(&user_path, user_output).unwrap();

  let mut report = TestcaseReport::new(TestcaseStatus::InternalError);
  run_standard_checker(&mut report, case, &user_path);
  report.result
}

fn file_case(expected: &[u8]) -> (tempfile::TempDir, Testcase) {
  let dir = tempdir().unwrap();
  let output_path = fs::join(&dir.path().to_string_lossy(), "expected.out");
  fs::write(&output_path, expected).unwrap();

  let mut case = Testcase::new();
  case.output_path = output_path;
  (dir, case)
}

#[test]
fn it_should_accept_exact_output() {
  common::setup();
  let (_dir, case) = file_case(b"3\n");
  assert_eq!(check(&case, b"3\n"), TestcaseStatus::Accepted);
  // a single trailing newline is chomped on both sides
  assert_eq!(check(&case, b"3"), TestcaseStatus::Accepted);
}

#[test]
fn it_should_report_presentation_error_on_whitespace() {
  common::setup();
  let (_dir, case) = file_case(b"3\n");
  assert_eq!(check(&case, b"3 \n"), TestcaseStatus::PresentationError);
  assert_eq!(check(&case, b" 3\n"), TestcaseStatus::PresentationError);
  assert_eq!(check(&case, b"3\n\n"), TestcaseStatus::PresentationError);
}

#[test]
fn it_should_reject_wrong_output() {
  common::setup();
  let (_dir, case) = file_case(b"3\n");
  assert_eq!(check(&case, b"4\n"), TestcaseStatus::WrongAnswer);
  assert_eq!(check(&case, b""), TestcaseStatus::WrongAnswer);
}

#[test]
fn it_should_judge_by_sha1_without_reading_the_answer() {
  common::setup();
  let mut case = Testcase::new();
  case.output_sha1 = sha1_hex(b"3");

  assert_eq!(check(&case, b"3\n"), TestcaseStatus::Accepted);
  assert_eq!(check(&case, b"3"), TestcaseStatus::Accepted);
  // no PE hash configured: whitespace damage is a wrong answer
  assert_eq!(check(&case, b"3 "), TestcaseStatus::WrongAnswer);
  assert_eq!(check(&case, b"4"), TestcaseStatus::WrongAnswer);
}

#[test]
fn it_should_short_circuit_presentation_error_by_sha1() {
  common::setup();
  let mut case = Testcase::new();
  case.output_sha1 = sha1_hex(b"1 2 3");
  // the PE digest is taken over the whitespace-stripped answer
  case.output_pe_sha1 = sha1_hex(b"123");

  assert_eq!(check(&case, b"1 2 3\n"), TestcaseStatus::Accepted);
  assert_eq!(check(&case, b"1 2  3\n"), TestcaseStatus::PresentationError);
  assert_eq!(check(&case, b"1\t2\n3\n"), TestcaseStatus::PresentationError);
  assert_eq!(check(&case, b"1 2 4\n"), TestcaseStatus::WrongAnswer);
}
