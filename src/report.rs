use serde::Serialize;

/// Truncate any captured output (compiler log, stdout, stderr, ...) to
/// this many bytes before it enters the response
pub const TRUNC_LOG: usize = 65535;

/// Judge response for a single test case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestcaseStatus {
  Accepted,
  PresentationError,
  WrongAnswer,
  NonZeroExitCode,
  MemoryLimitExceeded,
  TimeLimitExceeded,
  OutputLimitExceeded,
  FloatPointException,
  SegmentationFault,
  RuntimeError,
  InternalError,
  Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestcaseReport {
  pub result: TestcaseStatus,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub exceed: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub time: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub memory: Option<i64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub exitcode: Option<i32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub termsig: Option<i32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub stdout: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub stderr: Option<String>,
  #[serde(rename = "checkerOutput", skip_serializing_if = "Option::is_none")]
  pub checker_output: Option<String>,
}

impl TestcaseReport {
  pub fn new(result: TestcaseStatus) -> Self {
    TestcaseReport {
      result,
      exceed: None,
      time: None,
      memory: None,
      exitcode: None,
      termsig: None,
      error: None,
      stdout: None,
      stderr: None,
      checker_output: None,
    }
  }

  pub fn skipped() -> Self {
    Self::new(TestcaseStatus::Skipped)
  }
}

/// Compilation result of one source file
#[derive(Debug, Clone, Serialize)]
pub struct CompilationReport {
  pub log: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
  pub success: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct JudgeReport {
  pub compilation: CompilationReport,
  #[serde(rename = "checkerCompilation", skip_serializing_if = "Option::is_none")]
  pub checker_compilation: Option<CompilationReport>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub testcases: Option<Vec<TestcaseReport>>,
}

impl JudgeReport {
  pub fn serialize(&self, pretty: bool) -> String {
    if pretty {
      serde_json::to_string_pretty(self).unwrap_or_default()
    } else {
      serde_json::to_string(self).unwrap_or_default()
    }
  }
}
