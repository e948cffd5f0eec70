use std::{
  error::Error,
  fmt::{Debug, Display},
  process::{ExitCode, Termination},
};

use flexi_logger::FlexiLoggerError;
use nix::{errno::Errno, libc::STDOUT_FILENO, unistd::isatty};

pub enum CatJudgeError {
  Cli(String),
  Config(String),
  Fs(String),
  Fork(String),
  Exec(String),
  Nix(Errno),
  Logger(FlexiLoggerError),
}

#[allow(unused)]
pub enum CatJudgeExit {
  Ok,
  Err(CatJudgeError),
}

impl CatJudgeError {
  pub fn cli<MS: Into<String>>(msg: MS) -> CatJudgeError {
    CatJudgeError::Cli(msg.into())
  }

  pub fn config<MS: Into<String>>(msg: MS) -> CatJudgeError {
    CatJudgeError::Config(msg.into())
  }

  pub fn fs<MS: Into<String>>(msg: MS) -> CatJudgeError {
    CatJudgeError::Fs(msg.into())
  }

  pub fn fork<MS: Into<String>>(msg: MS) -> CatJudgeError {
    CatJudgeError::Fork(msg.into())
  }

  pub fn exec<MS: Into<String>>(msg: MS) -> CatJudgeError {
    CatJudgeError::Exec(msg.into())
  }
}

impl Debug for CatJudgeError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    std::fmt::Display::fmt(&self, f)
  }
}

impl Display for CatJudgeError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match &self {
      CatJudgeError::Cli(msg) => f.write_fmt(format_args!("CatJudge CLI Error: {}", msg)),
      CatJudgeError::Config(msg) => f.write_fmt(format_args!("CatJudge Config Error: {}", msg)),
      CatJudgeError::Fs(msg) => {
        f.write_fmt(format_args!("CatJudge File System Error: {}", msg))
      }
      CatJudgeError::Fork(msg) => f.write_fmt(format_args!("CatJudge Fork Error: {}", msg)),
      CatJudgeError::Exec(msg) => f.write_fmt(format_args!("CatJudge Exec Error: {}", msg)),
      CatJudgeError::Nix(errno) => f.write_fmt(format_args!("CatJudge Nix Error: {}", errno)),
      CatJudgeError::Logger(err) => f.write_fmt(format_args!("CatJudge Logger Error: {}", err)),
    }
  }
}

impl From<Errno> for CatJudgeError {
  fn from(errno: Errno) -> Self {
    CatJudgeError::Nix(errno)
  }
}

impl From<std::io::Error> for CatJudgeError {
  fn from(err: std::io::Error) -> Self {
    CatJudgeError::Fs(err.to_string())
  }
}

impl From<FlexiLoggerError> for CatJudgeError {
  fn from(err: FlexiLoggerError) -> Self {
    CatJudgeError::Logger(err)
  }
}

impl Error for CatJudgeError {}

impl Termination for CatJudgeExit {
  fn report(self) -> ExitCode {
    match self {
      CatJudgeExit::Ok => ExitCode::SUCCESS.report(),
      CatJudgeExit::Err(err) => {
        let text = format!("{}", err);
        let text = match text.split_once(": ") {
          Some((prefix, message)) => {
            let is_tty = isatty(STDOUT_FILENO).unwrap_or(false);
            if is_tty {
              format!("\x1b[1m\x1b[91m{}\x1b[39m\x1b[22m  {}", prefix, message)
            } else {
              format!(
                "{{\n  \"ok\": false,\n  \"type\": \"{}\",\n  \"message\": \"{}\"\n}}",
                prefix,
                message.replace('\"', "\\\"").replace('\n', "\\n")
              )
            }
          }
          None => {
            format!("{}", err)
          }
        };
        eprintln!("{}", text);
        ExitCode::FAILURE.report()
      }
    }
  }
}
