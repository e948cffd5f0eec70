use std::os::unix::prelude::RawFd;

use nix::{
  fcntl::OFlag,
  unistd::{self, close, pipe2},
};

use crate::error::CatJudgeError;

pub struct CatJudgePipe(RawFd, RawFd);

pub struct CatJudgeReadPipe(RawFd);

pub struct CatJudgeWritePipe(RawFd);

impl CatJudgePipe {
  pub fn new() -> Result<Self, CatJudgeError> {
    let result = pipe2(OFlag::O_CLOEXEC)?;
    Ok(CatJudgePipe(result.0, result.1))
  }

  pub fn read(self) -> Result<CatJudgeReadPipe, CatJudgeError> {
    close(self.1)?;
    Ok(CatJudgeReadPipe(self.0))
  }

  pub fn write(self) -> Result<CatJudgeWritePipe, CatJudgeError> {
    close(self.0)?;
    Ok(CatJudgeWritePipe(self.1))
  }
}

impl CatJudgeReadPipe {
  /// Read a single byte, `None` on EOF or error
  pub fn read_byte(&self) -> Option<u8> {
    let mut buf = [0u8; 1];
    match unistd::read(self.0, &mut buf) {
      Ok(1) => Some(buf[0]),
      _ => None,
    }
  }
}

impl Drop for CatJudgeReadPipe {
  fn drop(&mut self) {
    let _ = close(self.0);
  }
}

impl CatJudgeWritePipe {
  pub fn fd(&self) -> RawFd {
    self.0
  }
}

impl Drop for CatJudgeWritePipe {
  fn drop(&mut self) {
    let _ = close(self.0);
  }
}
