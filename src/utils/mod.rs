use std::ffi::CString;

use flexi_logger::DeferredNow;
use log::Record;
use sha1::{Digest, Sha1};

pub use fs::ScopedFileLock;
pub use pipe::{CatJudgePipe, CatJudgeReadPipe, CatJudgeWritePipe};

pub mod fs;
pub mod lock;
pub mod pipe;

/// A logline-formatter that produces log lines like <br>
/// ```[datetime: INFO] prepare_chroot: cc/compile```
#[allow(unused)]
pub fn default_format(
  w: &mut dyn std::io::Write,
  now: &mut DeferredNow,
  record: &Record,
) -> Result<(), std::io::Error> {
  write!(
    w,
    "[{}: {:5}] {}",
    now.format("%Y-%m-%d %H:%M:%S"),
    record.level(),
    record.args()
  )
}

pub(crate) fn into_c_string(string: &str) -> CString {
  CString::new(string).expect("Convert &str to CString should work")
}

/// Remove a single trailing newline
pub fn chomp(text: &str) -> &str {
  text.strip_suffix('\n').unwrap_or(text)
}

pub fn chomp_bytes(bytes: &[u8]) -> &[u8] {
  match bytes.last() {
    Some(b'\n') => &bytes[..bytes.len() - 1],
    _ => bytes,
  }
}

// C isspace(3) set, not u8::is_ascii_whitespace (which misses VT)
fn is_space(byte: u8) -> bool {
  matches!(byte, b' ' | b'\t' | b'\n' | b'\x0b' | b'\x0c' | b'\r')
}

pub fn remove_space(bytes: &[u8]) -> Vec<u8> {
  bytes.iter().copied().filter(|b| !is_space(*b)).collect()
}

/// Truncate to at most `len` bytes, keeping the result valid UTF-8
pub fn truncate_log(text: &str, len: usize) -> String {
  if text.len() <= len {
    return text.to_string();
  }
  String::from_utf8_lossy(&text.as_bytes()[..len]).into_owned()
}

pub fn sha1_hex(bytes: &[u8]) -> String {
  const HEX: &[u8; 16] = b"0123456789abcdef";
  let mut hasher = Sha1::new();
  hasher.update(bytes);
  let digest = hasher.finalize();
  let mut out = String::with_capacity(digest.len() * 2);
  for byte in digest {
    out.push(HEX[(byte >> 4) as usize] as char);
    out.push(HEX[(byte & 0x0f) as usize] as char);
  }
  out
}

/// 40 hex digits, strictly [0-9a-f]
pub fn is_sha1(text: &str) -> bool {
  text.len() == 40 && text.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

pub fn to_number(text: &str) -> f64 {
  numeric_prefix(text).parse().unwrap_or(0.0)
}

/// Parse a byte count, accepting k/K/m/M/g/G suffixes (binary, x1024),
/// with an optional trailing b/B
pub fn parse_bytes(text: &str) -> i64 {
  let bytes = text.as_bytes();
  let mut pos = bytes.len();
  if pos > 1 && (bytes[pos - 1] == b'b' || bytes[pos - 1] == b'B') {
    pos -= 1;
  }
  let multiplier: i64 = if pos > 1 {
    match bytes[pos - 1] {
      b'g' | b'G' => 1 << 30,
      b'm' | b'M' => 1 << 20,
      b'k' | b'K' => 1 << 10,
      _ => 1,
    }
  } else {
    1
  };
  let digits = numeric_prefix(text);
  if multiplier == 1 {
    digits.parse().unwrap_or(0)
  } else {
    // read as a double so that the user can use things like 0.5mb
    (digits.parse::<f64>().unwrap_or(0.0) * multiplier as f64) as i64
  }
}

fn numeric_prefix(text: &str) -> &str {
  let text = text.trim_start();
  let mut end = 0;
  for (i, c) in text.char_indices() {
    if c.is_ascii_digit() || c == '.' || (i == 0 && (c == '-' || c == '+')) {
      end = i + c.len_utf8();
    } else {
      break;
    }
  }
  &text[..end]
}

pub fn shell_escape(text: &str) -> String {
  const SAFE_CHARS: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_-+=./$:";
  if !text.is_empty() && text.chars().all(|c| SAFE_CHARS.contains(c)) {
    return text.to_string();
  }
  let mut result = String::from("'");
  for c in text.chars() {
    if c == '\'' {
      result.push_str("'\"'\"'");
    } else {
      result.push(c);
    }
  }
  result.push('\'');
  result
}

pub fn shell_escape_list(items: &[String]) -> String {
  items
    .iter()
    .map(|item| shell_escape(item))
    .collect::<Vec<String>>()
    .join(" ")
}
