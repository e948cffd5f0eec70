use catjudge::utils::{
  chomp, chomp_bytes, is_sha1, parse_bytes, remove_space, sha1_hex, shell_escape, to_number,
  truncate_log,
};

mod common;

#[test]
fn it_should_chomp_a_single_newline() {
  common::setup();
  assert_eq!(chomp("3\n"), "3");
  assert_eq!(chomp("3\n\n"), "3\n");
  assert_eq!(chomp("3"), "3");
  assert_eq!(chomp(""), "");
  assert_eq!(chomp_bytes(b"3\n"), b"3");
  assert_eq!(chomp_bytes(b""), b"");
}

#[test]
fn it_should_remove_every_whitespace_kind() {
  common::setup();
  assert_eq!(remove_space(b"1 2\t3\n4\x0b5\x0c6\r7"), b"1234567");
  assert_eq!(remove_space(b""), b"");
}

#[test]
fn it_should_hash_to_lowercase_hex() {
  common::setup();
  assert_eq!(sha1_hex(b""), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
  assert_eq!(sha1_hex(b"3"), "77de68daecd823babbb58edb1c8e14d7106e83bb");
}

#[test]
fn it_should_validate_sha1_strictly() {
  common::setup();
  assert!(is_sha1("da39a3ee5e6b4b0d3255bfef95601890afd80709"));
  assert!(!is_sha1("da39a3ee5e6b4b0d3255bfef95601890afd8070"));
  assert!(!is_sha1("da39a3ee5e6b4b0d3255bfef95601890afd807090"));
  // characters between '9' and 'a' in ASCII must not slip through
  assert!(!is_sha1(":::::::::::::::::::::::::::::::::::::::;"));
  assert!(!is_sha1("DA39A3EE5E6B4B0D3255BFEF95601890AFD80709"));
}

#[test]
fn it_should_parse_byte_suffixes() {
  common::setup();
  assert_eq!(parse_bytes("123"), 123);
  assert_eq!(parse_bytes("1k"), 1024);
  assert_eq!(parse_bytes("64m"), 64 << 20);
  assert_eq!(parse_bytes("2G"), 2 << 30);
  assert_eq!(parse_bytes("100kb"), 100 << 10);
  assert_eq!(parse_bytes("0.5mb"), 1 << 19);
  assert_eq!(parse_bytes("garbage"), 0);
}

#[test]
fn it_should_parse_numbers_leniently() {
  common::setup();
  assert_eq!(to_number("0.5"), 0.5);
  assert_eq!(to_number("3"), 3.0);
  assert_eq!(to_number("abc"), 0.0);
}

#[test]
fn it_should_truncate_logs_by_bytes() {
  common::setup();
  assert_eq!(truncate_log("hello", 10), "hello");
  assert_eq!(truncate_log("hello", 4), "hell");
  assert_eq!(truncate_log("", 4), "");
}

#[test]
fn it_should_escape_shell_words() {
  common::setup();
  assert_eq!(shell_escape("g++"), "g++");
  assert_eq!(shell_escape("a b"), "'a b'");
  assert_eq!(shell_escape("don't"), "'don'\"'\"'t'");
}
