use catjudge::config::{
  get_config_content, get_config_list, get_config_path, get_exe_name, get_src_name,
  is_language_supported,
};
use catjudge::utils::fs;
use tempfile::tempdir;

mod common;

fn make_etc() -> (tempfile::TempDir, String) {
  let dir = tempdir().unwrap();
  let etc = dir.path().to_string_lossy().to_string();

  fs::mkdir_p(&fs::join(&etc, "cc")).unwrap();
  fs::mkdir_p(&fs::join(&etc, "clang.cc")).unwrap();
  fs::mkdir_p(&fs::join(&etc, "_default")).unwrap();

  fs::write(
    &fs::join(&etc, "cc/compile.cmd_list"),
    b"# compile with gcc\ng++\n  -Wall\n$src\n-o\n$exe\n",
  )
  .unwrap();
  fs::write(&fs::join(&etc, "cc/version.cmd_list"), b"g++\n--version\n").unwrap();
  fs::write(&fs::join(&etc, "clang.cc/compile.cmd_list"), b"clang++\n").unwrap();
  fs::write(&fs::join(&etc, "_default/fallback.conf"), b"hello\n").unwrap();

  (dir, etc)
}

#[test]
fn it_should_resolve_by_suffix_chain() {
  common::setup();
  let (_dir, etc) = make_etc();

  let path = get_config_path(&etc, "/path.to/bla.clang.cc", "compile.cmd_list", false);
  assert_eq!(path, fs::join(&etc, "clang.cc/compile.cmd_list"));

  // the clang.cc variant has no version.cmd_list, fall back to cc
  let path = get_config_path(&etc, "/path.to/bla.clang.cc", "version.cmd_list", false);
  assert_eq!(path, fs::join(&etc, "cc/version.cmd_list"));

  let path = get_config_path(&etc, "foo.cc", "compile.cmd_list", false);
  assert_eq!(path, fs::join(&etc, "cc/compile.cmd_list"));
}

#[test]
fn it_should_fall_back_to_default_dir() {
  common::setup();
  let (_dir, etc) = make_etc();

  let path = get_config_path(&etc, "foo.py", "fallback.conf", false);
  assert_eq!(path, fs::join(&etc, "_default/fallback.conf"));

  // strict mode never looks at _default
  let path = get_config_path(&etc, "foo.py", "fallback.conf", true);
  assert_eq!(path, "");

  let path = get_config_path(&etc, "foo.py", "missing.conf", false);
  assert_eq!(path, "");
}

#[test]
fn it_should_parse_config_lists() {
  common::setup();
  let (_dir, etc) = make_etc();

  let list = get_config_list(&etc, "foo.cc", "compile.cmd_list", false);
  assert_eq!(list, vec!["g++", "-Wall", "$src", "-o", "$exe"]);

  let list = get_config_list(&etc, "foo.cc", "missing.cmd_list", false);
  assert!(list.is_empty());
}

#[test]
fn it_should_chomp_content_and_fall_back() {
  common::setup();
  let (_dir, etc) = make_etc();

  let content = get_config_content(&etc, "foo.py", "fallback.conf", "", false);
  assert_eq!(content, "hello");

  let content = get_config_content(&etc, "foo.py", "missing.conf", "default", false);
  assert_eq!(content, "default");
}

#[test]
fn it_should_derive_src_and_exe_names() {
  common::setup();
  let (_dir, etc) = make_etc();

  assert_eq!(get_src_name(&etc, "/path.to/foo.cc"), "a.cc");
  assert_eq!(get_exe_name(&etc, "/path.to/foo.cc"), "a.out");

  fs::write(&fs::join(&etc, "cc/compile.src_name"), b"main.cc\n").unwrap();
  fs::write(&fs::join(&etc, "cc/compile.exe_name"), b"main\n").unwrap();
  assert_eq!(get_src_name(&etc, "/path.to/foo.cc"), "main.cc");
  assert_eq!(get_exe_name(&etc, "/path.to/foo.cc"), "main");
}

#[test]
fn it_should_detect_supported_languages() {
  common::setup();
  let (_dir, etc) = make_etc();

  assert!(is_language_supported(&etc, "foo.cc"));
  assert!(is_language_supported(&etc, "foo.clang.cc"));
  assert!(!is_language_supported(&etc, "foo.py"));
}
