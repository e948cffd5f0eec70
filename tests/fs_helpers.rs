use catjudge::utils::fs;
use catjudge::utils::ScopedFileLock;
use tempfile::tempdir;

mod common;

#[test]
fn it_should_join_with_one_separator() {
  common::setup();
  assert_eq!(fs::join("a", ""), "a");
  assert_eq!(fs::join("", "b"), "b");
  assert_eq!(fs::join("a", "b"), "a/b");
  assert_eq!(fs::join("a/", "b"), "a/b");
  assert_eq!(fs::join("a", "/b"), "a/b");
  assert_eq!(fs::join("a/", "/b"), "a/b");
  assert_eq!(fs::join3("a", "b", "c"), "a/b/c");
}

#[test]
fn it_should_split_path_components() {
  common::setup();
  assert_eq!(fs::basename("/path.to/bla.clang.cc"), "bla.clang.cc");
  assert_eq!(fs::basename("plain"), "plain");
  assert_eq!(fs::dirname("/path.to/bla.cc"), "/path.to");
  assert_eq!(fs::dirname("plain"), "");
  assert_eq!(fs::extname("/path.to/bla.clang.cc"), ".cc");
  assert_eq!(fs::extname("noext"), "");
}

#[test]
fn it_should_mkdir_p_idempotently() {
  common::setup();
  let dir = tempdir().unwrap();
  let root = dir.path().to_string_lossy().to_string();
  let nested = fs::join3(&root, "a/b", "c");
  assert!(fs::mkdir_p(&nested).is_ok());
  assert!(fs::mkdir_p(&nested).is_ok());
  assert!(fs::is_dir(&nested));
}

#[test]
fn it_should_touch_and_keep_content() {
  common::setup();
  let dir = tempdir().unwrap();
  let path = fs::join(&dir.path().to_string_lossy(), "file");
  assert!(fs::touch(&path));
  assert!(fs::exists(&path));
  fs::write(&path, b"content").unwrap();
  assert!(fs::touch(&path));
  assert_eq!(fs::read(&path), "content");
}

#[test]
fn it_should_rm_rf_recursively() {
  common::setup();
  let dir = tempdir().unwrap();
  let root = fs::join(&dir.path().to_string_lossy(), "tree");
  fs::mkdir_p(&fs::join(&root, "sub/subsub")).unwrap();
  fs::write(&fs::join(&root, "file"), b"x").unwrap();
  fs::write(&fs::join(&root, "sub/file"), b"y").unwrap();
  assert!(fs::rm_rf(&root));
  assert!(!fs::exists(&root));
}

#[test]
fn it_should_scandir_sorted() {
  common::setup();
  let dir = tempdir().unwrap();
  let root = dir.path().to_string_lossy().to_string();
  fs::touch(&fs::join(&root, "b"));
  fs::touch(&fs::join(&root, "a"));
  fs::touch(&fs::join(&root, "c"));
  assert_eq!(fs::scandir(&root), vec!["a", "b", "c"]);
}

#[test]
fn it_should_bound_nread() {
  common::setup();
  let dir = tempdir().unwrap();
  let path = fs::join(&dir.path().to_string_lossy(), "file");
  fs::write(&path, b"0123456789").unwrap();
  assert_eq!(fs::nread(&path, 4), "0123");
  assert_eq!(fs::nread(&path, 100), "0123456789");
  assert_eq!(fs::nread("/no/such/file", 4), "");
}

#[test]
fn it_should_lock_scoped() {
  common::setup();
  let dir = tempdir().unwrap();
  let path = fs::join(&dir.path().to_string_lossy(), "lockfile");
  fs::touch(&path);
  {
    let _lock = ScopedFileLock::new(&path);
  }
  // locking a missing path must not fail the caller
  let _lock = ScopedFileLock::new("/no/such/lockfile");
}
