use catjudge::context::{CatJudgeContext, SUBDIR_USER_CODE};
use catjudge::utils::fs;
use catjudge::utils::sha1_hex;
use tempfile::tempdir;

mod common;

#[test]
fn it_should_derive_work_dir_from_content_hash() {
  common::setup();
  let dir = tempdir().unwrap();
  let root = dir.path().to_string_lossy().to_string();
  let cache = fs::join(&root, "cache");
  let base = fs::join(&cache, SUBDIR_USER_CODE);

  let code_a = fs::join(&root, "a.cc");
  let code_b = fs::join(&root, "b.cc");
  fs::write(&code_a, b"int main() { return 0; }\n").unwrap();
  fs::write(&code_b, b"int main() { return 0; }\n").unwrap();

  let context = CatJudgeContext::new(&cache);
  let dir_a = context.work_dir(&base, &code_a).unwrap();
  let dir_b = context.work_dir(&base, &code_b).unwrap();

  // the workdir is a pure function of the file content
  assert_eq!(dir_a, dir_b);

  let sha1 = sha1_hex(b"int main() { return 0; }\n");
  assert_eq!(dir_a, fs::join3(&base, &sha1[..2], &sha1[2..]));

  // memoized per path
  assert_eq!(context.work_dir(&base, &code_a).unwrap(), dir_a);
}

#[test]
fn it_should_allocate_unique_temp_files() {
  common::setup();
  let dir = tempdir().unwrap();
  let cache = dir.path().to_string_lossy().to_string();
  let context = CatJudgeContext::new(&cache);

  let first = context.temp_file_path("out").unwrap();
  let second = context.temp_file_path("out").unwrap();
  assert_ne!(first, second);
  assert!(fs::exists(&first));
  assert!(fs::exists(&second));
  assert!(first.contains(&fs::join(&cache, "tmp")));
}

#[test]
fn it_should_clean_the_temp_root_on_drop() {
  common::setup();
  std::env::remove_var("DEBUG");
  std::env::remove_var("NOCLEANUP");

  let dir = tempdir().unwrap();
  let cache = dir.path().to_string_lossy().to_string();

  let tmp_root = {
    let context = CatJudgeContext::new(&cache);
    let path = context.temp_file_path("out").unwrap();
    assert!(fs::exists(&path));
    context.process_tmp_dir().unwrap()
  };
  assert!(!fs::exists(&tmp_root));
}
