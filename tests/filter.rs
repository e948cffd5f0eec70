use catjudge::lrun::{filter_user_args, get_mappings, substitute, LrunArgs};
use catjudge::options::Limit;
use catjudge::utils::fs;
use tempfile::tempdir;

mod common;

fn make_cache(fanotify: &str) -> (tempfile::TempDir, String) {
  let dir = tempdir().unwrap();
  let cache = dir.path().to_string_lossy().to_string();
  fs::mkdir_p(&fs::join(&cache, "kconfig")).unwrap();
  fs::write(
    &fs::join(&cache, "kconfig/CONFIG_FANOTIFY_ACCESS_PERMISSIONS"),
    fanotify.as_bytes(),
  )
  .unwrap();
  (dir, cache)
}

fn args(items: &[&str]) -> Vec<String> {
  items.iter().map(|item| item.to_string()).collect()
}

#[test]
fn it_should_pass_whitelisted_args() {
  common::setup();
  let (_dir, cache) = make_cache("y");

  let input = args(&["--syscalls", "!kill", "--env", "A", "B", "--hostname", "judge"]);
  assert_eq!(filter_user_args(input.clone(), &cache), input);
}

#[test]
fn it_should_truncate_at_first_unsafe_arg() {
  common::setup();
  let (_dir, cache) = make_cache("y");

  let input = args(&["--env", "A", "B", "--chroot", "/", "--syscalls", "!kill"]);
  assert_eq!(
    filter_user_args(input, &cache),
    args(&["--env", "A", "B"])
  );
}

#[test]
fn it_should_not_interpret_value_tokens() {
  common::setup();
  let (_dir, cache) = make_cache("y");

  // "--chroot" here is the value of --env, not a flag
  let input = args(&["--env", "--chroot", "v", "--bindfs", "a", "b"]);
  assert_eq!(
    filter_user_args(input, &cache),
    args(&["--env", "--chroot", "v"])
  );
}

#[test]
fn it_should_drop_fopen_filter_without_kernel_support() {
  common::setup();
  let (_dir, cache) = make_cache("n");

  let input = args(&["--fopen-filter", "/etc/*:deny", "x", "--syscalls", "!kill"]);
  assert_eq!(
    filter_user_args(input, &cache),
    args(&["--syscalls", "!kill"])
  );

  // --tmpfs and --env still pass
  let input = args(&["--tmpfs", "/tmp", "1m", "--env", "A", "B"]);
  assert_eq!(filter_user_args(input.clone(), &cache), input);
}

#[test]
fn it_should_keep_fopen_filter_with_kernel_support() {
  common::setup();
  let (_dir, cache) = make_cache("y");

  let input = args(&["--fopen-filter", "/etc/*:deny", "x"]);
  assert_eq!(filter_user_args(input.clone(), &cache), input);
}

#[test]
fn it_should_filter_idempotently() {
  common::setup();
  for fanotify in ["y", "n"] {
    let (_dir, cache) = make_cache(fanotify);
    let inputs = [
      args(&["--syscalls", "!kill", "--unknown", "x"]),
      args(&["--fopen-filter", "a", "b", "--env", "A", "B"]),
      args(&["--env", "--env", "--env"]),
      args(&[]),
    ];
    for input in inputs {
      let once = filter_user_args(input, &cache);
      let twice = filter_user_args(once.clone(), &cache);
      assert_eq!(once, twice);
    }
  }
}

#[test]
fn it_should_substitute_placeholders() {
  common::setup();
  let mappings = get_mappings("a.cc", "a.out", "/cache/ab/cdef");
  let input = args(&["g++", "$src", "-o", "$exe", "-I$dir/include"]);
  assert_eq!(
    substitute(&input, &mappings),
    args(&["g++", "a.cc", "-o", "a.out", "-I/cache/ab/cdef/include"])
  );
}

#[test]
fn it_should_skip_unbounded_limits() {
  common::setup();
  let mut lrun_args = LrunArgs::new();
  lrun_args.append_limit(&Limit {
    cpu_time: 1.5,
    real_time: 0.0,
    memory: 1 << 26,
    output: -1,
    stack: 0,
  });
  assert_eq!(
    lrun_args.as_slice(),
    args(&["--max-cpu-time", "1.5", "--max-memory", "67108864"])
  );

  let mut lrun_args = LrunArgs::new();
  lrun_args.append_limit(&Limit::unlimited());
  assert!(lrun_args.as_slice().is_empty());
}
