use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use lazy_static::lazy_static;

lazy_static! {
  static ref NAMED_LOCKS: Mutex<HashMap<String, Arc<Mutex<()>>>> = Mutex::new(HashMap::new());
}

/// Fetch the process-local mutex registered under `name`, creating it on
/// first use. Cross-process exclusion still needs a file lock on top.
pub fn named(name: &str) -> Arc<Mutex<()>> {
  let mut locks = NAMED_LOCKS.lock().unwrap();
  locks
    .entry(name.to_string())
    .or_insert_with(|| Arc::new(Mutex::new(())))
    .clone()
}
