//! Deterministic fault injection for crash testing.
//!
//! A named fault fires when it is armed in the current thread, or when it is
//! listed in the `ORCHID_FAILPOINTS` environment variable (the activation
//! path for spawned server processes). In-process arming is scoped: the
//! fault stays armed until the guard returned by [`arm`] drops, so a test
//! cannot leak an armed fault into the next one.

use std::cell::RefCell;
use std::collections::HashSet;
use std::io;
use std::sync::OnceLock;

thread_local! {
    static ARMED: RefCell<Vec<String>> = RefCell::new(Vec::new());
}

static ENV_FAULTS: OnceLock<HashSet<String>> = OnceLock::new();

fn env_faults() -> &'static HashSet<String> {
    ENV_FAULTS.get_or_init(|| {
        std::env::var("ORCHID_FAILPOINTS")
            .map(|raw| {
                raw.split(',')
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    })
}

/// A fault armed for the current thread. Dropping it disarms the fault.
pub struct Armed {
    name: String,
}

impl Drop for Armed {
    fn drop(&mut self) {
        ARMED.with(|armed| {
            let mut armed = armed.borrow_mut();
            if let Some(pos) = armed.iter().rposition(|name| *name == self.name) {
                armed.remove(pos);
            }
        });
    }
}

/// Arms the named fault in the current thread for the lifetime of the
/// returned guard.
pub fn arm(name: &str) -> Armed {
    ARMED.with(|armed| armed.borrow_mut().push(name.to_string()));
    Armed {
        name: name.to_string(),
    }
}

/// Returns an injected error when the named fault is armed in this thread
/// or activated through the environment.
pub fn trip(name: &str) -> io::Result<()> {
    let armed_here = ARMED.with(|armed| armed.borrow().iter().any(|n| n == name));
    if armed_here || env_faults().contains(name) {
        return Err(io::Error::other(format!("injected fault: {name}")));
    }
    Ok(())
}
