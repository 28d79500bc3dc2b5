//! Shell-script fixtures.
//!
//! Scripts are run as `/bin/sh <path>` rather than executed directly, which
//! avoids "text file busy" races when a freshly written file is exec'd while
//! another test thread forks.

use std::fs;
use std::path::{Path, PathBuf};

use taskwarden::Invocation;

pub const HELLO_WORLD: &str = "echo \"Hello World\"\n";
pub const ECHO_MESSAGE: &str = "echo \"$MESSAGE\"\n";
pub const MESSAGE_KEY: &str = "MESSAGE";
pub const MESSAGE_TEXT: &str = "A message";

/// Write `body` as a POSIX shell script named `name` inside `dir`.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}")).expect("writing fixture script");
    path
}

/// Invocation running `script` through `/bin/sh`.
pub fn sh_invocation(script: &Path) -> Invocation {
    Invocation::new("/bin/sh").arg(script.to_string_lossy())
}

/// Invocation running an inline shell snippet.
pub fn sh_snippet(snippet: &str) -> Invocation {
    Invocation::new("/bin/sh").arg("-c").arg(snippet)
}
