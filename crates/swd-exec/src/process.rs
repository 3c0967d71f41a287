//! Child-process plumbing: running a step's shell command and running the
//! configured hash binary.

use std::io::{self, Read, Write};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};

/// Outcome of running a step's shell command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    Failure,
    Interrupted,
}

/// Run `command` through `bash_bin -c <command>`, streaming its stdout to
/// our own stdout. Checked for interruption both before spawning and after
/// the child exits, matching the two observation points of a synchronous,
/// single-in-flight-child executor.
pub fn run_via_shell(
    bash_bin: &str,
    command: &str,
    interrupted: &AtomicBool,
) -> io::Result<RunOutcome> {
    if interrupted.load(Ordering::Relaxed) {
        return Ok(RunOutcome::Interrupted);
    }

    let mut child = Command::new(bash_bin)
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()?;

    let status = child.wait()?;

    if interrupted.load(Ordering::Relaxed) {
        return Ok(RunOutcome::Interrupted);
    }
    if status.success() {
        Ok(RunOutcome::Success)
    } else {
        Ok(RunOutcome::Failure)
    }
}

/// Run the configured hash binary directly (no shell), feeding `input` to
/// its stdin and returning the raw trimmed stdout. The caller is
/// responsible for extracting and validating the digest token, since the
/// expected length (`hashsum_size`) is a configuration concern.
pub fn run_hash_bin(hash_bin: &str, input: &[u8]) -> io::Result<String> {
    let mut child = Command::new(hash_bin)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()?;

    // Write on a scoped block so the pipe closes before we wait, or a hash
    // binary that reads until EOF would block forever.
    {
        let mut stdin = child.stdin.take().expect("piped stdin");
        stdin.write_all(input)?;
    }

    let mut out = String::new();
    child
        .stdout
        .take()
        .expect("piped stdout")
        .read_to_string(&mut out)?;
    child.wait()?;

    Ok(out.trim().to_string())
}
