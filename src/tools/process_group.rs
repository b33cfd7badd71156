//! Process Group Supervision
//!
//! The shell is started as the leader of a new process group so that a
//! timeout or interrupt can take down everything it started, not just the
//! shell itself. On non-Unix platforms these helpers are no-ops.

use std::io;
use tokio::process::Command;

/// Make the spawned child the leader of its own process group
#[cfg(unix)]
pub fn isolate(command: &mut Command) {
    command.process_group(0);
}

#[cfg(not(unix))]
pub fn isolate(_command: &mut Command) {}

/// Send SIGKILL to every process in the group led by `pgid`
///
/// A group that no longer exists is not an error.
#[cfg(unix)]
pub fn kill_group(pgid: u32) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let pgid = i32::try_from(pgid).map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(io::Error::from(errno)),
    }
}

#[cfg(not(unix))]
pub fn kill_group(_pgid: u32) -> io::Result<()> {
    Ok(())
}
