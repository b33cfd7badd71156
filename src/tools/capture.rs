//! Output Capture Spool
//!
//! When capture is requested, the subprocess writes its stdout and stderr into
//! temporary files rather than pipes, so a chatty command never blocks on a
//! full pipe buffer. The files are removed when the spool is dropped.

use crate::error::Result;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::process::Stdio;
use tempfile::{Builder, NamedTempFile};
use tracing::debug;

/// Output read back from a spool
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Per-invocation temporary files backing stdout and stderr
#[derive(Debug)]
pub struct CaptureSpool {
    stdout: NamedTempFile,
    stderr: NamedTempFile,
    max_output_size: usize,
}

impl CaptureSpool {
    /// Create both spool files in `dir`, or the system temp dir when `None`
    pub fn new(max_output_size: usize, dir: Option<&Path>) -> Result<Self> {
        let stdout = spool_file("shell-guard-stdout-", dir)?;
        let stderr = spool_file("shell-guard-stderr-", dir)?;
        debug!(
            stdout = %stdout.path().display(),
            stderr = %stderr.path().display(),
            "capture spool created"
        );
        Ok(Self {
            stdout,
            stderr,
            max_output_size,
        })
    }

    /// Fresh handles for the child's stdout and stderr
    pub fn stdio(&self) -> Result<(Stdio, Stdio)> {
        Ok((
            Stdio::from(self.stdout.reopen()?),
            Stdio::from(self.stderr.reopen()?),
        ))
    }

    /// Read both streams back, truncated to the configured limit
    pub fn collect(&self) -> Result<CapturedOutput> {
        Ok(CapturedOutput {
            stdout: read_limited(self.stdout.reopen()?, self.max_output_size)?,
            stderr: read_limited(self.stderr.reopen()?, self.max_output_size)?,
        })
    }

    /// Locations of the spool files while the spool is alive
    pub fn paths(&self) -> (&Path, &Path) {
        (self.stdout.path(), self.stderr.path())
    }
}

impl Drop for CaptureSpool {
    fn drop(&mut self) {
        debug!("capture spool released");
    }
}

fn spool_file(prefix: &str, dir: Option<&Path>) -> Result<NamedTempFile> {
    let mut builder = Builder::new();
    builder.prefix(prefix);
    let file = match dir {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };
    Ok(file)
}

fn read_limited(file: File, max_len: usize) -> Result<String> {
    let mut buf = Vec::new();
    // one extra byte tells us whether truncation is needed
    file.take(max_len as u64 + 1).read_to_end(&mut buf)?;
    Ok(truncate_output(&buf, max_len))
}

/// Decode lossily and cut to `max_len` bytes, adding an ellipsis if truncated
fn truncate_output(bytes: &[u8], max_len: usize) -> String {
    let mut s = String::from_utf8_lossy(bytes).into_owned();
    if s.len() > max_len {
        let mut cut = max_len.saturating_sub(3);
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
        s.push_str("...");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_truncate_output() {
        assert_eq!(truncate_output(b"hello", 10), "hello");
        assert_eq!(truncate_output(b"hello", 5), "hello");
        assert_eq!(truncate_output(b"hello world", 5), "he...");
        assert_eq!(truncate_output(b"", 10), "");
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        // 'é' is two bytes; a cut inside it must back off
        let s = truncate_output("aéééé".as_bytes(), 5);
        assert!(s.ends_with("..."));
        assert!(s.len() <= 5);
    }

    #[test]
    fn test_spool_roundtrip_and_cleanup() {
        let spool = CaptureSpool::new(1024, None).unwrap();
        let (out_path, err_path) = {
            let (out, err) = spool.paths();
            (out.to_path_buf(), err.to_path_buf())
        };

        spool.stdout.reopen().unwrap().write_all(b"out line\n").unwrap();
        spool.stderr.reopen().unwrap().write_all(b"err line\n").unwrap();

        let captured = spool.collect().unwrap();
        assert_eq!(captured.stdout, "out line\n");
        assert_eq!(captured.stderr, "err line\n");
        assert!(out_path.exists());

        drop(spool);
        assert!(!out_path.exists());
        assert!(!err_path.exists());
    }

    #[test]
    fn test_spool_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        let spool = CaptureSpool::new(16, Some(dir.path())).unwrap();
        assert!(spool.paths().0.starts_with(dir.path()));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);

        drop(spool);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_spool_limit() {
        let spool = CaptureSpool::new(8, None).unwrap();
        spool
            .stdout
            .reopen()
            .unwrap()
            .write_all(&[b'x'; 4096])
            .unwrap();

        let captured = spool.collect().unwrap();
        assert_eq!(captured.stdout, "xxxxx...");
        assert_eq!(captured.stderr, "");
    }
}
