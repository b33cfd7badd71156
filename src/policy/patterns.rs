//! Pattern Library
//!
//! Static policy data consumed by the rules: forbidden metacharacters,
//! high-risk keywords, sensitive path patterns and the leading-token allowlist.
//! The library is assembled once at startup and never mutated afterwards.

use crate::error::{GuardError, Result};
use lazy_static::lazy_static;

/// Characters enabling chaining, substitution, redirection or piping.
/// Newline and carriage return terminate a command just like `;`.
const METACHARACTERS: &[char] = &[';', '&', '|', '`', '$', '(', ')', '<', '>', '\\', '\n', '\r'];

const KEYWORDS: &[&str] = &[
    // privilege elevation
    "sudo", "su", "doas", "pkexec",
    // destructive filesystem operations
    "rm", "rmdir", "shred", "mkfs", "dd", "truncate", "wipefs",
    // permission and ownership changes
    "chmod", "chown", "chgrp", "chattr", "setfacl",
    // package management
    "apt", "apt-get", "dpkg", "yum", "dnf", "rpm", "pacman", "zypper", "apk", "snap", "brew",
    "pip", "pip3", "npm", "gem", "cargo",
    // service and process control
    "systemctl", "service", "kill", "killall", "pkill", "shutdown", "reboot", "halt",
    "poweroff", "init", "crontab", "mount", "umount",
    // account management
    "useradd", "userdel", "usermod", "groupadd", "groupdel", "passwd", "adduser", "deluser",
    "visudo",
    // remote access
    "ssh", "scp", "sftp", "telnet", "nc", "ncat", "netcat", "rsync", "ftp",
    // containers and orchestration
    "docker", "podman", "kubectl", "helm", "nerdctl", "crictl",
    // infrastructure as code
    "terraform", "tofu", "ansible", "ansible-playbook", "pulumi",
];

const SENSITIVE_PATHS: &[&str] = &[
    // system configuration and kernel interfaces
    "/etc", "/root", "/boot", "/proc", "/sys", "/dev", "/var/log",
    // credential directories, wherever their home lives
    ".ssh", ".gnupg", ".aws", ".kube", ".docker", ".azure", ".config/gcloud", ".netrc",
];

const ALLOWLIST: &[&str] = &[
    // read-only inspection
    "ls", "cat", "head", "tail", "wc", "grep", "find", "file", "stat", "du", "df", "pwd",
    "whoami", "id", "uname", "date", "echo", "which", "hostname", "uptime", "sort", "uniq",
    "cut",
    // network diagnostics
    "ping", "traceroute", "dig", "nslookup", "host", "whois", "curl", "wget",
    // archives
    "tar", "zip", "unzip", "gzip", "gunzip",
    // interpreters
    "python", "python3", "node",
];

lazy_static! {
    static ref BUILTIN: PatternLibrary = PatternLibrary {
        metacharacters: METACHARACTERS.to_vec(),
        keywords: KEYWORDS.iter().map(|s| s.to_string()).collect(),
        sensitive_paths: SENSITIVE_PATHS.iter().map(|s| s.to_string()).collect(),
        allowlist: ALLOWLIST.iter().map(|s| s.to_string()).collect(),
    };
}

/// The four rule categories as plain data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternLibrary {
    /// Characters that block a command wherever they appear
    pub metacharacters: Vec<char>,

    /// Command names blocked when they appear as a standalone token
    pub keywords: Vec<String>,

    /// Path patterns blocked when they appear at a path boundary
    pub sensitive_paths: Vec<String>,

    /// Permitted leading tokens
    pub allowlist: Vec<String>,
}

impl Default for PatternLibrary {
    fn default() -> Self {
        BUILTIN.clone()
    }
}

impl PatternLibrary {
    /// Create a library from explicit sets
    pub fn new(
        metacharacters: Vec<char>,
        keywords: Vec<String>,
        sensitive_paths: Vec<String>,
        allowlist: Vec<String>,
    ) -> Self {
        Self {
            metacharacters,
            keywords,
            sensitive_paths,
            allowlist,
        }
    }

    /// Add keywords, skipping ones already present
    pub fn extend_keywords<I: IntoIterator<Item = String>>(&mut self, extra: I) {
        extend_unique(&mut self.keywords, extra);
    }

    /// Add sensitive path patterns, skipping ones already present
    pub fn extend_sensitive_paths<I: IntoIterator<Item = String>>(&mut self, extra: I) {
        extend_unique(&mut self.sensitive_paths, extra);
    }

    /// Add allowlist entries, skipping ones already present
    pub fn extend_allowlist<I: IntoIterator<Item = String>>(&mut self, extra: I) {
        extend_unique(&mut self.allowlist, extra);
    }

    /// Replace the allowlist entirely
    pub fn replace_allowlist(&mut self, allowlist: Vec<String>) {
        self.allowlist = allowlist;
    }

    /// Check that every entry can be used by the rules
    pub fn validate(&self) -> Result<()> {
        if self.allowlist.is_empty() {
            return Err(GuardError::Config("allowlist must not be empty".to_string()));
        }

        for (set, entries) in [("keyword", &self.keywords), ("allowlist", &self.allowlist)] {
            for entry in entries {
                if entry.is_empty() || entry.chars().any(char::is_whitespace) {
                    return Err(GuardError::Config(format!(
                        "{} entry '{}' must be a single non-empty token",
                        set, entry
                    )));
                }
            }
        }

        if self.sensitive_paths.iter().any(|p| p.trim().is_empty()) {
            return Err(GuardError::Config(
                "sensitive path patterns must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn extend_unique<I: IntoIterator<Item = String>>(target: &mut Vec<String>, extra: I) {
    for item in extra {
        if !target.contains(&item) {
            target.push(item);
        }
    }
}
