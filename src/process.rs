//! process plumbing helpers
use std::{borrow::Cow, ffi::OsStr, path::Path};

pub(crate) trait CommandExt {
    /// Adds two arguments.
    fn arg2(&mut self, a: impl AsRef<OsStr>, b: impl AsRef<OsStr>) -> &mut Self;
}

impl CommandExt for tokio::process::Command {
    fn arg2(&mut self, a: impl AsRef<OsStr>, b: impl AsRef<OsStr>) -> &mut Self {
        self.arg(a).arg(b)
    }
}

/// Shell-escaped display form of a command, for start events and errors.
pub(crate) fn display_command(
    program: &Path,
    args: impl IntoIterator<Item = impl AsRef<str>>,
) -> String {
    let mut out = shell_escape::escape(Cow::from(program.display().to_string())).into_owned();
    for arg in args {
        out.push(' ');
        out.push_str(&shell_escape::escape(Cow::from(arg.as_ref())));
    }
    out
}

/// Reassembles diagnostic-stream chunks into complete lines, in arrival
/// order. Progress lines are terminated with a bare `\r`, so both `\r` and
/// `\n` end a line.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    buf: String,
}

impl LineBuffer {
    /// Push a chunk, returning every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.push_str(&String::from_utf8_lossy(chunk));
        let mut lines = Vec::new();
        while let Some(idx) = self.buf.find(['\n', '\r']) {
            lines.push(self.buf[..idx].to_owned());
            self.buf.drain(..=idx);
        }
        lines
    }

    /// Whatever is left after the last terminator.
    pub fn take_rest(&mut self) -> Option<String> {
        match self.buf.is_empty() {
            true => None,
            false => Some(std::mem::take(&mut self.buf)),
        }
    }
}
