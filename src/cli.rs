//! Command-line surface
//!
//! Flags follow the single-dash long style (`-close vol1`, `-open=/dev/sdb`).
//! [`normalize_args`] rewrites them to the double-dash form clap expects, so
//! both spellings are accepted.

use clap::builder::BoolishValueParser;
use clap::{ArgAction, CommandFactory, Parser};
use std::ffi::OsString;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "lukscrypt")]
#[command(author = "lukscrypt Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Format, open and close LUKS2 encrypted drives")]
#[command(args_override_self = true)]
pub struct Cli {
    /// Close an opened LUKS-encrypted drive
    #[arg(long, value_name = "NAME", allow_hyphen_values = true)]
    pub close: Option<String>,

    /// Encrypt a drive with LUKS2
    #[arg(long, value_name = "DEVICE", allow_hyphen_values = true)]
    pub encrypt: Option<String>,

    /// Mapped name of device; to be used with open
    #[arg(long, value_name = "NAME", allow_hyphen_values = true)]
    pub name: Option<String>,

    /// Open a LUKS-encrypted drive; requires name flag
    #[arg(long, value_name = "DEVICE", allow_hyphen_values = true)]
    pub open: Option<String>,

    /// Verbose mode
    #[arg(
        short = 'v',
        long = "verbose",
        alias = "v",
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_value_t = false,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub verbose: bool,
}

/// The single operation an invocation performs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Deactivate mapping `name`
    Close { name: String },
    /// Format `device` and add the first passphrase
    Encrypt { device: PathBuf },
    /// Unlock `device` as mapping `name`
    Open { device: PathBuf, name: String },
}

impl Cli {
    /// Parse from an argument list, accepting single-dash long flags
    pub fn parse_normalized<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Cli::parse_from(normalize_args(args))
    }

    /// Like [`Cli::parse_normalized`] but returns clap's error
    pub fn try_parse_normalized<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Cli::try_parse_from(normalize_args(args))
    }

    /// Resolve the operation: close, then encrypt, then open with name.
    ///
    /// Empty values count as absent. `None` means usage should be shown.
    pub fn operation(&self) -> Option<Operation> {
        if let Some(name) = non_empty(&self.close) {
            return Some(Operation::Close {
                name: name.to_string(),
            });
        }

        if let Some(device) = non_empty(&self.encrypt) {
            return Some(Operation::Encrypt {
                device: PathBuf::from(device),
            });
        }

        match (non_empty(&self.open), non_empty(&self.name)) {
            (Some(device), Some(name)) => Some(Operation::Open {
                device: PathBuf::from(device),
                name: name.to_string(),
            }),
            _ => None,
        }
    }

    /// The flag missing from a half-specified open, if any
    pub fn incomplete_open(&self) -> Option<&'static str> {
        if non_empty(&self.close).is_some() || non_empty(&self.encrypt).is_some() {
            return None;
        }
        match (non_empty(&self.open), non_empty(&self.name)) {
            (Some(_), None) => Some("-name"),
            (None, Some(_)) => Some("-open"),
            _ => None,
        }
    }
}

/// Write the flag summary, e.g. to stderr when no operation was selected
pub fn write_usage<W: Write>(out: &mut W) -> io::Result<()> {
    let help = Cli::command().render_help();
    write!(out, "{}", help)?;
    out.flush()
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Flags that consume the following argument when given without `=`
const VALUE_FLAGS: [&str; 4] = ["close", "encrypt", "name", "open"];

/// Rewrite `-flag` long options to `--flag`.
///
/// The program name, values of value-taking flags, single-letter flags and
/// everything after `--` pass through untouched.
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut out = Vec::new();
    let mut iter = args.into_iter().map(Into::into);

    if let Some(program) = iter.next() {
        out.push(program);
    }

    let mut expect_value = false;
    let mut passthrough = false;

    for arg in iter {
        if passthrough || expect_value {
            expect_value = false;
            out.push(arg);
            continue;
        }

        let Some(text) = arg.to_str() else {
            out.push(arg);
            continue;
        };

        if text == "--" {
            passthrough = true;
            out.push(arg);
            continue;
        }

        let (dashes, body) = if let Some(rest) = text.strip_prefix("--") {
            (2, rest)
        } else if let Some(rest) = text.strip_prefix('-') {
            (1, rest)
        } else {
            out.push(arg);
            continue;
        };

        let flag = body.split('=').next().unwrap_or_default();
        if !body.contains('=') && VALUE_FLAGS.contains(&flag) {
            expect_value = true;
        }

        if dashes == 1 && flag.chars().count() > 1 {
            out.push(OsString::from(format!("-{}", text)));
        } else {
            out.push(arg);
        }
    }

    out
}
