//! Path-or-stdin input selection, generalized from the teacher's
//! `InputArgs`/`PathOrStdin` pair: `-` (or no positional argument at all)
//! means read from stdin, anything else is a file path.

use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;

/// Either a path to a file or the standard input stream.
#[derive(Clone, Debug)]
pub enum Input {
  Path(PathBuf),
  Stdin,
}

impl Input {
  pub fn from_arg(arg: Option<&str>) -> Self {
    match arg {
      None | Some("-") => Input::Stdin,
      Some(path) => Input::Path(PathBuf::from(path)),
    }
  }

  /// A human-readable name for this input, used in diagnostics and `-v`
  /// listings.
  pub fn name(&self) -> String {
    match self {
      Input::Path(p) => p.display().to_string(),
      Input::Stdin => "<stdin>".to_string(),
    }
  }

  /// Reads the full contents of this input. Fails if stdin is requested
  /// but connected to a terminal, the same guard the teacher's CLI uses
  /// to avoid hanging on an interactive `plzero` with no piped input.
  pub fn read(&self) -> anyhow::Result<String> {
    match self {
      Input::Path(p) => std::fs::read_to_string(p).with_context(|| format!("failed to read {}", p.display())),
      Input::Stdin => {
        if atty::is(atty::Stream::Stdin) {
          anyhow::bail!("an input file is required");
        }
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).context("failed to read from stdin")?;
        Ok(buf)
      }
    }
  }
}

/// Whether diagnostics and listings should be colored: respects
/// `NO_COLOR`/`CLICOLOR` through `supports-color`, the same crate the
/// teacher's CLI uses for its own diagnostic styling.
pub fn color_enabled() -> bool {
  supports_color::on(supports_color::Stream::Stdout).map(|c| c.has_basic).unwrap_or(false)
}
