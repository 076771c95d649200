//! Flag parsing for `prog [-dhlpv] input [output]`. `-h` is handled by
//! hand rather than via `clap`'s generated `--help`, since the spec's
//! `-h` must exit non-zero (clap's default `--help` exits `0`).

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "plzero", disable_help_flag = true, disable_version_flag = true)]
pub struct Cli {
  /// Write the compiled code to the output file (default: output.txt).
  #[arg(short = 'd')]
  pub dump_code: bool,

  /// Print usage and exit.
  #[arg(short = 'h')]
  pub help: bool,

  /// Only lex, don't parse or execute code.
  #[arg(short = 'l')]
  pub lex_only: bool,

  /// Execute input as if it were an instruction file, not pl0 source.
  #[arg(short = 'p')]
  pub from_code: bool,

  /// Be verbose: print every stage of compilation while running.
  #[arg(short = 'v')]
  pub verbose: bool,

  /// Print the instruction listing and stop, without executing.
  #[arg(long = "disassemble", visible_alias = "dis")]
  pub disassemble: bool,

  /// Input file, or `-`/omitted for stdin.
  pub input: Option<String>,

  /// Output file for `-d` (default: output.txt).
  pub output: Option<String>,
}

pub const USAGE: &str = "\
usage: plzero [-dhlpv] input [output]
\t-d: dump the generated code to the [output] file, default file used is output.txt
\t-h: print this usage
\t-l: only lex, don't parse or execute code
\t-p: execute input as if it was a instruction file and not pl0 source
\t-v: be verbose (output every stage of the compilation while running the program)
\t--disassemble, --dis: print the instruction listing and stop, without executing";
