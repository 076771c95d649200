//! Orchestrates one invocation: read input, lex/parse or load, optionally
//! dump the code, then run (or just disassemble) it.

use std::path::PathBuf;

use plzero::lexer::tokenize;
use plzero::loader::{parse_code_text, write_to_file};
use plzero::vm::{Control, Io, StdIo, Vm};

use crate::args::{Cli, USAGE};
use crate::common::{color_enabled, Input};
use crate::report;

pub fn execute(cli: Cli) -> anyhow::Result<()> {
  if cli.help {
    eprintln!("{USAGE}");
    anyhow::bail!("usage requested");
  }
  if cli.input.is_none() {
    eprintln!("{USAGE}");
    anyhow::bail!("an input file is required");
  }

  let input = Input::from_arg(cli.input.as_deref());
  let name = input.name();
  let source = input.read()?;
  let color = color_enabled();

  // `-l` implies `-v` (§6): both print the source listing before the
  // lexeme dump, not just a bare `-v` run.
  if cli.verbose || cli.lex_only {
    report::print_source(&source);
  }

  let code = if cli.from_code {
    parse_code_text(&source)?
  } else {
    let (tokens, lex_diags) = tokenize(&source);
    if cli.verbose || cli.lex_only {
      report::print_tokens(&tokens);
    }
    if !lex_diags.is_empty() {
      report::print_diagnostics(&lex_diags, &name, &source, color);
      anyhow::bail!("failed to lex {name}");
    }
    if cli.lex_only {
      return Ok(());
    }

    match plzero::compile(&source) {
      Ok(code) => code,
      Err(diags) => {
        report::print_diagnostics(&diags, &name, &source, color);
        anyhow::bail!("failed to compile {name}");
      }
    }
  };

  if cli.verbose || cli.disassemble {
    report::print_instructions(&code);
  }

  if cli.dump_code {
    let out = cli.output.map(PathBuf::from).unwrap_or_else(|| PathBuf::from("output.txt"));
    write_to_file(&code, &out)?;
  }

  if cli.disassemble {
    return Ok(());
  }

  let mut vm = Vm::new(code);
  let mut io = StdIo;
  if cli.verbose {
    run_traced(&mut vm, &mut io)?;
  } else {
    vm.run(&mut io)?;
  }

  Ok(())
}

/// Steps the VM one instruction at a time, printing a trace row after
/// every step, mirroring the reference's `-v` execution trace.
fn run_traced(vm: &mut Vm, io: &mut impl Io) -> anyhow::Result<()> {
  report::print_trace_header();
  loop {
    match vm.step(io)? {
      Control::Continue => report::print_trace_row(&vm.trace_row()),
      Control::Halted => {
        report::print_trace_row(&vm.trace_row());
        return Ok(());
      }
    }
  }
}
