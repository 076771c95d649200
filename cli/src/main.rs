use clap::Parser;
use plzero_cli::args::Cli;

fn main() -> std::process::ExitCode {
  let cli = Cli::parse();
  match plzero_cli::run::execute(cli) {
    Ok(()) => std::process::ExitCode::SUCCESS,
    Err(e) => {
      eprintln!("{e:#}");
      std::process::ExitCode::FAILURE
    }
  }
}
