//! shellfmt - Shell script formatter

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = shellfmt_cli::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
