//! esmbuild - Command-line tool for building ES-module distributions

use std::process::ExitCode;

use esmbuild::cli;

fn main() -> ExitCode {
    cli::run()
}
