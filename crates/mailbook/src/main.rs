//! `mailbook` keeps an e-reader library in step with a library published on
//! a shell account. Run `publish` on the shell side and `update` on the
//! device.

/// CLI module - command-line interface for mailbook
mod cli;

fn main() {
    cli::run_cli();
}
