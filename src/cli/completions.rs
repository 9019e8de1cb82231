//! Shell completion scripts

use clap::CommandFactory;
use clap_complete::{generate, Shell};
use std::io::{self, Write};

use crate::cli::args::Cli;

/// Print the completion script for `shell` to stdout
pub fn print(shell: Shell) {
    write_to(shell, &mut io::stdout());
}

pub fn write_to(shell: Shell, out: &mut dyn Write) {
    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, out);
}
