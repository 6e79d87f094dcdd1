//! `ppkg completions`

use clap::CommandFactory;

pub fn completions(shell: clap_complete::Shell) {
    let mut cmd = crate::Cli::command();
    clap_complete::generate(shell, &mut cmd, "ppkg", &mut std::io::stdout());
}
