//! Command line front end.
//!
//! Usage: `pf-cli <inpFile> <rptFile> [<outFile>]`. Prints usage and exits
//! zero when given too few arguments; exits with the engine's numeric error
//! code on any fatal failure.

use std::path::Path;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use pf_project::Project;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        println!("Correct syntax is: pf-cli inpFile rptFile (outFile)");
        return ExitCode::SUCCESS;
    }

    let inp = Path::new(&args[1]);
    let rpt = Path::new(&args[2]);
    let out = args.get(3).map(String::as_str).unwrap_or("");

    let mut project = Project::new();
    match project.run(inp, rpt, out) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from((err.code() % 256) as u8)
        }
    }
}
