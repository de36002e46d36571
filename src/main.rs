//! cves - track changes to a git-backed CVE record corpus

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = cvedelta::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
