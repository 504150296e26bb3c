use std::process::ExitCode;

fn main() -> ExitCode {
    docroute_cli::run()
}
