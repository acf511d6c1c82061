use std::process::ExitCode;

fn main() -> ExitCode {
    boshu_cli::run()
}
