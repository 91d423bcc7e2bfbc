use std::process::ExitCode;

fn main() -> ExitCode {
    vss_pulse::run_from_args()
}
