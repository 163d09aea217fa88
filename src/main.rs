use std::process::ExitCode;

use sonatakit::ui::output;

fn main() -> ExitCode {
    match sonatakit::cli::run() {
        Ok(code) => code,
        Err(err) => {
            output::error(format!("{:#}", err));
            ExitCode::FAILURE
        }
    }
}
