use std::process::ExitCode;

fn main() -> ExitCode {
    match provreq_cli::main_entry() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(provreq_cli::exit_code(&err))
        }
    }
}
