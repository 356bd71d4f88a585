mod cli;

use std::process::ExitCode;

use cli::run_cli;
use color_print::cformat;

#[tokio::main]
async fn main() -> ExitCode {
	if let Err(e) = run_cli().await {
		eprintln!("{}", cformat!("<r>{:?}", e));
		return ExitCode::FAILURE;
	}

	ExitCode::SUCCESS
}
