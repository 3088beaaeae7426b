use std::process::ExitCode;

fn main() -> ExitCode {
    use clap::Parser;

    let args = gtr::cli_args::CliArgs::parse();

    // `gtr test` logs into the result tree instead; see the log handler.
    if !matches!(args.command, gtr::cli_args::Command::Test(_)) {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    match gtr::commands::dispatch_command(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("gtr: {e:?}");
            ExitCode::from(2)
        }
    }
}
