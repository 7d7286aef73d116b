use clap::Parser;
use rusty_flurry::Cli;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let cli = Cli::parse();
    if let Err(e) = cli.execute() {
        log::error!("{e:#}");
        std::process::exit(1);
    }
}
