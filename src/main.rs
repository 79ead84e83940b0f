use clap::Parser;
use lassensus::{
    cli::{init_verbose, Cli, Command},
    commands::{consensus, run, select},
    utils::{handle_error_and_exit, Result},
};

fn runner() -> Result<()> {
    let cli = Cli::parse();
    init_verbose(&cli);
    let subcommand_name = match cli.command {
        Command::Select(_) => "select",
        Command::Consensus(_) => "consensus",
        Command::Run(_) => "run",
    };

    log::info!(
        "Running {}-{} [{}]",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        subcommand_name
    );
    match cli.command {
        Command::Select(args) => select::select(args)?,
        Command::Consensus(args) => consensus::consensus(args)?,
        Command::Run(args) => run::run(args)?,
    }
    log::info!("{} end", env!("CARGO_PKG_NAME"));
    Ok(())
}

fn main() {
    if let Err(e) = runner() {
        handle_error_and_exit(e);
    }
}
