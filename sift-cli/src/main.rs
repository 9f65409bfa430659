use anyhow::Result;
use clap::Command;

mod cmd;
mod config;

#[tokio::main]
async fn main() -> Result<()> {
    let app = Command::new("sift")
        .about("Collect, filter, and transform static site assets")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(cmd::build::make_subcommand())
        .subcommand(cmd::serve::make_subcommand());

    match app.get_matches().subcommand() {
        Some(("build", args)) => cmd::build::execute(args),
        Some(("serve", args)) => cmd::serve::execute(args).await,
        _ => unreachable!("subcommand is required"),
    }
}
