use clap::Parser;
use xref_cli::XrefCli;
use xref_cli::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = XrefCli::parse();
    init_tracing(cli.verbose);
    cli.run().await
}
