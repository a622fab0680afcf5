use clap::Parser;
use popvcf::Cli;

fn main() {
    let cli = Cli::parse();
    popvcf::init_tracing();

    if let Err(err) = popvcf::run(cli) {
        tracing::error!("{err}");
        eprintln!("popvcf: {err}");
        std::process::exit(1);
    }
}
