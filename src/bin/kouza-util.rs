use clap::Parser;

fn main() {
    use kouza::util::cli::*;

    dotenv::dotenv().ok();

    let opts = Options::parse();
    run_cli_action(opts);
}
