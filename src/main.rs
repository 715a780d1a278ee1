mod cli;

fn main() {
    std::process::exit(cli::run_cli());
}
