use tally::{cli::run_cli, init};

fn main() {
    init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(err) = run_cli(args) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
