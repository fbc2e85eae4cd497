fn main() {
    if let Err(error) = joulecast_cli::run() {
        eprintln!("error: {error:#}");
        std::process::exit(1);
    }
}
