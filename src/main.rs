fn main() {
    if let Err(err) = powertree::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
