fn main() {
    if let Err(err) = stocklab::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
