fn main() {
    if let Err(err) = collectr::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
