fn main() {
    if let Err(err) = rowtree::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
