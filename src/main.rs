fn main() {
    if let Err(err) = table_catalog::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
