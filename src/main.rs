fn main() {
    if let Err(err) = csv_regroup::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
