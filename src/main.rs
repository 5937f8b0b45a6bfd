fn main() {
    if let Err(e) = engagement_lib::run() {
        eprintln!("engagement: {e}");
        std::process::exit(1);
    }
}
