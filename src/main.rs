fn main() {
    if let Err(err) = layer_classify::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
