fn main() {
    if let Err(err) = reaction_layout::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
