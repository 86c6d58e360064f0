#![forbid(unsafe_code)]

fn main() {
    if let Err(error) = mural_node::run_from_env() {
        eprintln!("mural: {error}");
        std::process::exit(error.exit_code());
    }
}
