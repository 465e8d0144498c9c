fn main() {
    if let Err(err) = xltemplate::server::run(std::env::args_os()) {
        eprintln!("xltemplate failed: {err:#}");
        std::process::exit(1);
    }
}
