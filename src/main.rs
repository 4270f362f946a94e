fn main() {
    if let Err(err) = equity_chart::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
