use snafu::Report;

fn main() {
    let code = match tidycache::tidycache_main() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", Report::from_error(e));
            1
        }
    };

    #[allow(clippy::exit)]
    std::process::exit(code);
}
