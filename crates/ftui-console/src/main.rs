#![forbid(unsafe_code)]

fn main() {
    match ftui_console::run_from_env() {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            eprintln!("ftui-console: {error}");
            std::process::exit(error.exit_code());
        }
    }
}
