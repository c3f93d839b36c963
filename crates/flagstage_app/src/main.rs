use flagstage_app::app::{run, AppConfig};

fn main() {
    tracing_subscriber::fmt::init();
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Invalid flagstage configuration: {err:#}");
            std::process::exit(2);
        }
    };
    if let Err(err) = run(config) {
        eprintln!("flagstage failed: {err:#}");
        std::process::exit(1);
    }
}
