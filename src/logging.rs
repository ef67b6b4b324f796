use env_logger::Env;

/// `info` by default, `RUST_LOG` overrides. Logs go to stderr so JSON on
/// stdout stays clean.
pub fn init() {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}
