/// Initialises `env_logger` from `RUST_LOG`, defaulting to `info` for this
/// crate and `warn` for everything else. Safe to call more than once; only
/// the first call takes effect.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("warn,dogm=info"),
    )
    .try_init();
}
