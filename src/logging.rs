/// Install the platform logger.
///
/// Natively this is `env_logger`, filtered through `RUST_LOG`. On the web log
/// records go to the browser console at `Info` and above. Calling this more
/// than once is harmless.
pub fn init() {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        if console_log::init_with_level(log::Level::Info).is_err() {
            log::debug!("console logger already installed");
        }
    }
}
