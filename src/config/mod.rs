//! Process-wide settings of tracechat: the TOML configuration, its defaults,
//! logger setup and the identity printed by `--version`.

pub mod constants;
pub(crate) mod defaults;
pub mod models;
pub mod utils;

pub use models::*;
pub use utils::*;

pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_SHA: &str = match option_env!("GIT_SHA") {
    Some(sha) => sha,
    None => "unknown",
};

/// `<name>/<version>`, sent with every request to the agent server.
pub fn user_agent() -> String {
    format!("{}/{}", APP_NAME, VERSION)
}

pub fn version() -> String {
    format!("{} version: {} {}", APP_NAME, VERSION, GIT_SHA)
}

/// Set once by `main` through `Configuration::init`.
#[cfg(not(test))]
static CONFIG: std::sync::OnceLock<Configuration> = std::sync::OnceLock::new();

// One configuration per test thread.
#[cfg(test)]
thread_local! {
    static TEST_CONFIG: std::cell::RefCell<&'static Configuration> =
        std::cell::RefCell::new(Box::leak(Box::new(Configuration::default())));
}

/// Start-up progress on stderr, shown with `general.verbose` or `--verbose`.
#[macro_export]
macro_rules! verbose {
    ($($arg:tt)*) => {
        if $crate::config::Configuration::instance().general.verbose {
            eprintln!($($arg)*);
        }
    };
}

pub use verbose;
