pub mod app;
pub mod commands;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod info;
pub mod output;
pub mod profiles;
pub mod runtime;
pub mod simulate;

pub use app::run;
pub use env::CliArgs;
