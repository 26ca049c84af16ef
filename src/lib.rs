use std::env;
use clap::Parser;
use crate::cli::application::run_application;
use crate::cli::args::Args;
use crate::error::AppRunError;

pub mod cli;
pub mod device;
pub mod error;
pub mod motor;
pub mod patient;
pub mod store;

pub fn init_logging() {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339(std::time::SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(log::LevelFilter::Info)
        .chain(std::io::stderr());

    if let Ok(log_file) = env::var("LOG_FILE") {
        dispatch = dispatch.chain(
            fern::log_file(log_file).expect("Failed to open LOG_FILE")
        );
    }

    dispatch.apply().expect("Failed to initialize logger");
}

pub async fn run(args: env::Args) -> Result<(), AppRunError> {
    run_application(Args::parse_from(args)).await
}
