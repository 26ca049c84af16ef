use std::env;
use std::process::ExitCode;
use log::info;
use geto_stepper::{init_logging, run};
use geto_stepper::error::{error_alert, AppRunError, StoreError};

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    info!(concat!("GETO Stepper ", env!("CARGO_PKG_VERSION")));

    let args = env::args();

    match run(args).await {
        Err(AppRunError::StoreError { source: StoreError::CanNotLock { .. } }) => {
            error_alert("Unable to start", &"this application has already been started");
            ExitCode::FAILURE
        },
        Err(err) => {
            error_alert("Error", &err);
            ExitCode::FAILURE
        },
        Ok(_) => ExitCode::SUCCESS,
    }
}
