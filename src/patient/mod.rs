pub mod intake;
pub mod profiles;
pub mod types;
