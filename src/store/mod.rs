pub mod io;
pub mod settings;
pub mod types;
