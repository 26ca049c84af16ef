use std::fmt::Display;
use std::io;
use std::str::Utf8Error;
use thiserror::Error;
use btleplug;
use serde_json;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to determine path to the settings store")]
    NoStorePath,

    #[error("Failed to acquire file lock on settings store: {source}")]
    CanNotLock { source: io::Error },

    #[error("Failed to encode/decode settings store as utf-8: {source}")]
    Utf8Error { #[from] source: Utf8Error },

    #[error("Failed to read/write settings store: {source}")]
    IOError { #[from] source: io::Error },

    #[error("Failed to parse/build settings store: {source}")]
    JsonError { #[from] source: serde_json::Error },
}

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Error communicating with device (btleplug): {source}")]
    Btle { #[from] source: btleplug::Error },

    #[error("No bluetooth adapter is available")]
    NoAdapter,

    #[error("Failed to scan for devices: {reason}")]
    ScanFailure { reason: String },

    #[error("A scan is already in progress")]
    ScanInProgress,

    #[error("Device {id} not found")]
    DeviceNotFound { id: String },

    #[error("Failed to connect to {name}: {reason}")]
    ConnectionFailure { name: String, reason: String },

    #[error("A connection attempt is already in progress")]
    ConnectInProgress,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IntakeError {
    #[error("Leg length must be a number, got {input:?}")]
    InvalidLegLength { input: String },

    #[error("Leg length must be between {min} and {max} cm, got {value}")]
    LegLengthOutOfRange { value: u64, min: u32, max: u32 },

    #[error("Unknown gender {input:?}, expected male or female")]
    InvalidGender { input: String },
}

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Profile name must not be empty")]
    EmptyProfileName,

    #[error("No patient data has been saved yet")]
    NoPatientData,

    #[error("Profile {name:?} not found")]
    ProfileNotFound { name: String },

    #[error("Failed to access profiles: {source}")]
    Store { #[from] source: StoreError },
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No device is connected, connect a bluetooth device first")]
    NotConnected,

    #[error("{what} must be between {min} and {max}, got {value}")]
    OutOfRange { what: &'static str, value: i64, min: u8, max: u8 },
}

#[derive(Error, Debug)]
pub enum AppRunError {
    #[error("Failed to start application (store): {source}")]
    StoreError { #[from] source: StoreError },

    #[error("Bluetooth error: {source}")]
    DeviceError { #[from] source: DeviceError },

    #[error("Invalid patient data: {source}")]
    IntakeError { #[from] source: IntakeError },

    #[error("Profile error: {source}")]
    ProfileError { #[from] source: ProfileError },

    #[error("Motor control error: {source}")]
    SessionError { #[from] source: SessionError },

    #[error("Failed to read console input: {source}")]
    ConsoleError { #[from] source: std::io::Error },
}

pub fn error_alert<T: Display>(message: &'static str, error: &T) {
    eprintln!("{}: {}", message, error);
}
