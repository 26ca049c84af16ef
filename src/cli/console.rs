use log::{info, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::cli::args::{Adjustment, ConsoleCommand, ConsoleLine};
use crate::device::backend::BleBackend;
use crate::device::connection::ConnectionManager;
use crate::device::constants::SCAN_WINDOW;
use crate::device::types::DeviceInfo;
use crate::error::{AppRunError, DeviceError};
use crate::motor::session::MotorSession;
use crate::motor::types::{MotorSetting, OperationalStatus, SETTING_MAX, SETTING_MIN};
use crate::patient::intake::current_patient;
use crate::store::settings::SettingsStore;

#[derive(Debug, PartialEq, Eq)]
pub enum Reply {
    Message(String),
    Quit,
}

/// Device pairing and motor control in one session. The connection manager lives exactly
/// as long as the console.
pub struct Console<B: BleBackend> {
    manager: ConnectionManager<B>,
    session: MotorSession,
    store: SettingsStore,
}

fn list_devices(devices: &[DeviceInfo]) -> String {
    if devices.is_empty() {
        return "No devices found. Use scan to search.".to_string();
    }

    devices.iter()
        .enumerate()
        .map(|(index, device)| {
            let marker = if device.connected { " (connected)" } else { "" };
            format!("{:>2}. {} [{}]{}", index + 1, device.name, device.id, marker)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl<B: BleBackend> Console<B> {
    pub async fn open(backend: B, store: SettingsStore) -> Self {
        let manager = ConnectionManager::new(backend, store.clone());
        manager.init().await;
        let session = MotorSession::load(store.clone()).await;

        Console { manager, session, store }
    }

    pub fn manager(&self) -> &ConnectionManager<B> {
        &self.manager
    }

    pub fn session(&self) -> &MotorSession {
        &self.session
    }

    /// Notices shown before the first prompt. Acts on the auto-connect preference.
    pub async fn greet(&self) -> Vec<String> {
        let mut notices = vec![];

        match current_patient(&self.store).await {
            Ok(Some(patient)) => notices.push(format!(
                "Patient: {} ({}, leg length {} cm)", patient.name, patient.gender, patient.leg_length,
            )),
            Ok(None) => notices.push("No patient data found, enter the patient's data first.".to_string()),
            Err(err) => warn!("Error loading patient data: {}", err),
        }

        if self.store.preferences().await.auto_connect && self.manager.connected_device().is_none() {
            info!("Auto-connect is enabled");
            match self.manager.connect_first_discovered().await {
                Ok(Some(device)) => notices.push(format!("Connected to {}", device.name)),
                Ok(None) => notices.push("Auto-connect: no device found".to_string()),
                Err(err) => notices.push(format!("Auto-connect failed: {}", err)),
            }
        }

        notices
    }

    fn resolve_target(&self, target: &str) -> Result<DeviceInfo, DeviceError> {
        let devices = self.manager.devices();

        if let Ok(number) = target.parse::<usize>() {
            if let Some(device) = number.checked_sub(1).and_then(|index| devices.get(index)) {
                return Ok(device.clone());
            }
        }

        devices.into_iter()
            .find(|device| device.id == target)
            .ok_or_else(|| DeviceError::DeviceNotFound { id: target.to_string() })
    }

    async fn adjust(&mut self, setting: MotorSetting, adjustment: Adjustment) -> Result<Reply, AppRunError> {
        match adjustment {
            Adjustment::Up | Adjustment::Down => {
                let up = adjustment == Adjustment::Up;
                if !self.session.step(setting, up).await {
                    let bound = if up { SETTING_MAX } else { SETTING_MIN };
                    return Ok(Reply::Message(format!("{} is already at {}", setting.label(), bound)));
                }
            },
            Adjustment::Set(value) => self.session.set(setting, value).await?,
        }

        Ok(Reply::Message(format!("{}: {}", setting.label(), self.session.get(setting))))
    }

    /// Runs one command. Commands that look at the device list first report a background
    /// scan that ended in an error.
    pub async fn execute(&mut self, command: ConsoleCommand) -> Result<Reply, AppRunError> {
        let scan_failure = match command {
            ConsoleCommand::Scan | ConsoleCommand::Devices | ConsoleCommand::Connect { .. } => {
                self.manager.finished_scan_failure().await
            },
            _ => None,
        };

        let result = self.dispatch(command).await;

        let failure = match scan_failure {
            Some(err) => format!("Error: {}", AppRunError::from(err)),
            None => return result,
        };

        Ok(Reply::Message(match result {
            Ok(Reply::Message(message)) => format!("{}\n{}", failure, message),
            Ok(Reply::Quit) => return Ok(Reply::Quit),
            Err(err) => format!("{}\nError: {}", failure, err),
        }))
    }

    async fn dispatch(&mut self, command: ConsoleCommand) -> Result<Reply, AppRunError> {
        let message = match command {
            ConsoleCommand::Scan => {
                self.manager.start_scan().await?;
                format!("Scanning for {} seconds...", SCAN_WINDOW / 1000)
            },
            ConsoleCommand::StopScan => {
                self.manager.stop_scan().await;
                "Scan stopped".to_string()
            },
            ConsoleCommand::Wait => list_devices(&self.manager.wait_scan().await?),
            ConsoleCommand::Devices => list_devices(&self.manager.devices()),
            ConsoleCommand::Connect { target } => {
                let device = self.resolve_target(&target)?;
                let device = self.manager.connect(&device).await?;
                format!("Connected to {}", device.name)
            },
            ConsoleCommand::Disconnect => {
                if self.manager.connected_device().is_none() && !self.store.connection_state().await.connected {
                    return Ok(Reply::Message("No device is connected.".to_string()));
                }

                if self.session.status() != OperationalStatus::Idle {
                    self.session.stop();
                }
                self.manager.disconnect().await?;
                "Device disconnected.".to_string()
            },
            ConsoleCommand::Start => {
                self.session.start().await?;
                let settings = self.session.settings();
                format!("Running (speed {}, step distance {})", settings.speed, settings.step_distance)
            },
            ConsoleCommand::Pause => match self.session.pause() {
                Some(_) => "Paused".to_string(),
                None => format!("Not running ({})", self.session.status()),
            },
            ConsoleCommand::Stop => {
                self.session.stop();
                "Stopped".to_string()
            },
            ConsoleCommand::Speed { value } => return self.adjust(MotorSetting::Speed, value).await,
            ConsoleCommand::Step { value } => return self.adjust(MotorSetting::StepDistance, value).await,
            ConsoleCommand::Status => {
                let connection = match self.manager.connected_device() {
                    Some(device) => format!("connected to {}", device.name),
                    None => "not connected".to_string(),
                };
                let settings = self.session.settings();
                format!(
                    "Bluetooth: {} ({})\nMotor: {}\nSpeed: {}\nStep distance: {}",
                    connection, self.manager.state(), self.session.status(), settings.speed, settings.step_distance,
                )
            },
            ConsoleCommand::Quit => return Ok(Reply::Quit),
        };

        Ok(Reply::Message(message))
    }

    /// Reads commands line by line until `quit` or end of input, then shuts the connection
    /// manager down.
    pub async fn run<R, W>(mut self, input: R, mut output: W) -> Result<(), AppRunError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        for notice in self.greet().await {
            output.write_all(format!("{}\n", notice).as_bytes()).await?;
        }

        let mut lines = input.lines();

        'mainloop: loop {
            output.write_all(b"> ").await?;
            output.flush().await?;

            let line = match lines.next_line().await? {
                Some(line) => line,
                None => break 'mainloop,
            };
            if line.trim().is_empty() {
                continue;
            }

            let text = match ConsoleLine::parse_line(&line) {
                Err(err) => err.render().to_string(),
                Ok(command) => match self.execute(command).await {
                    Ok(Reply::Quit) => break 'mainloop,
                    Ok(Reply::Message(message)) => message,
                    Err(err) => format!("Error: {}", err),
                },
            };

            output.write_all(format!("{}\n", text.trim_end()).as_bytes()).await?;
        }

        info!("Console closed");
        self.session.stop();
        self.manager.shutdown().await;
        Ok(())
    }
}
