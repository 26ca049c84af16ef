use log::{info, warn};
use tokio::io::{stdin, stdout, BufReader};

use crate::cli::args::{Args, Command, PrefsAction, ProfileAction};
use crate::cli::console::Console;
use crate::device::btle::BtleBackend;
use crate::device::connection::ConnectionManager;
use crate::device::constants::FALLBACK_DEVICE_NAME;
use crate::error::AppRunError;
use crate::patient::intake::{current_patient, submit_intake, validate_intake};
use crate::patient::profiles::ProfileBook;
use crate::store::io::{get_store_path, StoreIO};
use crate::store::settings::SettingsStore;
use crate::store::types::Preference;

async fn show_preferences(store: &SettingsStore) -> String {
    let preferences = store.preferences().await;
    let connection = store.connection_state().await;

    let device = match (connection.connected, connection.device_name) {
        (true, Some(name)) => name,
        (true, None) => FALLBACK_DEVICE_NAME.to_string(),
        (false, _) => "none".to_string(),
    };

    format!(
        "{}: {}\n{}: {}\n{}: {}\nconnected device: {}\nversion: {}",
        Preference::AutoConnect, preferences.auto_connect,
        Preference::SoundEnabled, preferences.sound_enabled,
        Preference::DarkMode, preferences.dark_mode,
        device,
        env!("CARGO_PKG_VERSION"),
    )
}

async fn disconnect(store: &SettingsStore) -> Result<String, AppRunError> {
    let state = store.connection_state().await;
    if !state.connected {
        return Ok("No device is connected.".to_string());
    }

    match BtleBackend::new().await {
        Ok(backend) => {
            ConnectionManager::new(backend, store.clone()).disconnect().await?;
        },
        Err(err) => {
            warn!("Bluetooth is unavailable, only forgetting the device: {}", err);
            store.clear_connection().await?;
        },
    }

    Ok("Device disconnected.".to_string())
}

/// Runs one command against the store. Returns the text to print.
pub async fn execute(command: Command, store: SettingsStore) -> Result<Option<String>, AppRunError> {
    let output = match command {
        Command::Intake { name, gender, leg_length } => {
            let patient = validate_intake(&name, &gender, &leg_length)?;
            submit_intake(&store, &patient).await?;
            format!("Saved patient data for {}", patient.name)
        },
        Command::Patient => match current_patient(&store).await? {
            Some(patient) => format!(
                "name: {}\ngender: {}\nleg length: {} cm", patient.name, patient.gender, patient.leg_length,
            ),
            None => "No patient data has been entered yet.".to_string(),
        },
        Command::Profile { action } => {
            let book = ProfileBook::new(store);
            match action {
                ProfileAction::List => {
                    let names = book.list().await;
                    if names.is_empty() { "No saved profiles.".to_string() } else { names.join("\n") }
                },
                ProfileAction::Save { name } => {
                    book.save(&name).await?;
                    format!("Profile {:?} saved.", name.trim())
                },
                ProfileAction::Load { name } => {
                    book.load(&name).await?;
                    format!("Profile {:?} loaded as the current patient data.", name)
                },
                ProfileAction::Delete { name } => {
                    book.delete(&name).await?;
                    format!("Profile {:?} deleted.", name)
                },
            }
        },
        Command::Prefs { action } => match action {
            PrefsAction::Show => show_preferences(&store).await,
            PrefsAction::Set { preference, value } => {
                let preference = Preference::from(preference);
                store.set_preference(preference, value).await?;
                format!("{}: {}", preference, value)
            },
            PrefsAction::Reset => {
                store.reset_preferences().await?;
                "Preferences reset to defaults.".to_string()
            },
        },
        Command::Disconnect => disconnect(&store).await?,
        Command::Console => {
            let backend = BtleBackend::new().await?;
            let console = Console::open(backend, store).await;
            console.run(BufReader::new(stdin()), stdout()).await?;
            return Ok(None);
        },
    };

    Ok(Some(output))
}

pub async fn run_application(args: Args) -> Result<(), AppRunError> {
    let store_io = StoreIO::open(get_store_path(args.store.as_deref())?)?;
    let mut store_locker = store_io.locker()?;
    let _lock_guard = store_locker.lock()?;

    let store = match SettingsStore::load(store_io.clone()).await {
        Ok(store) => store,
        Err(err) => {
            warn!("Failed to read {}: {}", store_io.path().to_string_lossy(), err);
            return Err(err.into());
        },
    };

    if let Some(output) = execute(args.command, store).await? {
        println!("{}", output);
    }

    info!("Done");
    Ok(())
}
