use std::path::PathBuf;
use std::str::FromStr;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use crate::patient::types::LEG_LENGTH_DEFAULT;
use crate::store::types::Preference;

#[derive(Parser, Debug)]
#[command(author, version, about = "Physiotherapy stepper motor controller", long_about = None)]
pub struct Args {
    /// path to the settings store file (JSON)
    #[arg(short, long, global = true)]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Enter the patient's data
    Intake {
        #[arg(long)]
        name: String,

        /// male or female
        #[arg(long)]
        gender: String,

        /// leg length in cm, between 30 and 70
        #[arg(long, default_value_t = LEG_LENGTH_DEFAULT.to_string())]
        leg_length: String,
    },

    /// Show the current patient data
    Patient,

    /// Manage saved patient profiles
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },

    /// Show or change preferences
    Prefs {
        #[command(subcommand)]
        action: PrefsAction,
    },

    /// Disconnect the bluetooth device and forget it
    Disconnect,

    /// Pair with the device and control the motor
    Console,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum ProfileAction {
    List,
    /// Save the current patient data under a name
    Save { name: String },
    /// Make a saved profile the current patient data
    Load { name: String },
    Delete { name: String },
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum PrefsAction {
    Show,
    Set {
        preference: PreferenceArg,

        #[arg(action = ArgAction::Set)]
        value: bool,
    },
    /// Restore the default preferences
    Reset,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferenceArg {
    AutoConnect,
    Sound,
    DarkMode,
}

impl From<PreferenceArg> for Preference {
    fn from(value: PreferenceArg) -> Self {
        match value {
            PreferenceArg::AutoConnect => Preference::AutoConnect,
            PreferenceArg::Sound => Preference::SoundEnabled,
            PreferenceArg::DarkMode => Preference::DarkMode,
        }
    }
}

/// `+` and `-` move a motor setting by one, a number sets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    Up,
    Down,
    Set(i64),
}

impl FromStr for Adjustment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "+" => Ok(Adjustment::Up),
            "-" => Ok(Adjustment::Down),
            _ => s.parse::<i64>()
                .map(Adjustment::Set)
                .map_err(|_| format!("expected +, - or a number, got {:?}", s)),
        }
    }
}

/// One line typed into the console.
#[derive(Parser, Debug, PartialEq)]
#[command(no_binary_name = true, disable_version_flag = true)]
pub struct ConsoleLine {
    #[command(subcommand)]
    pub command: ConsoleCommand,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum ConsoleCommand {
    /// Scan for devices in the background
    Scan,
    /// Stop scanning
    StopScan,
    /// Wait for the running scan to end, then list the devices
    Wait,
    /// List discovered devices
    Devices,
    /// Connect a device by its number in the list, or by id
    Connect { target: String },
    Disconnect,
    Start,
    Pause,
    Stop,
    /// Change the speed: +, - or a value between 1 and 100
    Speed {
        #[arg(allow_hyphen_values = true)]
        value: Adjustment,
    },
    /// Change the step distance: +, - or a value between 1 and 100
    Step {
        #[arg(allow_hyphen_values = true)]
        value: Adjustment,
    },
    Status,
    #[command(alias = "exit")]
    Quit,
}

impl ConsoleLine {
    pub fn parse_line(line: &str) -> Result<ConsoleCommand, clap::Error> {
        ConsoleLine::try_parse_from(line.split_whitespace()).map(|line| line.command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_lines() {
        assert_eq!(ConsoleLine::parse_line("speed +").unwrap(), ConsoleCommand::Speed { value: Adjustment::Up });
        assert_eq!(ConsoleLine::parse_line("step -").unwrap(), ConsoleCommand::Step { value: Adjustment::Down });
        assert_eq!(ConsoleLine::parse_line(" speed  80 ").unwrap(), ConsoleCommand::Speed { value: Adjustment::Set(80) });
        assert_eq!(ConsoleLine::parse_line("step -3").unwrap(), ConsoleCommand::Step { value: Adjustment::Set(-3) });
        assert_eq!(ConsoleLine::parse_line("connect 2").unwrap(), ConsoleCommand::Connect { target: "2".to_string() });
        assert_eq!(ConsoleLine::parse_line("exit").unwrap(), ConsoleCommand::Quit);
        assert!(ConsoleLine::parse_line("speed fast").is_err());
        assert!(ConsoleLine::parse_line("launch").is_err());
    }

    #[test]
    fn command_line() {
        let args = Args::try_parse_from([
            "geto-stepper", "--store", "/tmp/s.json", "intake", "--name", "Budi", "--gender", "male",
        ]).unwrap();
        assert_eq!(args.store, Some(PathBuf::from("/tmp/s.json")));
        assert_eq!(args.command, Command::Intake {
            name: "Budi".to_string(),
            gender: "male".to_string(),
            leg_length: "50".to_string(),
        });

        let args = Args::try_parse_from(["geto-stepper", "prefs", "set", "auto-connect", "true"]).unwrap();
        assert_eq!(args.command, Command::Prefs {
            action: PrefsAction::Set { preference: PreferenceArg::AutoConnect, value: true },
        });
    }
}
