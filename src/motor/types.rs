/**
 * Lower bound of speed and step distance.
 */
pub const SETTING_MIN: u8 = 1;

/**
 * Upper bound of speed and step distance.
 */
pub const SETTING_MAX: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationalStatus {
    Idle,
    Running,
    Paused,
}

impl std::fmt::Display for OperationalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let result = match self {
            OperationalStatus::Idle => "idle",
            OperationalStatus::Running => "running",
            OperationalStatus::Paused => "paused",
        };

        write!(f, "{}", result)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorSetting {
    Speed,
    StepDistance,
}

impl MotorSetting {
    pub fn label(&self) -> &'static str {
        match self {
            MotorSetting::Speed => "speed",
            MotorSetting::StepDistance => "step distance",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorCommand {
    Start { speed: u8, step_distance: u8 },
    Pause,
    Stop,
}

impl std::fmt::Display for MotorCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MotorCommand::Start { speed, step_distance } => {
                write!(f, "start (speed: {}, step distance: {})", speed, step_distance)
            },
            MotorCommand::Pause => write!(f, "pause"),
            MotorCommand::Stop => write!(f, "stop"),
        }
    }
}
