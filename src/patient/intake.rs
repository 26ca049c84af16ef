use std::num::IntErrorKind;
use log::info;

use crate::error::{IntakeError, StoreError};
use crate::patient::types::{Gender, PatientProfile, LEG_LENGTH_MAX, LEG_LENGTH_MIN};
use crate::store::settings::SettingsStore;
use crate::store::types::KEY_PATIENT_DATA;

/// Digits are kept, everything else typed into the field is dropped before parsing.
pub fn parse_leg_length(input: &str) -> Result<u32, IntakeError> {
    let digits: String = input.chars().filter(|c| c.is_ascii_digit()).collect();

    // a number too long for any integer type is still a number, just out of range
    let value = match digits.parse::<u64>() {
        Ok(value) => value,
        Err(err) if *err.kind() == IntErrorKind::PosOverflow => u64::MAX,
        Err(_) => return Err(IntakeError::InvalidLegLength { input: input.to_string() }),
    };

    match u32::try_from(value) {
        Ok(value) if (LEG_LENGTH_MIN..=LEG_LENGTH_MAX).contains(&value) => Ok(value),
        _ => Err(IntakeError::LegLengthOutOfRange {
            value,
            min: LEG_LENGTH_MIN,
            max: LEG_LENGTH_MAX,
        }),
    }
}

pub fn validate_intake(name: &str, gender: &str, leg_length: &str) -> Result<PatientProfile, IntakeError> {
    let leg_length = parse_leg_length(leg_length)?;
    let gender: Gender = gender.parse()?;

    Ok(PatientProfile {
        name: name.trim().to_string(),
        gender,
        leg_length,
    })
}

pub async fn submit_intake(store: &SettingsStore, profile: &PatientProfile) -> Result<(), StoreError> {
    info!("Saving patient data for {:?}", profile.name);
    store.set_json(KEY_PATIENT_DATA, profile).await
}

pub async fn current_patient(store: &SettingsStore) -> Result<Option<PatientProfile>, StoreError> {
    store.get_json(KEY_PATIENT_DATA).await
}
