//! Decoded recording structure produced by the external ATC decoder

use serde::Deserialize;
use std::collections::BTreeMap;

/// Leads in EDF signal order
pub const CANONICAL_LEADS: [&str; 6] = ["leadI", "leadII", "leadIII", "aVR", "aVL", "aVF"];

/// String encoded as an array of character codes; zero and null codes are padding
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct CharCodes(pub Vec<Option<u32>>);

impl CharCodes {
    pub fn decode(&self) -> String {
        self.0
            .iter()
            .flatten()
            .filter(|&&code| code != 0)
            .filter_map(|&code| char::from_u32(code))
            .collect()
    }
}

impl From<&str> for CharCodes {
    fn from(s: &str) -> Self {
        CharCodes(s.chars().map(|c| Some(c as u32)).collect())
    }
}

/// Device and session block of a decoded recording
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordingInfo {
    #[serde(rename = "DateRecorded", default)]
    pub date_recorded: CharCodes,
    #[serde(rename = "RecordingUUID", default)]
    pub recording_uuid: CharCodes,
    #[serde(rename = "PhoneUDID", default)]
    pub phone_udid: CharCodes,
    #[serde(rename = "PhoneModel", default)]
    pub phone_model: CharCodes,
    #[serde(rename = "RecorderSoftware", default)]
    pub recorder_software: CharCodes,
    #[serde(rename = "RecorderHardware", default)]
    pub recorder_hardware: CharCodes,
    #[serde(rename = "Location", default)]
    pub location: CharCodes,
}

/// Output of the ATC decoder
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedRecording {
    /// Sample rate in Hz
    pub frequency: f64,
    /// Nanovolts per least significant bit
    pub amplitude_resolution: f64,
    #[serde(default)]
    pub mains_frequency: f64,
    #[serde(default)]
    pub gain: f64,
    /// Raw samples by lead name
    pub samples: BTreeMap<String, Vec<i32>>,
    #[serde(rename = "Info", default)]
    pub info: RecordingInfo,
}

impl DecodedRecording {
    /// Present leads in canonical order
    pub fn present_leads(&self) -> impl Iterator<Item = (&'static str, &[i32])> + '_ {
        CANONICAL_LEADS
            .into_iter()
            .filter_map(|lead| self.samples.get(lead).map(|s| (lead, s.as_slice())))
    }

    /// Convert raw samples to millivolts: `raw / (1e6 / amplitudeResolution)`
    pub fn to_millivolts(&self, raw: &[i32]) -> Vec<f64> {
        let divider = 1e6 / self.amplitude_resolution;
        raw.iter().map(|&v| f64::from(v) / divider).collect()
    }
}
