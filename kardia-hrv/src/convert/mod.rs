//! Raw recording → EDF conversion
//!
//! The proprietary ATC container is decoded by an external tool that prints the decoded
//! structure as JSON on stdout. This module runs that tool, maps the result onto an
//! [`EdfFile`] and writes it.

pub mod decoded;
pub mod edf;

pub use decoded::{CharCodes, DecodedRecording, RecordingInfo, CANONICAL_LEADS};
pub use edf::{EdfFile, EdfSignal};

use chrono::{DateTime, FixedOffset};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

/// Format of the `DateRecorded` info field
pub const DATE_RECORDED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Decoder command is empty")]
    EmptyDecoder,

    #[error("Failed to run decoder '{command}': {source}")]
    DecoderSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Decoder '{command}' exited with {status}: {stderr}")]
    DecoderFailed {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("Invalid decoded recording: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Recording has none of the leads {0:?}")]
    NoLeads(&'static [&'static str]),

    #[error("Unparseable DateRecorded '{value}': {source}")]
    InvalidDate {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Sample rate {0} Hz is not a positive whole number")]
    InvalidSampleRate(f64),

    #[error("Amplitude resolution {0} is not positive")]
    InvalidAmplitudeResolution(f64),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Run the external decoder with the raw file on stdin
pub async fn decode_file(decoder: &str, input: &Path) -> Result<DecodedRecording, ConvertError> {
    let mut parts = decoder.split_whitespace();
    let program = parts.next().ok_or(ConvertError::EmptyDecoder)?;

    let stdin = std::fs::File::open(input).map_err(|source| ConvertError::Io {
        path: input.to_path_buf(),
        source,
    })?;

    let output = Command::new(program)
        .args(parts)
        .stdin(Stdio::from(stdin))
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| ConvertError::DecoderSpawn {
            command: decoder.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(ConvertError::DecoderFailed {
            command: decoder.to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(serde_json::from_slice(&output.stdout)?)
}

/// Read an already decoded recording from a JSON file
pub fn load_decoded(path: &Path) -> Result<DecodedRecording, ConvertError> {
    let content = std::fs::read(path).map_err(|source| ConvertError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_slice(&content)?)
}

/// Map a decoded recording onto EDF signals and identification fields
pub fn to_edf(decoded: &DecodedRecording) -> Result<EdfFile, ConvertError> {
    let rate = decoded.frequency;
    if !(rate > 0.0 && rate.fract() == 0.0) {
        return Err(ConvertError::InvalidSampleRate(rate));
    }
    if decoded.amplitude_resolution <= 0.0 {
        return Err(ConvertError::InvalidAmplitudeResolution(
            decoded.amplitude_resolution,
        ));
    }

    let info = &decoded.info;
    let date_recorded = info.date_recorded.decode();
    let start: DateTime<FixedOffset> =
        DateTime::parse_from_str(&date_recorded, DATE_RECORDED_FORMAT).map_err(|source| {
            ConvertError::InvalidDate {
                value: date_recorded.clone(),
                source,
            }
        })?;

    let signals: Vec<EdfSignal> = decoded
        .present_leads()
        .map(|(lead, raw)| EdfSignal {
            label: lead.to_string(),
            dimension: "mV".to_string(),
            samples_per_second: rate as usize,
            samples: decoded.to_millivolts(raw),
        })
        .collect();

    if signals.is_empty() {
        return Err(ConvertError::NoLeads(&CANONICAL_LEADS));
    }

    tracing::debug!(
        uuid = %info.recording_uuid.decode(),
        hardware = %info.recorder_hardware.decode(),
        location = %info.location.decode(),
        mains_hz = decoded.mains_frequency,
        gain = decoded.gain,
        "Channels {} added",
        signals.iter().map(|s| s.label.as_str()).collect::<Vec<_>>().join(", ")
    );

    Ok(EdfFile {
        patient_code: info.recording_uuid.decode(),
        equipment: format!(
            "{}(on {})",
            info.recorder_software.decode(),
            info.phone_model.decode()
        ),
        start,
        signals,
    })
}

/// Write an EDF file
pub fn write_edf(edf: &EdfFile, path: &Path) -> Result<(), ConvertError> {
    let io_err = |source| ConvertError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = std::fs::File::create(path).map_err(io_err)?;
    let mut out = std::io::BufWriter::new(file);
    edf.write_to(&mut out).map_err(io_err)?;
    std::io::Write::flush(&mut out).map_err(io_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn decoded() -> DecodedRecording {
        let mut samples = BTreeMap::new();
        samples.insert("leadII".to_string(), vec![0; 300]);
        samples.insert("leadI".to_string(), vec![0; 300]);

        DecodedRecording {
            frequency: 300.0,
            amplitude_resolution: 500.0,
            mains_frequency: 50.0,
            gain: 1.0,
            samples,
            info: RecordingInfo {
                date_recorded: CharCodes::from("2019-06-01T14:30:05+0200"),
                recording_uuid: CharCodes::from("3f2a11e9"),
                recorder_software: CharCodes::from("Kardia 5.0"),
                phone_model: CharCodes::from("iPhone"),
                ..RecordingInfo::default()
            },
        }
    }

    #[test]
    fn test_to_edf_fields() {
        let edf = to_edf(&decoded()).unwrap();
        assert_eq!(edf.patient_code, "3f2a11e9");
        assert_eq!(edf.equipment, "Kardia 5.0(on iPhone)");
        assert_eq!(edf.signals.len(), 2);
        assert_eq!(edf.signals[0].label, "leadI");
        assert_eq!(edf.signals[0].samples_per_second, 300);
        assert_eq!(edf.start.offset().local_minus_utc(), 7200);
    }

    #[test]
    fn test_no_leads_is_error() {
        let mut d = decoded();
        d.samples.clear();
        d.samples.insert("V1".to_string(), vec![0; 10]);
        assert!(matches!(to_edf(&d), Err(ConvertError::NoLeads(_))));
    }

    #[test]
    fn test_bad_date_is_error() {
        let mut d = decoded();
        d.info.date_recorded = CharCodes::from("yesterday");
        assert!(matches!(to_edf(&d), Err(ConvertError::InvalidDate { .. })));
    }

    #[test]
    fn test_fractional_rate_is_error() {
        let mut d = decoded();
        d.frequency = 299.5;
        assert!(matches!(to_edf(&d), Err(ConvertError::InvalidSampleRate(_))));
    }

    #[test]
    fn test_write_edf_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rec.edf");
        write_edf(&to_edf(&decoded()).unwrap(), &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 256 + 2 * 256 + 2 * 300 * 2);
    }
}
