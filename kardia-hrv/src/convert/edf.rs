//! Minimal EDF writer
//!
//! 256-byte fixed header, 256 bytes per signal header, then 1-second data records of
//! little-endian `i16` samples, signal after signal.

use chrono::{DateTime, FixedOffset};
use std::io::Write;

pub const PHYSICAL_MIN_MV: f64 = -16.38;
pub const PHYSICAL_MAX_MV: f64 = 16.38;
pub const DIGITAL_MIN: i16 = i16::MIN;
pub const DIGITAL_MAX: i16 = i16::MAX;

/// Seconds per data record
const RECORD_DURATION_SECS: usize = 1;

/// Write a fixed-width ASCII field, right-padded with spaces
fn write_field(buf: &mut Vec<u8>, value: &str, width: usize) {
    let ascii: Vec<u8> = value
        .chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c as u8 } else { b'_' })
        .take(width)
        .collect();
    buf.extend_from_slice(&ascii);
    buf.resize(buf.len() + (width - ascii.len()), b' ');
}

/// One signal, in physical units
#[derive(Debug, Clone)]
pub struct EdfSignal {
    pub label: String,
    pub dimension: String,
    pub samples_per_second: usize,
    pub samples: Vec<f64>,
}

/// Complete EDF file contents
#[derive(Debug, Clone)]
pub struct EdfFile {
    /// Patient code (spaces are not allowed inside EDF+ subfields)
    pub patient_code: String,
    pub equipment: String,
    pub start: DateTime<FixedOffset>,
    pub signals: Vec<EdfSignal>,
}

fn subfield(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        "X".to_string()
    } else {
        trimmed.replace(' ', "_")
    }
}

fn to_digital(physical: f64) -> i16 {
    let scale = (f64::from(DIGITAL_MAX) - f64::from(DIGITAL_MIN)) / (PHYSICAL_MAX_MV - PHYSICAL_MIN_MV);
    ((physical - PHYSICAL_MIN_MV) * scale + f64::from(DIGITAL_MIN))
        .round()
        .clamp(f64::from(DIGITAL_MIN), f64::from(DIGITAL_MAX)) as i16
}

impl EdfFile {
    /// Number of data records needed to hold the longest signal
    pub fn record_count(&self) -> usize {
        self.signals
            .iter()
            .map(|s| {
                let per_record = s.samples_per_second * RECORD_DURATION_SECS;
                if per_record == 0 {
                    0
                } else {
                    s.samples.len().div_ceil(per_record)
                }
            })
            .max()
            .unwrap_or(0)
    }

    fn header(&self, records: usize) -> Vec<u8> {
        let n = self.signals.len();
        let header_bytes = 256 + n * 256;
        let mut hdr = Vec::with_capacity(header_bytes);
        let local = self.start.naive_local();

        write_field(&mut hdr, "0", 8);
        write_field(
            &mut hdr,
            &format!("{} X X X", subfield(&self.patient_code)),
            80,
        );
        write_field(
            &mut hdr,
            &format!(
                "Startdate {} X X {}",
                local.format("%d-%b-%Y").to_string().to_uppercase(),
                subfield(&self.equipment)
            ),
            80,
        );
        write_field(&mut hdr, &local.format("%d.%m.%y").to_string(), 8);
        write_field(&mut hdr, &local.format("%H.%M.%S").to_string(), 8);
        write_field(&mut hdr, &header_bytes.to_string(), 8);
        write_field(&mut hdr, "", 44);
        write_field(&mut hdr, &records.to_string(), 8);
        write_field(&mut hdr, &RECORD_DURATION_SECS.to_string(), 8);
        write_field(&mut hdr, &n.to_string(), 4);

        for s in &self.signals {
            write_field(&mut hdr, &s.label, 16);
        }
        for _ in &self.signals {
            write_field(&mut hdr, "", 80);
        }
        for s in &self.signals {
            write_field(&mut hdr, &s.dimension, 8);
        }
        for _ in &self.signals {
            write_field(&mut hdr, &PHYSICAL_MIN_MV.to_string(), 8);
        }
        for _ in &self.signals {
            write_field(&mut hdr, &PHYSICAL_MAX_MV.to_string(), 8);
        }
        for _ in &self.signals {
            write_field(&mut hdr, &DIGITAL_MIN.to_string(), 8);
        }
        for _ in &self.signals {
            write_field(&mut hdr, &DIGITAL_MAX.to_string(), 8);
        }
        for _ in &self.signals {
            write_field(&mut hdr, "", 80);
        }
        for s in &self.signals {
            write_field(&mut hdr, &(s.samples_per_second * RECORD_DURATION_SECS).to_string(), 8);
        }
        for _ in &self.signals {
            write_field(&mut hdr, "", 32);
        }

        hdr
    }

    /// Serialize header and data records
    pub fn write_to<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        let records = self.record_count();
        out.write_all(&self.header(records))?;

        let mut data = Vec::new();
        for record in 0..records {
            for signal in &self.signals {
                let per_record = signal.samples_per_second * RECORD_DURATION_SECS;
                let offset = record * per_record;
                let pad = signal.samples.last().copied().unwrap_or(0.0);
                for i in 0..per_record {
                    let value = signal.samples.get(offset + i).copied().unwrap_or(pad);
                    data.extend_from_slice(&to_digital(value).to_le_bytes());
                }
            }
        }
        out.write_all(&data)
    }
}
