// Telemetry record decoding
// Wire format: "ID=<int>,PHI=<rad>,TS=<unix s>,V=<volts>,Vbat=<volts>"

use serde::Serialize;

/// Agent identifier as reported on the wire.
pub type AgentId = i64;

/// One decoded telemetry sample. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub agent_id: AgentId,
    /// Agent-reported timestamp (agent clock, seconds)
    pub raw_timestamp: f64,
    /// Oscillator phase (radians, not wrapped)
    pub phase: f64,
    /// Light sensor voltage
    pub sensor_voltage: f64,
    /// Battery voltage
    pub battery_voltage: f64,
}

/// Reasons a telemetry record is rejected.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("missing field {0}")]
    MissingField(&'static str),
    #[error("invalid integer for {field}: {value:?}")]
    InvalidInteger { field: &'static str, value: String },
    #[error("invalid number for {field}: {value:?}")]
    InvalidFloat { field: &'static str, value: String },
    #[error("non-finite value for {0}")]
    NonFinite(&'static str),
}

/// Field order on the wire. Extraction is positional; key names are not checked.
const FIELDS: [&str; 5] = ["ID", "PHI", "TS", "V", "Vbat"];

/// Value part of the `idx`-th comma separated `key=value` field.
fn field<'a>(parts: &[&'a str], idx: usize) -> Result<&'a str, RecordError> {
    parts
        .get(idx)
        .copied()
        .and_then(|p| p.split('=').nth(1))
        .map(str::trim)
        .ok_or(RecordError::MissingField(FIELDS[idx]))
}

fn float_field(parts: &[&str], idx: usize) -> Result<f64, RecordError> {
    let raw = field(parts, idx)?;
    let value: f64 = raw.parse().map_err(|_| RecordError::InvalidFloat {
        field: FIELDS[idx],
        value: raw.to_string(),
    })?;
    if !value.is_finite() {
        return Err(RecordError::NonFinite(FIELDS[idx]));
    }
    Ok(value)
}

/// Decode one telemetry record. Fields beyond the fifth are ignored.
pub fn parse_record(msg: &str) -> Result<Sample, RecordError> {
    let parts: Vec<&str> = msg.trim().split(',').collect();

    let id_str = field(&parts, 0)?;
    let agent_id: AgentId = id_str.parse().map_err(|_| RecordError::InvalidInteger {
        field: FIELDS[0],
        value: id_str.to_string(),
    })?;

    Ok(Sample {
        agent_id,
        phase: float_field(&parts, 1)?,
        raw_timestamp: float_field(&parts, 2)?,
        sensor_voltage: float_field(&parts, 3)?,
        battery_voltage: float_field(&parts, 4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_record() {
        let s = parse_record("ID=1,PHI=0.123456,TS=1690000000.123456,V=3.300000,Vbat=3.100000\n").unwrap();
        assert_eq!(s.agent_id, 1);
        assert!((s.phase - 0.123456).abs() < 1e-12);
        assert!((s.raw_timestamp - 1690000000.123456).abs() < 1e-6);
        assert!((s.sensor_voltage - 3.3).abs() < 1e-12);
        assert!((s.battery_voltage - 3.1).abs() < 1e-12);
    }

    #[test]
    fn test_parse_negative_phase_and_extra_fields() {
        let s = parse_record("ID=12,PHI=-2.5,TS=10,V=0,Vbat=4.2,EXTRA=1").unwrap();
        assert_eq!(s.agent_id, 12);
        assert_eq!(s.phase, -2.5);
        assert_eq!(s.raw_timestamp, 10.0);
    }

    #[test]
    fn test_missing_field() {
        let err = parse_record("ID=1,PHI=0.1,TS=5.0,V=3.3").unwrap_err();
        assert_eq!(err, RecordError::MissingField("Vbat"));

        let err = parse_record("ID=1,PHI,TS=5.0,V=3.3,Vbat=3.3").unwrap_err();
        assert_eq!(err, RecordError::MissingField("PHI"));
    }

    #[test]
    fn test_non_numeric_fields() {
        assert!(matches!(
            parse_record("ID=abc,PHI=0.1,TS=5.0,V=3.3,Vbat=3.3"),
            Err(RecordError::InvalidInteger { .. })
        ));
        assert!(matches!(
            parse_record("ID=1,PHI=x,TS=5.0,V=3.3,Vbat=3.3"),
            Err(RecordError::InvalidFloat { field: "PHI", .. })
        ));
        assert_eq!(
            parse_record("ID=1,PHI=nan,TS=5.0,V=3.3,Vbat=3.3"),
            Err(RecordError::NonFinite("PHI"))
        );
    }

    #[test]
    fn test_empty_record() {
        assert!(parse_record("").is_err());
        assert!(parse_record("garbage").is_err());
    }
}
