//! Canonical measurement blob: one ASCII line of JSON with exactly the keys
//! `patient_id`, `wavelength` and `intensity`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ImportError;

pub const CANONICAL_KEYS: [&str; 3] = ["patient_id", "wavelength", "intensity"];

/// One subject's paired independent/dependent arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayPayload {
    pub patient_id: Uuid,
    pub wavelength: Vec<f64>,
    pub intensity: Vec<f64>,
}

impl ArrayPayload {
    pub fn n_points(&self) -> usize {
        self.intensity.len()
    }
}

/// Encode to canonical bytes. Arrays must be equal length and finite.
pub fn encode(
    patient_id: &Uuid,
    wavelength: &[f64],
    intensity: &[f64],
) -> Result<Vec<u8>, ImportError> {
    if wavelength.len() != intensity.len() {
        return Err(ImportError::Shape(format!(
            "wavelength and intensity must be of equal length ({}!={})",
            wavelength.len(),
            intensity.len()
        )));
    }
    if let Some(bad) = wavelength.iter().chain(intensity).find(|v| !v.is_finite()) {
        return Err(ImportError::Parse(format!("non-finite array value '{bad}'")));
    }

    let payload = ArrayPayload {
        patient_id: *patient_id,
        wavelength: wavelength.to_vec(),
        intensity: intensity.to_vec(),
    };
    Ok(serde_json::to_vec(&payload)?)
}

/// Decode canonical bytes. Any extra or missing key is a schema error.
pub fn decode(bytes: &[u8]) -> Result<ArrayPayload, ImportError> {
    let value: serde_json::Value = serde_json::from_slice(bytes)
        .map_err(|e| ImportError::Parse(format!("invalid array data JSON: {e}")))?;

    let serde_json::Value::Object(map) = &value else {
        return Err(ImportError::Schema("array data must be a JSON object".into()));
    };

    let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
    keys.sort_unstable();
    let mut expected = CANONICAL_KEYS.to_vec();
    expected.sort_unstable();
    if keys != expected {
        return Err(ImportError::Schema(format!(
            "expected only the fields {CANONICAL_KEYS:?} but got {keys:?}"
        )));
    }

    let payload: ArrayPayload = serde_json::from_value(value)
        .map_err(|e| ImportError::Parse(format!("invalid array data: {e}")))?;
    if payload.wavelength.len() != payload.intensity.len() {
        return Err(ImportError::Shape(format!(
            "wavelength and intensity must be of equal length ({}!={})",
            payload.wavelength.len(),
            payload.intensity.len()
        )));
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn round_trip_preserves_values() {
        let id = Uuid::new_v4();
        let x = vec![4000.0, 3999.5, 651.123456789];
        let y = vec![0.1, -2.5e-7, 1.0 / 3.0];

        let bytes = encode(&id, &x, &y).unwrap();
        let decoded = decode(&bytes).unwrap();

        assert_eq!(decoded.patient_id, id);
        assert_eq!(decoded.wavelength, x);
        assert_eq!(decoded.intensity, y);
    }

    #[test]
    fn encoding_is_single_line_ascii_and_deterministic() {
        let id = Uuid::new_v4();
        let a = encode(&id, &[1.0, 2.0], &[3.0, 4.0]).unwrap();
        let b = encode(&id, &[1.0, 2.0], &[3.0, 4.0]).unwrap();
        assert_eq!(a, b);
        assert!(a.is_ascii());
        assert!(!a.contains(&b'\n'));
        let text = String::from_utf8(a).unwrap();
        assert!(text.starts_with("{\"patient_id\":"));
    }

    #[test]
    fn extra_key_is_schema_error() {
        let id = Uuid::new_v4();
        let json = format!(
            r#"{{"patient_id":"{id}","wavelength":[1.0],"intensity":[2.0],"extra":1}}"#
        );
        assert!(matches!(decode(json.as_bytes()), Err(ImportError::Schema(_))));
    }

    #[test]
    fn missing_key_is_schema_error() {
        let id = Uuid::new_v4();
        let json = format!(r#"{{"patient_id":"{id}","wavelength":[1.0]}}"#);
        assert!(matches!(decode(json.as_bytes()), Err(ImportError::Schema(_))));
    }

    #[test]
    fn unequal_lengths_rejected() {
        let err = encode(&Uuid::new_v4(), &[1.0, 2.0], &[1.0]).unwrap_err();
        assert!(matches!(err, ImportError::Shape(_)));
    }

    #[test]
    fn non_finite_rejected() {
        let err = encode(&Uuid::new_v4(), &[f64::NAN], &[1.0]).unwrap_err();
        assert!(matches!(err, ImportError::Parse(_)));
    }

    #[test]
    fn garbage_is_parse_error() {
        assert!(matches!(decode(b"not json"), Err(ImportError::Parse(_))));
        assert!(matches!(decode(b"[1,2]"), Err(ImportError::Schema(_))));
    }
}
