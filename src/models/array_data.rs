use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// File extension of every stored measurement blob.
pub const BLOB_EXTENSION: &str = "jsonl";

pub mod measurement_columns {
    pub const MEASUREMENT_TYPE: &str = "measurement type";
    pub const MEASUREMENT_ID: &str = "measurement id";
    pub const ACQUISITION_TIME: &str = "acquisition time [s]";
    pub const RESOLUTION: &str = "resolution [1/cm]";
    pub const POWER: &str = "power incident to the sample [mw]";
    pub const TEMPERATURE: &str = "temperature [c]";
    pub const PRESSURE: &str = "pressure [bar]";
    pub const HUMIDITY: &str = "humidity [%]";
    pub const DATE: &str = "date";

    pub const ALL: &[&str] = &[
        MEASUREMENT_TYPE,
        MEASUREMENT_ID,
        ACQUISITION_TIME,
        RESOLUTION,
        POWER,
        TEMPERATURE,
        PRESSURE,
        HUMIDITY,
        DATE,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayMeasurementType {
    pub id: Uuid,
    pub name: String,
}

impl ArrayMeasurementType {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.trim().to_lowercase(),
        }
    }
}

/// One instrument reading on a bio sample. `data` is the blob name in the
/// blob store; `checksum` and `n_points` describe its content.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArrayData {
    pub id: Uuid,
    pub instrument_id: Uuid,
    pub bio_sample_id: Uuid,
    pub measurement_type_id: Uuid,
    pub measurement_id: Option<String>,
    pub acquisition_time: Option<i64>,
    pub resolution: Option<i64>,
    pub power: Option<f64>,
    pub temperature: Option<f64>,
    pub pressure: Option<f64>,
    pub humidity: Option<f64>,
    pub date: Option<NaiveDateTime>,
    pub data: String,
    pub checksum: String,
    pub n_points: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl ArrayData {
    /// `<patient>_<sample>_<measurement>.jsonl`
    pub fn generate_filename(&self, patient_id: &Uuid) -> String {
        format!(
            "{patient_id}_{}_{}.{BLOB_EXTENSION}",
            self.bio_sample_id, self.id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_names_patient_sample_and_measurement() {
        let data = ArrayData {
            id: Uuid::new_v4(),
            bio_sample_id: Uuid::new_v4(),
            ..Default::default()
        };
        let patient = Uuid::new_v4();
        let name = data.generate_filename(&patient);
        assert!(name.starts_with(&patient.to_string()));
        assert!(name.contains(&data.bio_sample_id.to_string()));
        assert!(name.ends_with(&format!("{}.jsonl", data.id)));
    }

    #[test]
    fn measurement_type_name_normalized() {
        assert_eq!(ArrayMeasurementType::new(" ATR-FTIR ").name, "atr-ftir");
    }
}
