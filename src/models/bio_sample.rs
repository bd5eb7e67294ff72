use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bulk-upload column names (lower-cased display names).
pub mod sample_columns {
    pub const SAMPLE_TYPE: &str = "sample type";
    pub const SAMPLE_CID: &str = "sample cid";
    pub const SAMPLE_STUDY_ID: &str = "sample study id";
    pub const SAMPLE_STUDY_NAME: &str = "sample study name";
    pub const SAMPLE_PROCESSING: &str = "sample processing description";
    pub const SAMPLE_EXTRACTION: &str = "sample extraction description";
    pub const SAMPLE_EXTRACTION_TUBE: &str = "sample extraction tube brand name";
    pub const CENTRIFUGE_TIME: &str = "extraction tube centrifuge time [s]";
    pub const CENTRIFUGE_RPM: &str = "extraction tube centrifuge rpm";
    pub const FREEZING_TEMP: &str = "freezing temperature [c]";
    pub const THAWING_TEMP: &str = "thawing temperature [c]";
    pub const THAWING_TIME: &str = "thawing time [minutes]";
    pub const FREEZING_TIME: &str = "freezing time [days]";

    pub const ALL: &[&str] = &[
        SAMPLE_TYPE,
        SAMPLE_CID,
        SAMPLE_STUDY_ID,
        SAMPLE_STUDY_NAME,
        SAMPLE_PROCESSING,
        SAMPLE_EXTRACTION,
        SAMPLE_EXTRACTION_TUBE,
        CENTRIFUGE_TIME,
        CENTRIFUGE_RPM,
        FREEZING_TEMP,
        THAWING_TEMP,
        THAWING_TIME,
        FREEZING_TIME,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BioSampleType {
    pub id: Uuid,
    /// Stored lower-cased; lookups lower-case their input.
    pub name: String,
}

impl BioSampleType {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.trim().to_lowercase(),
        }
    }
}

/// Physical specimen taken during a visit.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BioSample {
    pub id: Uuid,
    pub visit_id: Uuid,
    pub sample_type_id: Uuid,
    pub sample_cid: Option<String>,
    pub sample_study_id: Option<String>,
    pub sample_study_name: Option<String>,
    pub sample_processing: Option<String>,
    pub sample_extraction: Option<String>,
    pub sample_extraction_tube: Option<String>,
    pub centrifuge_time: Option<i64>,
    pub centrifuge_rpm: Option<i64>,
    pub freezing_temp: Option<f64>,
    pub thawing_temp: Option<f64>,
    pub thawing_time: Option<f64>,
    pub freezing_time: Option<f64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
