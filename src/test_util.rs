//! Seed data and upload builders shared by tests.

use rusqlite::Connection;

use crate::db::{open_memory_database, repository};
use crate::models::{
    ArrayMeasurementType, BioSampleType, Center, Instrument, Observable, ObservableCategory,
    QcAnnotator, ValueType,
};
use crate::pipeline::qc::SUM_FILTER;

#[derive(Debug, Clone)]
pub struct Seed {
    pub center: Center,
    pub instrument: Instrument,
    pub sample_type: BioSampleType,
    pub measurement_type: ArrayMeasurementType,
    pub fever: Observable,
    pub body_temperature: Observable,
    pub annotator: QcAnnotator,
}

/// In-memory database holding one centre, instrument, sample type and
/// measurement type, two global observables and the default sum annotator.
pub fn seeded() -> (Connection, Seed) {
    let conn = open_memory_database().unwrap();

    let center = Center::new("Test Center", "USA");
    repository::insert_center(&conn, &center).unwrap();

    let instrument = Instrument::new("FTIR-1", "Agilent", "Cary 630", "SN-0001");
    repository::insert_instrument(&conn, &instrument).unwrap();

    let sample_type = BioSampleType::new("Serum");
    repository::insert_bio_sample_type(&conn, &sample_type).unwrap();

    let measurement_type = ArrayMeasurementType::new("ATR-FTIR");
    repository::insert_measurement_type(&conn, &measurement_type).unwrap();

    let mut fever = Observable::new(ObservableCategory::Symptom, "fever", ValueType::Bool);
    fever.clean().unwrap();
    repository::insert_observable(&conn, &fever).unwrap();

    let mut body_temperature =
        Observable::new(ObservableCategory::Vitals, "body_temperature", ValueType::Float);
    body_temperature.clean().unwrap();
    repository::insert_observable(&conn, &body_temperature).unwrap();

    let annotator = QcAnnotator::new("sum", SUM_FILTER, ValueType::Float);
    repository::insert_qc_annotator(&conn, &annotator).unwrap();

    let seed = Seed {
        center,
        instrument,
        sample_type,
        measurement_type,
        fever,
        body_temperature,
        annotator,
    };
    (conn, seed)
}

/// Meta-data CSV with `rows` subjects numbered from 1.
///
/// Row 3 leaves `body temperature` blank. `bad_row` (1-based) gets a body
/// temperature that cannot cast to FLOAT.
pub fn meta_csv(seed: &Seed, rows: usize, bad_row: Option<usize>) -> Vec<u8> {
    let mut csv = String::from(
        "Patient ID,Days Observed,Sample Type,Sample CID,Instrument,Measurement Type,\
         Measurement ID,Resolution [1/cm],Date,Fever,Body Temperature\n",
    );
    for i in 1..=rows {
        let temperature = if Some(i) == bad_row {
            "warm".to_string()
        } else if i == 3 {
            String::new()
        } else {
            format!("36.{i}")
        };
        let fever = if i % 2 == 0 { "yes" } else { "no" };
        csv.push_str(&format!(
            "{i},{i},Serum,S{i},{},ATR-FTIR,M{i},4,2023-01-05,{fever},{temperature}\n",
            seed.instrument.id
        ));
    }
    csv.into_bytes()
}

/// Measurement CSV matching `meta_csv`: three points per row, row `i`
/// holding intensities `i, 2i, 3i`.
pub fn spectra_csv(rows: usize) -> Vec<u8> {
    let mut csv = String::from("patient_id,1000.0,1001.5,1003.0\n");
    for i in 1..=rows {
        csv.push_str(&format!("{i},{i},{},{}\n", 2 * i, 3 * i));
    }
    csv.into_bytes()
}
