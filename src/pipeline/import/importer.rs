use rusqlite::{Connection, Transaction};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::codec::{decode, encode, ArrayPayload};
use super::format::Upload;
use super::hash::compute_content_hash;
use super::reader::{parse_index, read_measurement_table, read_table};
use super::staging::{is_temp_blob, BlobStore, TEMP_FILENAME_PREFIX};
use super::table::{JoinedRow, MeasurementTable, Table};
use super::validation::{
    cast_observation, check_observable_visible, join_with_validation, validate_lengths,
};
use super::ImportError;
use crate::config::{IndexColumn, IngestConfig};
use crate::db::{repository, DatabaseError};
use crate::models::{
    measurement_columns, sample_columns, ArrayData, BioSample, Center, Observable, Observation,
    Patient, Visit, DAYS_OBSERVED_COLUMN, INSTRUMENT_COLUMN, PATIENT_CID_COLUMN,
};
use crate::pipeline::qc::{self, QcError, QcRegistry};

/// Counts of what one ingestion call persisted (or would have, for a dry run).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestResult {
    pub patients_created: usize,
    pub patients_reused: usize,
    pub visits: usize,
    pub bio_samples: usize,
    pub measurements: usize,
    pub observations: usize,
    pub annotations: usize,
    /// Blob names written. Removed again after a dry run.
    pub blobs: Vec<String>,
    pub dry_run: bool,
}

/// Read, validate, join and ingest a meta-data / measurement upload pair.
pub fn ingest(
    conn: &Connection,
    store: &dyn BlobStore,
    meta: &Upload,
    measurements: &Upload,
    center: &Center,
    config: &IngestConfig,
    dry_run: bool,
) -> Result<IngestResult, ImportError> {
    let index_column = config.index_column.as_str();
    let meta_table = read_table(meta, None, index_column)?;
    let measurement_table = read_measurement_table(measurements, None, index_column)?;

    tracing::info!(
        meta = %meta.name,
        measurements = %measurements.name,
        rows = meta_table.len(),
        dropped_rows = meta_table.dropped_rows + measurement_table.dropped_rows,
        "Upload read"
    );

    ingest_tables(conn, store, meta_table, measurement_table, center, config, dry_run)
}

/// Validate the pair of tables then ingest their join.
pub fn ingest_tables(
    conn: &Connection,
    store: &dyn BlobStore,
    meta: Table,
    measurements: MeasurementTable,
    center: &Center,
    config: &IngestConfig,
    dry_run: bool,
) -> Result<IngestResult, ImportError> {
    validate_lengths(&meta, &measurements)?;
    let joined = join_with_validation(meta, measurements)?;
    ingest_joined(conn, store, &joined, center, config, dry_run)
}

/// Ingest pre-joined rows as one atomic unit. No alignment checks are made here.
///
/// On any failure the transaction rolls back and every blob written by this
/// call is deleted. Blobs carrying the temporary marker are always deleted
/// afterwards, so a dry run leaves neither rows nor blobs behind.
pub fn ingest_joined(
    conn: &Connection,
    store: &dyn BlobStore,
    rows: &[JoinedRow],
    center: &Center,
    config: &IngestConfig,
    dry_run: bool,
) -> Result<IngestResult, ImportError> {
    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    let mut pending: Vec<String> = Vec::new();

    let outcome = ingest_rows(&tx, store, rows, center, config, dry_run, &mut pending)
        .and_then(|result| finish(tx, dry_run).map(|()| result));

    if let Err(err) = &outcome {
        tracing::warn!(error = %err, blobs = pending.len(), "Ingestion failed, removing written blobs");
        delete_blobs(store, pending.drain(..));
    }
    delete_blobs(store, pending.iter().filter(|name| is_temp_blob(name)).cloned());

    if let Ok(result) = &outcome {
        tracing::info!(
            center = %center.name,
            dry_run,
            patients_created = result.patients_created,
            patients_reused = result.patients_reused,
            visits = result.visits,
            measurements = result.measurements,
            observations = result.observations,
            annotations = result.annotations,
            "Ingestion complete"
        );
    }
    outcome
}

fn finish(tx: Transaction<'_>, dry_run: bool) -> Result<(), ImportError> {
    if dry_run {
        tx.rollback().map_err(DatabaseError::from)?;
    } else {
        tx.commit().map_err(DatabaseError::from)?;
    }
    Ok(())
}

/// Delete blobs, logging failures. Never fails: the caller's error wins.
fn delete_blobs(store: &dyn BlobStore, names: impl Iterator<Item = String>) {
    for name in names {
        if let Err(e) = store.delete(&name) {
            tracing::warn!(blob = %name, error = %e, "Failed to delete blob");
        }
    }
}

fn ingest_rows(
    conn: &Connection,
    store: &dyn BlobStore,
    rows: &[JoinedRow],
    center: &Center,
    config: &IngestConfig,
    dry_run: bool,
    pending: &mut Vec<String>,
) -> Result<IngestResult, ImportError> {
    let observables = repository::visible_observables(conn, &center.id)?;
    let registry = config.auto_annotate.then(QcRegistry::with_builtins);

    let mut result = IngestResult {
        dry_run,
        ..Default::default()
    };

    for (n, row) in rows.iter().enumerate() {
        tracing::debug!(row = n + 1, index = %row.index, "Ingesting row");

        let patient = resolve_patient(conn, row, center, config, &mut result)?;
        let visit = create_visit(conn, row, &patient, config)?;
        result.visits += 1;

        let sample = create_bio_sample(conn, row, &visit)?;
        result.bio_samples += 1;

        let (data, payload) = create_measurement(conn, store, row, &patient, &sample, dry_run, pending)?;
        result.measurements += 1;
        result.blobs.push(data.data.clone());

        result.observations += save_observations(conn, row, &visit, center, &observables)?;

        if let Some(registry) = &registry {
            let annotations = qc::annotate(conn, registry, &data, &payload, None, false)
                .map_err(|e| match e {
                    QcError::Database(db) => ImportError::Database(db),
                    QcError::Import(import) => import,
                    other => ImportError::Validation(format!("QC annotation failed: {other}")),
                })?;
            result.annotations += annotations.len();
        }
    }

    Ok(result)
}

fn optional_uuid(row: &JoinedRow, column: &str) -> Result<Option<Uuid>, ImportError> {
    let cell = row.get(column);
    if cell.is_null() {
        return Ok(None);
    }
    parse_index(cell).map(Some)
}

/// Look the subject up by (index, centre); create it when absent.
fn resolve_patient(
    conn: &Connection,
    row: &JoinedRow,
    center: &Center,
    config: &IngestConfig,
    result: &mut IngestResult,
) -> Result<Patient, ImportError> {
    let existing = match config.index_column {
        IndexColumn::PatientId => repository::find_patient_by_id(conn, &row.index, &center.id)?,
        IndexColumn::PatientCid => repository::find_patient_by_cid(conn, &row.index, &center.id)?,
    };
    if let Some(patient) = existing {
        result.patients_reused += 1;
        return Ok(patient);
    }

    let patient = match config.index_column {
        IndexColumn::PatientId => Patient::new(
            row.index,
            optional_uuid(row, PATIENT_CID_COLUMN)?,
            center.id,
        ),
        IndexColumn::PatientCid => Patient::new(
            optional_uuid(row, IndexColumn::PatientId.as_str())?.unwrap_or_else(Uuid::new_v4),
            Some(row.index),
            center.id,
        ),
    };
    patient.validate()?;
    repository::insert_patient(conn, &patient)?;
    result.patients_created += 1;
    Ok(patient)
}

/// Most recent visit of the subject, refusing to guess between visits
/// created at the same instant.
fn find_previous_visit(conn: &Connection, patient: &Patient) -> Result<Option<Visit>, ImportError> {
    let visits = repository::get_visits_for_patient(conn, &patient.patient_id)?;
    match visits.as_slice() {
        [latest, second, ..] if latest.created_at == second.created_at => {
            Err(ImportError::Validation(format!(
                "Auto previous visit ambiguity: multiple visits have the exact same 'created_at' timestamp - '{}'",
                latest.created_at
            )))
        }
        [latest, ..] => Ok(Some(latest.clone())),
        [] => Ok(None),
    }
}

fn create_visit(
    conn: &Connection,
    row: &JoinedRow,
    patient: &Patient,
    config: &IngestConfig,
) -> Result<Visit, ImportError> {
    let mut visit = Visit::new(patient.patient_id, row.int(DAYS_OBSERVED_COLUMN)?);
    let previous = if config.auto_find_previous_visit {
        find_previous_visit(conn, patient)?
    } else {
        None
    };
    visit.previous_visit_id = previous.as_ref().map(|v| v.id);
    visit.validate(previous.as_ref())?;
    repository::insert_visit(conn, &visit)?;
    Ok(visit)
}

fn create_bio_sample(conn: &Connection, row: &JoinedRow, visit: &Visit) -> Result<BioSample, ImportError> {
    let type_name = row.text(sample_columns::SAMPLE_TYPE).unwrap_or_default();
    let sample_type = repository::find_bio_sample_type(conn, &type_name)?.ok_or_else(|| {
        ImportError::Reference {
            entity: "BioSampleType",
            key: type_name.clone(),
        }
    })?;

    let now = crate::models::now();
    let sample = BioSample {
        id: Uuid::new_v4(),
        visit_id: visit.id,
        sample_type_id: sample_type.id,
        sample_cid: row.text(sample_columns::SAMPLE_CID),
        sample_study_id: row.text(sample_columns::SAMPLE_STUDY_ID),
        sample_study_name: row.text(sample_columns::SAMPLE_STUDY_NAME),
        sample_processing: row.text(sample_columns::SAMPLE_PROCESSING),
        sample_extraction: row.text(sample_columns::SAMPLE_EXTRACTION),
        sample_extraction_tube: row.text(sample_columns::SAMPLE_EXTRACTION_TUBE),
        centrifuge_time: row.int(sample_columns::CENTRIFUGE_TIME)?,
        centrifuge_rpm: row.int(sample_columns::CENTRIFUGE_RPM)?,
        freezing_temp: row.float(sample_columns::FREEZING_TEMP)?,
        thawing_temp: row.float(sample_columns::THAWING_TEMP)?,
        thawing_time: row.float(sample_columns::THAWING_TIME)?,
        freezing_time: row.float(sample_columns::FREEZING_TIME)?,
        created_at: now,
        updated_at: now,
    };
    repository::insert_bio_sample(conn, &sample)?;
    Ok(sample)
}

/// Encode the row's arrays, write the blob, then persist the measurement.
/// The blob name is recorded in `pending` as soon as it exists.
fn create_measurement(
    conn: &Connection,
    store: &dyn BlobStore,
    row: &JoinedRow,
    patient: &Patient,
    sample: &BioSample,
    dry_run: bool,
    pending: &mut Vec<String>,
) -> Result<(ArrayData, ArrayPayload), ImportError> {
    let instrument_key = row.text(INSTRUMENT_COLUMN).unwrap_or_default();
    let instrument = match optional_uuid(row, INSTRUMENT_COLUMN).ok().flatten() {
        Some(id) => repository::get_instrument(conn, &id)?,
        None => None,
    }
    .ok_or_else(|| ImportError::Reference {
        entity: "Instrument",
        key: instrument_key,
    })?;

    let type_name = row.text(measurement_columns::MEASUREMENT_TYPE).unwrap_or_default();
    let measurement_type = repository::find_measurement_type(conn, &type_name)?.ok_or_else(|| {
        ImportError::Reference {
            entity: "ArrayMeasurementType",
            key: type_name.clone(),
        }
    })?;

    let payload = ArrayPayload {
        patient_id: patient.patient_id,
        wavelength: row.wavelength.clone(),
        intensity: row.intensity.clone(),
    };
    let bytes = encode(&payload.patient_id, &payload.wavelength, &payload.intensity)?;

    let now = crate::models::now();
    let mut data = ArrayData {
        id: Uuid::new_v4(),
        instrument_id: instrument.id,
        bio_sample_id: sample.id,
        measurement_type_id: measurement_type.id,
        measurement_id: row.text(measurement_columns::MEASUREMENT_ID),
        acquisition_time: row.int(measurement_columns::ACQUISITION_TIME)?,
        resolution: row.int(measurement_columns::RESOLUTION)?,
        power: row.float(measurement_columns::POWER)?,
        temperature: row.float(measurement_columns::TEMPERATURE)?,
        pressure: row.float(measurement_columns::PRESSURE)?,
        humidity: row.float(measurement_columns::HUMIDITY)?,
        date: row.datetime(measurement_columns::DATE)?,
        data: String::new(),
        checksum: compute_content_hash(&bytes),
        n_points: payload.n_points() as i64,
        created_at: now,
        updated_at: now,
    };
    let filename = data.generate_filename(&patient.patient_id);
    data.data = if dry_run {
        format!("{TEMP_FILENAME_PREFIX}{filename}")
    } else {
        filename
    };

    store.write(&data.data, &bytes)?;
    pending.push(data.data.clone());

    repository::insert_array_data(conn, &data)?;
    Ok((data, payload))
}

/// One observation per visible observable with a non-null value in the row.
fn save_observations(
    conn: &Connection,
    row: &JoinedRow,
    visit: &Visit,
    center: &Center,
    observables: &[Observable],
) -> Result<usize, ImportError> {
    let mut saved = 0;
    for observable in observables {
        let value = row.get(&observable.column_name());
        if value.is_null() {
            continue;
        }
        check_observable_visible(observable, &center.id)?;
        let stored = cast_observation(observable, value)?;
        let observation = Observation::new(visit.id, observable.id, Some(stored));
        repository::insert_observation(conn, &observation)?;
        saved += 1;
    }
    Ok(saved)
}

/// Re-read a measurement's blob and check it against the stored checksum and
/// point count.
pub fn verify_measurement(store: &dyn BlobStore, data: &ArrayData) -> Result<ArrayPayload, ImportError> {
    let bytes = store.read(&data.data)?;
    let checksum = compute_content_hash(&bytes);
    if checksum != data.checksum {
        return Err(ImportError::Validation(format!(
            "checksum mismatch for '{}': stored {}, computed {checksum}",
            data.data, data.checksum
        )));
    }
    let payload = decode(&bytes)?;
    if payload.n_points() as i64 != data.n_points {
        return Err(ImportError::Shape(format!(
            "'{}' holds {} points, {} recorded",
            data.data,
            payload.n_points(),
            data.n_points
        )));
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::count_rows;
    use crate::pipeline::import::FsBlobStore;
    use crate::test_util::{meta_csv, seeded, spectra_csv, Seed};

    fn setup() -> (tempfile::TempDir, FsBlobStore, Connection, Seed) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path().join("array_data"));
        let (conn, seed) = seeded();
        (dir, store, conn, seed)
    }

    fn counts(conn: &Connection) -> Vec<i64> {
        ["patient", "visit", "bio_sample", "array_data", "observation", "qc_annotation"]
            .iter()
            .map(|t| count_rows(conn, t).unwrap())
            .collect()
    }

    fn uploads(seed: &Seed, meta_rows: usize, spectra_rows: usize) -> (Upload, Upload) {
        (
            Upload::new("meta.csv", meta_csv(seed, meta_rows, None)),
            Upload::new("spectra.csv", spectra_csv(spectra_rows)),
        )
    }

    #[test]
    fn end_to_end_ten_rows() {
        let (_dir, store, conn, seed) = setup();
        let (meta, spectra) = uploads(&seed, 10, 10);

        let result = ingest(&conn, &store, &meta, &spectra, &seed.center, &IngestConfig::default(), false)
            .unwrap();

        assert_eq!(result.patients_created, 10);
        assert_eq!(result.visits, 10);
        assert_eq!(result.bio_samples, 10);
        assert_eq!(result.measurements, 10);
        // Row 3 leaves body temperature blank.
        assert_eq!(result.observations, 19);
        assert_eq!(result.annotations, 10);
        assert_eq!(counts(&conn), vec![10, 10, 10, 10, 19, 10]);
        assert_eq!(store.list().unwrap().len(), 10);
    }

    #[test]
    fn stored_blob_verifies() {
        let (_dir, store, conn, seed) = setup();
        let (meta, spectra) = uploads(&seed, 2, 2);
        ingest(&conn, &store, &meta, &spectra, &seed.center, &IngestConfig::default(), false).unwrap();

        for data in repository::list_array_data(&conn).unwrap() {
            let payload = verify_measurement(&store, &data).unwrap();
            assert_eq!(payload.n_points() as i64, data.n_points);
        }
    }

    #[test]
    fn tampered_blob_fails_verification() {
        let (_dir, store, conn, seed) = setup();
        let (meta, spectra) = uploads(&seed, 1, 1);
        ingest(&conn, &store, &meta, &spectra, &seed.center, &IngestConfig::default(), false).unwrap();

        let data = repository::list_array_data(&conn).unwrap().remove(0);
        store.write(&data.data, b"{}").unwrap();
        assert!(matches!(
            verify_measurement(&store, &data),
            Err(ImportError::Validation(_))
        ));
    }

    #[test]
    fn misaligned_tables_rejected_before_any_write() {
        let (_dir, store, conn, seed) = setup();
        let (meta, spectra) = uploads(&seed, 9, 10);

        let err = ingest(&conn, &store, &meta, &spectra, &seed.center, &IngestConfig::default(), false)
            .unwrap_err();

        assert!(matches!(err, ImportError::Alignment { meta_rows: 9, measurement_rows: 10 }));
        assert_eq!(counts(&conn), vec![0; 6]);
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn cast_failure_on_row_five_rolls_everything_back() {
        let (_dir, store, conn, seed) = setup();
        let meta = Upload::new("meta.csv", meta_csv(&seed, 10, Some(5)));
        let spectra = Upload::new("spectra.csv", spectra_csv(10));

        let err = ingest(&conn, &store, &meta, &spectra, &seed.center, &IngestConfig::default(), false)
            .unwrap_err();

        match err {
            ImportError::TypeCast { name, value, .. } => {
                assert_eq!(name, "body_temperature");
                assert_eq!(value, "warm");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(counts(&conn), vec![0; 6]);
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn dry_run_leaves_no_trace() {
        let (_dir, store, conn, seed) = setup();
        let (meta, spectra) = uploads(&seed, 10, 10);
        let before = counts(&conn);

        let result = ingest(&conn, &store, &meta, &spectra, &seed.center, &IngestConfig::default(), true)
            .unwrap();

        assert!(result.dry_run);
        assert_eq!(result.measurements, 10);
        assert!(result.blobs.iter().all(|b| b.starts_with(TEMP_FILENAME_PREFIX)));
        assert_eq!(counts(&conn), before);
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn committed_blobs_survive() {
        let (_dir, store, conn, seed) = setup();
        let (meta, spectra) = uploads(&seed, 3, 3);
        let result = ingest(&conn, &store, &meta, &spectra, &seed.center, &IngestConfig::default(), false)
            .unwrap();
        for blob in &result.blobs {
            assert!(!is_temp_blob(blob));
            assert!(store.exists(blob));
        }
    }

    #[test]
    fn unknown_instrument_is_reference_error() {
        let (_dir, store, conn, seed) = setup();
        let mut other = seed.clone();
        other.instrument.id = Uuid::new_v4();
        let meta = Upload::new("meta.csv", meta_csv(&other, 2, None));
        let spectra = Upload::new("spectra.csv", spectra_csv(2));

        let err = ingest(&conn, &store, &meta, &spectra, &seed.center, &IngestConfig::default(), false)
            .unwrap_err();
        assert!(matches!(err, ImportError::Reference { entity: "Instrument", .. }));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn existing_subject_is_reused() {
        let (_dir, store, conn, seed) = setup();
        let (meta, spectra) = uploads(&seed, 4, 4);
        let config = IngestConfig {
            auto_annotate: false,
            ..Default::default()
        };
        ingest(&conn, &store, &meta, &spectra, &seed.center, &config, false).unwrap();
        let second = ingest(&conn, &store, &meta, &spectra, &seed.center, &config, false).unwrap();

        assert_eq!(second.patients_created, 0);
        assert_eq!(second.patients_reused, 4);
        assert_eq!(count_rows(&conn, "patient").unwrap(), 4);
        assert_eq!(count_rows(&conn, "visit").unwrap(), 8);
        assert_eq!(count_rows(&conn, "qc_annotation").unwrap(), 0);
    }

    #[test]
    fn auto_previous_visit_links_to_latest() {
        let (_dir, store, conn, seed) = setup();
        let (meta, spectra) = uploads(&seed, 1, 1);
        let config = IngestConfig {
            auto_find_previous_visit: true,
            ..Default::default()
        };
        ingest(&conn, &store, &meta, &spectra, &seed.center, &config, false).unwrap();
        ingest(&conn, &store, &meta, &spectra, &seed.center, &config, false).unwrap();

        let visits = repository::get_visits_for_patient(&conn, &Uuid::from_u128(1)).unwrap();
        assert_eq!(visits.len(), 2);
        assert_eq!(visits[0].previous_visit_id, Some(visits[1].id));
        assert_eq!(repository::visit_number(&conn, &visits[0]).unwrap(), 2);
    }

    #[test]
    fn pre_joined_rows_ingest_directly() {
        let (_dir, store, conn, seed) = setup();
        let meta = read_table(&Upload::new("m.csv", meta_csv(&seed, 2, None)), None, "patient_id").unwrap();
        let spectra = read_measurement_table(&Upload::new("s.csv", spectra_csv(2)), None, "patient_id").unwrap();
        let joined = join_with_validation(meta, spectra).unwrap();

        let result = ingest_joined(&conn, &store, &joined, &seed.center, &IngestConfig::default(), false)
            .unwrap();
        assert_eq!(result.measurements, 2);
    }
}
