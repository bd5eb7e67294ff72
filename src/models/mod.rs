pub mod array_data;
pub mod bio_sample;
pub mod center;
pub mod enums;
pub mod instrument;
pub mod observable;
pub mod patient;
pub mod qc;
pub mod value;
pub mod visit;

pub use array_data::*;
pub use bio_sample::*;
pub use center::*;
pub use enums::*;
pub use instrument::*;
pub use observable::*;
pub use patient::*;
pub use qc::*;
pub use value::*;
pub use visit::*;

use chrono::NaiveDateTime;
use thiserror::Error;

/// A model-level rule was broken.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct ValidationError(pub String);

/// Creation/update timestamp in UTC, as stored in `created_at`/`updated_at`.
pub fn now() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}
