// Library root: the CSV aggregation-and-join pipeline and the file-backed
// roster store that the service layer sits on.

pub mod aggregate;
pub mod columns;
pub mod error;
pub mod names;
pub mod parse;
pub mod reconcile;
pub mod record;
pub mod roster;
pub mod serialize;

pub use error::CsvError;
pub use record::Record;
