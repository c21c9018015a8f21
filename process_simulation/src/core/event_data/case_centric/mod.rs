//! Case-centric Event Data
/// Activity projection of event logs (variants and suffixes)
pub mod activity_projection;
/// Default attribute keys
pub mod constants;
pub mod csv_import;
#[doc(hidden)]
pub(crate) mod event_log_struct;
#[doc(hidden)]
/// Macros to build event logs from activity sequences
pub mod macros;
#[doc(inline)]
pub use activity_projection::EventLogActivityProjection;
#[doc(inline)]
pub use csv_import::{import_csv_path, import_csv_reader, CsvImportError, CsvImportOptions};
#[doc(inline)]
pub use event_log_struct::*;
