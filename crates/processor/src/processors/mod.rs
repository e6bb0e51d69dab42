//! Built-in processors.

pub mod add_fields;
pub mod convert_fields;
pub mod debug;
pub mod list_files;
pub mod lookup;
pub mod select_distinct;

pub use add_fields::AddFields;
pub use convert_fields::ConvertFieldsType;
pub use debug::DebugRecords;
pub use list_files::ListFiles;
pub use lookup::LookupRecords;
pub use select_distinct::SelectDistinctRecords;
