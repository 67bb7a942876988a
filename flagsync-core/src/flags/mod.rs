//! Flag declarations: values, definitions and the namespaced catalog

mod catalog;
mod definition;
mod value;

pub use catalog::{qualified_name, CatalogEntry, FlagCatalog};
pub use definition::{FlagDefinition, FreezeLevel};
pub use value::{FlagKind, FlagValue};
