pub mod errors;
pub mod load;
pub mod save;

pub use errors::{LoadError, SaveError};
pub use load::{load_element_map, restore_element_map, LoadOutcome};
pub use save::{save_element_map, ElementMapBlock, NameRecord, FORMAT_ID, FORMAT_VERSION};
