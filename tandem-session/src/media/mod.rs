mod devices;
mod media_manager;
mod track;

pub use devices::*;
pub use media_manager::*;
pub use track::*;
