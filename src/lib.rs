mod encoder;
mod error;
mod midi_reader;
mod model;
mod service;
mod store;
mod util;
mod validation;

pub use encoder::*;
pub use error::*;
pub use midi_reader::*;
pub use model::composition::*;
pub use model::config::*;
pub use model::record::*;
pub use service::*;
pub use store::*;
pub use util::*;
pub use validation::*;
