pub mod controller;
pub mod state;

pub use controller::{RecorderController, SessionDump};
pub use state::{ActionTag, Event, RecorderState, RecorderStatus};
