pub mod callback_event;
pub mod payment;

pub use callback_event::*;
pub use payment::*;
