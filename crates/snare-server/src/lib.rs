mod registry;
mod tarpit;

pub use registry::{ConnectionTicket, Registry};
pub use tarpit::Tarpit;
