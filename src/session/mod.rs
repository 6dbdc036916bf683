pub mod buffers;
pub mod poller;
pub mod ring_buffer;
pub mod session;

pub use session::Session;
