pub mod input;
pub mod stream;

pub use input::InputService;
pub use stream::StreamService;
