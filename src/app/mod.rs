pub mod app;
pub mod render;
pub mod services;
pub mod session;
pub mod shell;

pub use app::{App, InitProps};
pub use render::Renderer;
pub use session::{Phase, Session};
