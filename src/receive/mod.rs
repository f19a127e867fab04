pub mod finalizer;
pub mod handlers;
pub mod reaper;
mod registry;
mod session;
pub mod writer;

pub use registry::SessionRegistry;
pub use session::{SessionHandle, SessionKey, UploadSession};
