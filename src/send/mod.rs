mod executor;
mod progress;

pub use executor::{UploadReport, Uploader};
pub use progress::{spawn_reporter, SendProgress};
