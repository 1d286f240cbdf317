pub mod backend;
pub mod monitor;
pub mod util;

pub use backend::{MediaBackend, UploadFile};
pub use monitor::{MonitorConfig, MonitorState, ProgressMonitor, ProgressSource};
