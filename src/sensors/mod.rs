mod service;

pub use service::{ReadingFilter, SensorRecorder, MAX_PAGE_SIZE};
