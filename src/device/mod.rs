mod service;

pub use service::DeviceStatusStore;
