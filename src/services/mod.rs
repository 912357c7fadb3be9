pub mod pod_service;

pub use pod_service::PodService;
