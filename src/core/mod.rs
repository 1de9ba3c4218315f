pub mod etl;
pub mod manifest;
pub mod traffic;
pub mod transform;
pub mod weather;

pub use crate::domain::model::{TrafficRecord, TransformOutput};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
