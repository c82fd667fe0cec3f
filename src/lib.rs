pub mod api;
pub mod extract;
pub mod metric;
pub mod model;

pub use api::{configure, Error, Gateway};
pub use extract::Readings;
pub use metric::{MetricKey, MetricSet, MetricValue};
