pub mod clock;
pub mod model;
pub mod observability;
pub mod report;
pub mod store;
pub mod wire;
