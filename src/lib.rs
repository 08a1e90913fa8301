#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate serde;

#[macro_use]
pub mod log;
pub mod loader;
pub mod model;
pub mod exporter;
