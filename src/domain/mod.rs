// Domain layer: tables, schemas, mapping rules and the ports the pipeline is built on.

pub mod mapping;
pub mod model;
pub mod ports;
pub mod schema;
