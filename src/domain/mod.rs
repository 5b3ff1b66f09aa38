// Domain layer: records, results and the ports the pipeline is written against.

pub mod model;
pub mod page;
pub mod ports;
