// Domain layer: pipeline data types and ports (interfaces) to storage, LLM and script runner.

pub mod model;
pub mod ports;
