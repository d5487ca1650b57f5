pub mod engines;
pub mod mappers;
pub mod messaging;
pub mod services;
pub mod settings;
pub mod telemetry;
