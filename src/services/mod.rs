pub mod charts;
pub mod dataset;
pub mod geocode;
pub mod open_meteo;
pub mod pipeline;
pub mod processor;
