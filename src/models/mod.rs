pub mod answer_config;

pub use answer_config::{AnswerConfig, Coordinate, Region};
