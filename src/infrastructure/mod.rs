pub mod collaborators;

pub use collaborators::{AutoClick, ScreenCapture, TextRecognizer};
