pub mod pipeline;

pub use pipeline::{MessageRouter, RouteOutcome, RouteStage, APOLOGY};
