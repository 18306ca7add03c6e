pub mod action;
pub mod coordinates;
pub mod decoder;
pub mod plan;
pub mod segmenter;

pub use action::{Action, ActionCall, ActionKind, Point};
pub use decoder::{decode, parse_call};
pub use plan::{decode_plan, Plan};
pub use segmenter::{split_response, ResponseTimings, StreamSegmenter};
