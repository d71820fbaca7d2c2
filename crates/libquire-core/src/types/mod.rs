pub mod ids;
pub mod lamport;

pub use ids::{Id, IdParseError, ObjectId};
pub use lamport::{LamportTime, MemClock};
