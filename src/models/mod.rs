pub mod bug;
pub mod team;

pub use bug::*;
pub use team::*;
