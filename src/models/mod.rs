pub mod request;
pub mod sequence;
pub mod time;

pub use request::*;
pub use sequence::*;
pub use time::*;
