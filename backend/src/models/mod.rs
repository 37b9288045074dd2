pub mod driver;
pub mod location;
pub mod session;

pub use driver::*;
pub use location::*;
pub use session::*;
