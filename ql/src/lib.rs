pub mod learn;
pub mod model;
pub mod prelude;
pub mod util;
