pub mod error;
pub mod shadows;
pub mod topics;
pub mod validate;

pub use error::*;
pub use shadows::*;
pub use topics::*;
pub use validate::*;
