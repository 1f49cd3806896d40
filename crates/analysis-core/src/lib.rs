pub mod adaptive;
pub mod error;
pub mod num;
pub mod traits;
pub mod types;

pub use error::*;
pub use num::*;
pub use traits::*;
pub use types::*;
