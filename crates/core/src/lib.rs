pub mod filters;
pub mod models;
pub mod normalize;
pub mod traits;

pub use filters::*;
pub use models::*;
pub use normalize::*;
pub use traits::*;
