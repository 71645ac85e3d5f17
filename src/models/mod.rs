pub mod ids;
pub mod order;
pub mod trade;

pub use ids::*;
pub use order::*;
pub use trade::*;
