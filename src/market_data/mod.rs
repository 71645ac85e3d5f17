pub mod oracle;

pub use oracle::{NullPositionProvider, PositionProvider, PriceOracle, StaticPriceOracle};
