pub mod generator;
pub mod selection;
pub mod source;

pub use generator::{BundleGenerator, BundleOutcome};
pub use selection::{LegacyStrategy, PortfolioStrategy, SelectionStrategy};
pub use source::{GameQuery, GameSource, JsonFileGameSource, StaticGameSource};
