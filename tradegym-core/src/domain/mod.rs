//! Domain types for tradegym

pub mod position;
pub mod price;
pub mod window;

pub use position::{Action, ActionProbabilities, Position};
pub use price::{PricePoint, PriceSeries};
pub use window::Window;
