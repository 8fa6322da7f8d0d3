pub mod context;

pub use context::{CommandContext, CommandContextBuilder};
