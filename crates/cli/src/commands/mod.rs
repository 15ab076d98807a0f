pub mod coverage;
pub mod dependencies;
pub mod output;
pub mod util;

pub use coverage::*;
pub use dependencies::*;
pub use output::*;
pub use util::*;
