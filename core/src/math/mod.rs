pub mod convolve;
pub mod stats;

pub use convolve::filter_block;
pub use stats::StatsHelper;
