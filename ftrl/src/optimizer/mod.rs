mod builder;
mod ftrl;

pub use builder::FtrlBuilder;
pub use ftrl::Ftrl;
