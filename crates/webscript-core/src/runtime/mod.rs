pub mod context;
pub mod conversions;
pub mod signature;
