#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod cell;
pub mod config;
pub mod error;
pub mod fit;
pub mod math;
pub mod pipeline;
pub mod plot;
pub mod sample;

pub use error::Error;

pub type Result<T> = ::std::result::Result<T, Error>;
