#[cfg(feature = "async-tokio")]
mod tokio;
#[cfg(feature = "async-tokio")]
mod tokio_rendezvous;

#[cfg(feature = "async-tokio")]
pub use self::tokio::*;
#[cfg(feature = "async-tokio")]
pub use self::tokio_rendezvous::*;
