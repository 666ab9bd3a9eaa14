pub mod createsuperuser;
pub mod dispatch;
pub(crate) mod helpers;
pub mod import;
pub mod migrate;
pub(crate) mod reconstitute;
pub mod squash;

pub use dispatch::dispatch;
