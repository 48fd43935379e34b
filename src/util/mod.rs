//! Basic types shared by every codec: errors, binary I/O, version
//! capabilities, name hashing, and the trailer cipher.

pub mod binio;
pub mod blob;
pub mod cipher;
pub mod crc;
pub mod error;
pub mod version;

pub use binio::{Reader, Writer};
pub use blob::OpaqueBlob;
pub use error::{Error, Result};
pub use version::{Caps, CustomVersion, VersionInfo};
