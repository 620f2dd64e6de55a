//! Sistema de archivos mínimo dentro de una sola imagen de tamaño fijo:
//! superbloque, dos bitmaps, tabla de inodos y área de datos con punteros directos.

pub mod allocator;
pub mod bitmap;
pub mod device;
pub mod error;
pub mod fs;
pub mod fsck;
pub mod inode_table;
pub mod superblock;
pub mod types;

pub use crate::error::{FsError, Result};
pub use crate::fs::FileSystem;
pub use crate::fsck::{CheckReport, Issue};
pub use crate::types::{FileEntry, Geometry, Usage};
