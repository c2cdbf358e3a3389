pub use crate::chunk::{ChunkDescriptor, ChunkId};
pub use crate::error::{Result, WavError};
pub use crate::metadata::MetadataMap;
pub use crate::stream::{InputStream, OutputStream};
pub use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
pub use std::io::{Read, Seek, SeekFrom, Write};
pub use tracing::{debug, warn};
