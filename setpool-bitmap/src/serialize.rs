//! Portable serialization (the RoaringFormatSpec layout shared with the C
//! and Java implementations).

use crate::handle::SetHandle;
use roaring::RoaringBitmap;
use setpool_error::{Error, Result};

impl SetHandle<RoaringBitmap> {
    /// Exact number of bytes [`SetHandle::serialize`] produces.
    pub fn serialized_size(&self) -> usize {
        self.container().serialized_size()
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(self.serialized_size());
        self.container()
            .serialize_into(&mut bytes)
            .map_err(|e| Error::Serialization(format!("Failed to serialize set: {}", e)))?;
        Ok(bytes)
    }

    /// Reads a set. An empty buffer is an empty set.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Ok(Self::new());
        }

        RoaringBitmap::deserialize_from(bytes)
            .map(Self::from_container)
            .map_err(|e| Error::Serialization(format!("Failed to deserialize set: {}", e)))
    }

    /// Replaces the contents with a deserialized set. Nothing changes on
    /// error. The copy-on-write flag is kept.
    pub fn deserialize_into(&mut self, bytes: &[u8]) -> Result<()> {
        let copy_on_write = self.copy_on_write();
        *self = Self::deserialize(bytes)?;
        self.set_copy_on_write(copy_on_write);
        Ok(())
    }
}
