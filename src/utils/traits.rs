use bincode::config;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{FsError, Result};

use super::digest;

/// Trait for a fixed-layout record that lives at some byte offset of a disk image.
///
/// Records are encoded with the bincode legacy configuration: fixed-width
/// little-endian integers and arrays without a length prefix, so a record made
/// only of integers and arrays always has the same encoded size.
pub trait Record: Serialize + DeserializeOwned {
    /// serialize into a [Vec](std::vec::Vec)
    fn to_bytes(&self) -> Result<Vec<u8>> {
        let config = config::legacy();
        Ok(bincode::serde::encode_to_vec(self, config)?)
    }

    /// deserialize from a slice
    /// # Returns
    /// A tuple containing the deserialized object and the number of bytes read
    fn from_bytes(buf: &[u8]) -> Result<(Self, usize)> {
        let config = config::legacy();
        Ok(bincode::serde::decode_from_slice(buf, config)?)
    }

    /// number of bytes this record occupies once encoded
    fn encoded_len(&self) -> Result<usize> {
        Ok(self.to_bytes()?.len())
    }
}

/// Trait for digesting an object which stores digest in the object itself
pub trait DigestInSelf: Serialize {
    fn digest_slot(&mut self) -> &mut [u8; 32];

    fn digest(&mut self) -> Result<()> {
        *self.digest_slot() = [0u8; 32];
        let digest = digest::digest(&*self)?;
        *self.digest_slot() = digest;
        Ok(())
    }

    fn verify_digest(&mut self) -> Result<bool> {
        // get digest from itself
        let stored = *self.digest_slot();
        // clear the digest from struct
        *self.digest_slot() = [0u8; 32];
        let calculated = digest::digest(&*self)?;
        *self.digest_slot() = stored;
        Ok(stored == calculated)
    }
}

/// Trait for records which carry their own digest
/// # Note
/// This trait is implemented for all types implementing
/// [Record] and [DigestInSelf]
pub trait SerializeAndDigest: Record + DigestInSelf {
    /// refresh the digest, then serialize
    fn to_digested_bytes(&mut self) -> Result<Vec<u8>> {
        self.digest()?;
        self.to_bytes()
    }

    /// deserialize and reject the object if its digest does not match
    fn from_verified_bytes(buf: &[u8]) -> Result<Self> {
        let (mut object, _) = Self::from_bytes(buf)?;
        if !object.verify_digest()? {
            return Err(FsError::Corrupted(
                "deserialized object digest verification failed".into(),
            ));
        }
        Ok(object)
    }
}

impl<T: Record + DigestInSelf> SerializeAndDigest for T {}
