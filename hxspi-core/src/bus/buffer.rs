//! Shared transfer buffer
//!
//! One buffer per device, sized for the largest transaction. The engine
//! keeps it behind the bus lock; nothing else can reach it.

use alloc::vec::Vec;

use crate::config::{ADDRESS_LEN, READ_HEADER_LEN, WRITE_HEADER_LEN};
use crate::error::Error;

/// Fixed-capacity staging buffer for bus transactions
#[derive(Debug)]
pub struct TransferBuffer {
    data: Vec<u8>,
}

impl TransferBuffer {
    /// Allocate a zeroed buffer of `capacity` bytes
    ///
    /// Reports [`Error::ResourceExhaustion`] instead of aborting when the
    /// allocator cannot satisfy the request.
    pub fn try_new(capacity: usize) -> Result<Self, Error> {
        let mut data = Vec::new();
        data.try_reserve_exact(capacity)
            .map_err(|_| Error::ResourceExhaustion {
                requested: capacity,
            })?;
        data.resize(capacity, 0);
        Ok(Self { data })
    }

    /// Buffer capacity in bytes
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Stage a read: header followed by `len` zeroed response bytes
    ///
    /// Returns the full frame to be transferred in place.
    pub fn stage_read(
        &mut self,
        header: [u8; READ_HEADER_LEN],
        len: usize,
    ) -> Result<&mut [u8], Error> {
        let total = self.fit(READ_HEADER_LEN, len)?;
        let frame = &mut self.data[..total];
        frame.fill(0);
        frame[..READ_HEADER_LEN].copy_from_slice(&header);
        Ok(frame)
    }

    /// Stage a write: header, optional encoded address, then payload
    pub fn stage_write(
        &mut self,
        header: [u8; WRITE_HEADER_LEN],
        address: Option<[u8; ADDRESS_LEN]>,
        payload: &[u8],
    ) -> Result<&[u8], Error> {
        let address_len = if address.is_some() { ADDRESS_LEN } else { 0 };
        let body = payload
            .len()
            .checked_add(address_len)
            .ok_or(Error::ContractViolation {
                len: usize::MAX,
                limit: self.capacity(),
            })?;
        let total = self.fit(WRITE_HEADER_LEN, body)?;

        let mut offset = WRITE_HEADER_LEN;
        self.data[..offset].copy_from_slice(&header);
        if let Some(address) = address {
            self.data[offset..offset + ADDRESS_LEN].copy_from_slice(&address);
            offset += ADDRESS_LEN;
        }
        self.data[offset..total].copy_from_slice(payload);

        Ok(&self.data[..total])
    }

    fn fit(&self, header_len: usize, body_len: usize) -> Result<usize, Error> {
        header_len
            .checked_add(body_len)
            .filter(|&total| total <= self.capacity())
            .ok_or(Error::ContractViolation {
                len: body_len,
                limit: self.capacity().saturating_sub(header_len),
            })
    }
}
