// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! SharedMemoryRegion - POSIX shared memory wrapper.
//!
//! Provides safe abstraction over mmap and shm_open for zero-copy IPC.
//! All unsafe operations are encapsulated with bounds checking.

use std::ffi::CString;
use std::ptr::NonNull;

use crate::error::SharedMemoryError;
use crate::types::ChannelName;

/// Represents a mapped shared memory region.
///
/// This struct owns the mapping and will unmap it on drop. The name is
/// unlinked on drop only when [`SharedMemoryRegion::set_unlink_on_drop`]
/// asked for it, so a mapping outlives whichever process created it.
pub struct SharedMemoryRegion {
    /// Name of the shared memory object.
    name: ChannelName,
    /// Pointer to the mapped memory.
    ptr: NonNull<u8>,
    /// Size of the mapped region in bytes.
    size: usize,
    /// File descriptor for the shared memory object.
    fd: i32,
    /// Whether this instance created the object.
    created: bool,
    /// Whether to remove the name when this mapping is dropped.
    unlink_on_drop: bool,
}

// SAFETY: SharedMemoryRegion can be sent between threads as it owns its mapping.
unsafe impl Send for SharedMemoryRegion {}

// SAFETY: the region itself is never mutated through &self; concurrent access
// to the bytes is coordinated by the ring cursors and role flags.
unsafe impl Sync for SharedMemoryRegion {}

impl SharedMemoryRegion {
    /// Minimum size for a shared memory region.
    pub const MIN_SIZE: usize = 64;

    /// Maximum size for a shared memory region (1 GB).
    pub const MAX_SIZE: usize = 1024 * 1024 * 1024;

    fn check_size(name: &ChannelName, size: usize) -> Result<(), SharedMemoryError> {
        if !(Self::MIN_SIZE..=Self::MAX_SIZE).contains(&size) {
            return Err(SharedMemoryError::CreateFailed {
                name: name.to_string(),
                reason: format!(
                    "Size {} is outside {}..={}",
                    size,
                    Self::MIN_SIZE,
                    Self::MAX_SIZE
                ),
            });
        }
        Ok(())
    }

    fn c_name(name: &ChannelName) -> Result<CString, SharedMemoryError> {
        CString::new(format!("/{}", name)).map_err(|e| SharedMemoryError::CreateFailed {
            name: name.to_string(),
            reason: format!("Invalid name: {}", e),
        })
    }

    /// Remove the name so later openers get a fresh object.
    fn unlink(name: &ChannelName) -> std::io::Result<()> {
        let c_name = Self::c_name(name)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;
        // SAFETY: c_name is a valid CString
        if unsafe { libc::shm_unlink(c_name.as_ptr()) } < 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(())
    }

    /// Create a new, zero-initialised shared memory region.
    ///
    /// Fails if an object with this name already exists.
    pub fn create(name: &ChannelName, size: usize) -> Result<Self, SharedMemoryError> {
        Self::check_size(name, size)?;
        let c_name = Self::c_name(name)?;

        // SAFETY: c_name is a valid CString, flags are valid POSIX flags
        let fd = unsafe {
            libc::shm_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_RDWR | libc::O_EXCL,
                0o600,
            )
        };

        if fd < 0 {
            let errno = std::io::Error::last_os_error();
            if errno.raw_os_error() == Some(libc::EEXIST) {
                return Err(SharedMemoryError::AlreadyExists {
                    name: name.to_string(),
                });
            }
            return Err(SharedMemoryError::CreateFailed {
                name: name.to_string(),
                reason: format!("shm_open failed: {}", errno),
            });
        }

        // SAFETY: fd is a valid file descriptor
        let result = unsafe { libc::ftruncate(fd, size as libc::off_t) };
        if result < 0 {
            let errno = std::io::Error::last_os_error();
            unsafe { libc::close(fd) };
            unsafe { libc::shm_unlink(c_name.as_ptr()) };
            return Err(SharedMemoryError::CreateFailed {
                name: name.to_string(),
                reason: format!("ftruncate failed: {}", errno),
            });
        }

        let ptr = match Self::map(fd, size) {
            Ok(ptr) => ptr,
            Err(e) => {
                unsafe { libc::close(fd) };
                unsafe { libc::shm_unlink(c_name.as_ptr()) };
                return Err(e);
            }
        };

        // SAFETY: ptr is valid for size bytes
        unsafe {
            std::ptr::write_bytes(ptr.as_ptr(), 0, size);
        }

        tracing::debug!(name = %name, size = size, "Created shared memory region");

        Ok(Self {
            name: name.clone(),
            ptr,
            size,
            fd,
            created: true,
            unlink_on_drop: false,
        })
    }

    /// Open an existing shared memory region of exactly `size` bytes.
    pub fn open(name: &ChannelName, size: usize) -> Result<Self, SharedMemoryError> {
        Self::check_size(name, size)?;
        let c_name = Self::c_name(name)?;

        // SAFETY: c_name is a valid CString
        let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDWR, 0) };

        if fd < 0 {
            return Err(SharedMemoryError::CreateFailed {
                name: name.to_string(),
                reason: format!("shm_open failed: {}", std::io::Error::last_os_error()),
            });
        }

        // Mapping past the end of the object would fault on first access.
        let actual = match Self::object_size(fd) {
            Ok(actual) => actual,
            Err(reason) => {
                unsafe { libc::close(fd) };
                return Err(SharedMemoryError::MapFailed { reason });
            }
        };
        if actual != size {
            unsafe { libc::close(fd) };
            return Err(SharedMemoryError::SizeMismatch {
                name: name.to_string(),
                expected: size,
                actual,
            });
        }

        let ptr = match Self::map(fd, size) {
            Ok(ptr) => ptr,
            Err(e) => {
                unsafe { libc::close(fd) };
                return Err(e);
            }
        };

        tracing::debug!(name = %name, size = size, "Opened shared memory region");

        Ok(Self {
            name: name.clone(),
            ptr,
            size,
            fd,
            created: false,
            unlink_on_drop: false,
        })
    }

    /// Open the region if it exists, otherwise create it zero-initialised.
    pub fn open_or_create(name: &ChannelName, size: usize) -> Result<Self, SharedMemoryError> {
        match Self::create(name, size) {
            Ok(region) => Ok(region),
            Err(SharedMemoryError::AlreadyExists { .. }) => Self::open(name, size),
            Err(e) => Err(e),
        }
    }

    fn object_size(fd: i32) -> Result<usize, String> {
        // SAFETY: stat is plain old data; fstat fills it on success
        let mut stat: libc::stat = unsafe { std::mem::zeroed() };
        // SAFETY: fd is a valid descriptor and stat is a valid out pointer
        if unsafe { libc::fstat(fd, &mut stat) } < 0 {
            return Err(format!("fstat failed: {}", std::io::Error::last_os_error()));
        }
        Ok(stat.st_size as usize)
    }

    fn map(fd: i32, size: usize) -> Result<NonNull<u8>, SharedMemoryError> {
        // SAFETY: fd is valid, size is validated, offset 0 is valid
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            return Err(SharedMemoryError::MapFailed {
                reason: format!("mmap failed: {}", std::io::Error::last_os_error()),
            });
        }

        NonNull::new(ptr as *mut u8).ok_or_else(|| SharedMemoryError::MapFailed {
            reason: "mmap returned null".to_string(),
        })
    }

    /// Get the name of this shared memory region.
    pub fn name(&self) -> &ChannelName {
        &self.name
    }

    /// Get the size of this shared memory region.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether this instance created the object rather than opening it.
    pub fn created(&self) -> bool {
        self.created
    }

    /// Remove the name when this mapping is dropped. Other processes keep
    /// their existing mappings; new openers get a fresh object.
    pub fn set_unlink_on_drop(&mut self, unlink: bool) {
        self.unlink_on_drop = unlink;
    }

    /// Get a raw pointer to the shared memory.
    ///
    /// Caller must ensure proper synchronization when accessing the memory.
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Get a slice view of the shared memory.
    ///
    /// # Safety
    /// Caller must ensure no concurrent writes to the accessed region.
    pub unsafe fn as_slice(&self) -> &[u8] {
        std::slice::from_raw_parts(self.ptr.as_ptr(), self.size)
    }
}

impl Drop for SharedMemoryRegion {
    fn drop(&mut self) {
        // SAFETY: ptr and size were set during mapping
        let result = unsafe { libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.size) };
        if result < 0 {
            tracing::error!(
                name = %self.name,
                error = %std::io::Error::last_os_error(),
                "Failed to unmap shared memory"
            );
        }

        // SAFETY: fd was opened during creation
        unsafe { libc::close(self.fd) };

        if self.unlink_on_drop {
            match Self::unlink(&self.name) {
                Ok(()) => tracing::debug!(name = %self.name, "Unlinked shared memory region"),
                Err(e) => tracing::warn!(
                    name = %self.name,
                    error = %e,
                    "Failed to unlink shared memory region"
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique(tag: &str) -> ChannelName {
        ChannelName::new(format!("ringlink-region-{}-{}", tag, std::process::id())).unwrap()
    }

    #[test]
    fn test_shm_size_validation() {
        let name = unique("size");
        assert!(SharedMemoryRegion::create(&name, 10).is_err());
        assert!(SharedMemoryRegion::create(&name, SharedMemoryRegion::MAX_SIZE + 1).is_err());
    }

    #[test]
    fn test_open_or_create_shares_bytes() {
        let name = unique("share");
        let mut first = SharedMemoryRegion::open_or_create(&name, 4096).unwrap();
        first.set_unlink_on_drop(true);
        assert!(first.created());

        let second = SharedMemoryRegion::open_or_create(&name, 4096).unwrap();
        assert!(!second.created());

        unsafe { *first.as_ptr().add(100) = 0x5A };
        assert_eq!(unsafe { second.as_slice() }[100], 0x5A);
    }

    #[test]
    fn test_open_rejects_different_size() {
        let name = unique("mismatch");
        let mut region = SharedMemoryRegion::create(&name, 4096).unwrap();
        region.set_unlink_on_drop(true);
        assert!(matches!(
            SharedMemoryRegion::open(&name, 8192),
            Err(SharedMemoryError::SizeMismatch {
                expected: 8192,
                actual: 4096,
                ..
            })
        ));
    }

    #[test]
    fn test_unlink_on_drop_removes_name() {
        let name = unique("unlink");
        let mut region = SharedMemoryRegion::create(&name, 4096).unwrap();
        region.set_unlink_on_drop(true);
        drop(region);
        assert!(SharedMemoryRegion::open(&name, 4096).is_err());
    }

    #[test]
    fn test_unlink_reports_missing_name() {
        let name = unique("unlink-twice");
        let mut first = SharedMemoryRegion::create(&name, 4096).unwrap();
        let mut second = SharedMemoryRegion::open(&name, 4096).unwrap();
        first.set_unlink_on_drop(true);
        second.set_unlink_on_drop(true);

        drop(first);
        let err = SharedMemoryRegion::unlink(&name).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);

        // Second handle's unlink fails too; Drop logs it and carries on.
        drop(second);
        assert!(SharedMemoryRegion::open(&name, 4096).is_err());
    }
}
