//! Memory protection for secret material
//!
//! Provides two hardening measures:
//!
//! 1. **Core dump prevention**: disables core dumps via `setrlimit(RLIMIT_CORE, 0)`
//!    so that a crash during recovery never writes a master secret to disk.
//!
//! 2. **Locked, zeroizing buffers**: [`SecretBuffer`] locks its pages via `mlock()`
//!    and wipes them on drop. Locks are counted per page, so small buffers
//!    sharing a page keep it locked until the last of them is dropped.
//!
//! Both are best-effort: failures are logged but never fail the caller.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use zeroize::Zeroize;

static CORE_DUMPS_DISABLED: AtomicBool = AtomicBool::new(false);

/// Disable core dumps for the current process.
///
/// Returns `true` if core dumps were successfully disabled (or already were).
///
/// # Example
/// ```
/// seedshard_core::memory::disable_core_dumps();
/// ```
pub fn disable_core_dumps() -> bool {
    if CORE_DUMPS_DISABLED.swap(true, Ordering::SeqCst) {
        return true;
    }

    #[cfg(unix)]
    {
        unix::disable_core_dumps_impl()
    }

    #[cfg(not(unix))]
    {
        log::warn!("core dump prevention not supported on this platform");
        false
    }
}

/// A heap buffer for secret bytes.
///
/// The buffer never reallocates after creation, so the locked region stays
/// valid for its whole lifetime. Contents are zeroized before the pages are
/// unlocked and freed.
///
/// # Example
/// ```
/// use seedshard_core::SecretBuffer;
/// let secret = SecretBuffer::from_slice(&[0x42; 16]);
/// assert_eq!(secret.len(), 16);
/// assert_eq!(format!("{:?}", secret), "SecretBuffer(16 bytes)");
/// ```
pub struct SecretBuffer {
    data: Vec<u8>,
    locked: bool,
}

impl SecretBuffer {
    /// Create a zero-filled buffer of `len` bytes and lock it in memory.
    pub fn new(len: usize) -> Self {
        let data = vec![0u8; len];
        let locked = if data.is_empty() {
            true
        } else {
            // SAFETY: `data` is a live allocation of exactly `data.len()` bytes
            // and is only freed in `Drop`, after `munlock`.
            unsafe { lock_region(data.as_ptr(), data.len()) }
        };

        if !locked {
            log::warn!("failed to mlock {} byte secret buffer; it may be swapped", len);
        }

        Self { data, locked }
    }

    /// Copy `bytes` into a new locked buffer.
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut buf = Self::new(bytes.len());
        buf.data.copy_from_slice(bytes);
        buf
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether the pages are actually locked.
    pub fn is_locked(&self) -> bool {
        self.locked
    }
}

impl From<Vec<u8>> for SecretBuffer {
    /// Moves the bytes into locked memory and wipes the source vector.
    fn from(mut bytes: Vec<u8>) -> Self {
        let buf = Self::from_slice(&bytes);
        bytes.zeroize();
        buf
    }
}

impl AsRef<[u8]> for SecretBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl Clone for SecretBuffer {
    fn clone(&self) -> Self {
        Self::from_slice(&self.data)
    }
}

impl PartialEq for SecretBuffer {
    /// Length-revealing but otherwise constant-time comparison.
    fn eq(&self, other: &Self) -> bool {
        if self.data.len() != other.data.len() {
            return false;
        }
        self.data
            .iter()
            .zip(other.data.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl Eq for SecretBuffer {}

impl fmt::Debug for SecretBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBuffer({} bytes)", self.data.len())
    }
}

impl Drop for SecretBuffer {
    fn drop(&mut self) {
        // Slice zeroize keeps the length, so the unlock below covers the same region.
        self.data.as_mut_slice().zeroize();

        if self.locked && !self.data.is_empty() {
            // SAFETY: same pointer and length that were passed to `lock_region`.
            unsafe {
                unlock_region(self.data.as_ptr(), self.data.len());
            }
        }
    }
}

/// Lock counts of every page some live buffer has locked
static LOCKED_PAGES: Mutex<PageTable> = Mutex::new(PageTable::new());

/// Per-page reference counts for `mlock`
///
/// `munlock` is not counted by the kernel, so a page is only unlocked once
/// no live buffer overlaps it.
struct PageTable {
    counts: BTreeMap<usize, usize>,
}

impl PageTable {
    const fn new() -> Self {
        Self {
            counts: BTreeMap::new(),
        }
    }

    fn acquire(&mut self, pages: std::ops::Range<usize>) {
        for page in pages {
            *self.counts.entry(page).or_insert(0) += 1;
        }
    }

    /// Drop one reference per page; returns the pages nobody holds anymore
    fn release(&mut self, pages: std::ops::Range<usize>) -> Vec<usize> {
        let mut free = Vec::new();
        for page in pages {
            if let Some(count) = self.counts.get_mut(&page) {
                *count -= 1;
                if *count == 0 {
                    self.counts.remove(&page);
                    free.push(page);
                }
            }
        }
        free
    }
}

/// Page numbers covered by `len` bytes at `addr`
fn page_range(addr: usize, len: usize, page_size: usize) -> std::ops::Range<usize> {
    addr / page_size..(addr + len).div_ceil(page_size)
}

unsafe fn lock_region(ptr: *const u8, len: usize) -> bool {
    #[cfg(unix)]
    {
        // The table lock is held across the syscall so a concurrent release
        // cannot unlock a page between our mlock and our count.
        let mut table = LOCKED_PAGES.lock().unwrap_or_else(|e| e.into_inner());
        if !unix::mlock_impl(ptr, len) {
            return false;
        }
        table.acquire(page_range(ptr as usize, len, unix::page_size()));
        true
    }

    #[cfg(not(unix))]
    {
        let _ = (ptr, len, &LOCKED_PAGES, page_range);
        false
    }
}

unsafe fn unlock_region(ptr: *const u8, len: usize) -> bool {
    #[cfg(unix)]
    {
        let page_size = unix::page_size();
        let mut table = LOCKED_PAGES.lock().unwrap_or_else(|e| e.into_inner());
        let mut ok = true;
        for page in table.release(page_range(ptr as usize, len, page_size)) {
            ok &= unix::munlock_impl((page * page_size) as *const u8, page_size);
        }
        ok
    }

    #[cfg(not(unix))]
    {
        let _ = (ptr, len);
        true
    }
}

// ---- Platform implementations ----

#[cfg(unix)]
mod unix {
    pub fn disable_core_dumps_impl() -> bool {
        // SAFETY: setrlimit with RLIMIT_CORE=0 is a standard POSIX operation
        unsafe {
            let rlim = libc::rlimit {
                rlim_cur: 0,
                rlim_max: 0,
            };
            if libc::setrlimit(libc::RLIMIT_CORE, &rlim) != 0 {
                log::warn!(
                    "failed to disable core dumps: {}",
                    std::io::Error::last_os_error()
                );
                return false;
            }
        }
        true
    }

    pub unsafe fn mlock_impl(ptr: *const u8, len: usize) -> bool {
        if libc::mlock(ptr as *const libc::c_void, len) != 0 {
            log::debug!("mlock failed: {}", std::io::Error::last_os_error());
            return false;
        }
        true
    }

    pub unsafe fn munlock_impl(ptr: *const u8, len: usize) -> bool {
        libc::munlock(ptr as *const libc::c_void, len) == 0
    }

    pub fn page_size() -> usize {
        // SAFETY: sysconf has no preconditions
        match unsafe { libc::sysconf(libc::_SC_PAGESIZE) } {
            size if size > 0 => size as usize,
            _ => 4096,
        }
    }
}
