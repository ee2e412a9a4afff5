//! Kernel memory helpers: bounds-checked access and region allocation.
//!
//! All accessors validate offset and length arguments against the linear
//! memory size before touching it. Out-of-bounds access returns
//! `ERR_BAD_OFFSET`.

use std::collections::BTreeMap;

use tether_hostapi::{HostError, Region};

/// WASM page size in bytes.
pub const PAGE_SIZE: u64 = 65536;

/// First offset handed out by the allocator. Offset 0 stays null.
pub const KERNEL_BASE: u64 = 8;

/// Read `len` bytes from memory at `offset`.
///
/// Returns `Err(BadOffset)` if `[offset, offset+len)` is out of bounds.
pub fn read_bytes(mem: &[u8], offset: u64, len: u64) -> Result<Vec<u8>, HostError> {
    let (start, end) = checked_range(mem.len(), offset, len)?;
    Ok(mem[start..end].to_vec())
}

/// Write `data` to memory at `offset`.
///
/// Returns `Err(BadOffset)` if `[offset, offset+data.len())` is out of bounds.
pub fn write_bytes(mem: &mut [u8], offset: u64, data: &[u8]) -> Result<(), HostError> {
    let (start, end) = checked_range(mem.len(), offset, data.len() as u64)?;
    mem[start..end].copy_from_slice(data);
    Ok(())
}

/// Read a little-endian u64 at `offset`.
pub fn read_u64(mem: &[u8], offset: u64) -> Result<u64, HostError> {
    let (start, end) = checked_range(mem.len(), offset, 8)?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&mem[start..end]);
    Ok(u64::from_le_bytes(buf))
}

/// Write a little-endian u64 at `offset`.
pub fn write_u64(mem: &mut [u8], offset: u64, value: u64) -> Result<(), HostError> {
    write_bytes(mem, offset, &value.to_le_bytes())
}

/// Validate that `[offset, offset+len)` lies within `mem_size` bytes.
pub fn validate_range(mem_size: usize, offset: u64, len: u64) -> Result<(), HostError> {
    checked_range(mem_size, offset, len).map(|_| ())
}

fn checked_range(mem_size: usize, offset: u64, len: u64) -> Result<(usize, usize), HostError> {
    let end = offset.checked_add(len).ok_or_else(HostError::bad_offset)?;
    if end > mem_size as u64 {
        return Err(HostError::bad_offset());
    }
    Ok((offset as usize, end as usize))
}

/// Round up to a multiple of 8.
fn align8(size: u64) -> u64 {
    (size + 7) & !7
}

/// A planned allocation. Nothing changes until [`RegionAllocator::commit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocPlan {
    /// Offset the region will start at.
    pub offset: u64,
    /// Aligned block size reserved for the region.
    pub block: u64,
    /// Pages the memory must grow by before writing. Zero if none.
    pub grow_pages: u64,
    /// Whether the block comes from the free list.
    pub reused: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Block {
    len: u64,
    size: u64,
}

/// Region allocator over kernel memory.
///
/// New blocks are carved bump-pointer style from the end of the used area.
/// Freed blocks are merged with free neighbours and kept in a free list,
/// or handed back to the bump pointer when they end at it. Reuse is
/// first-fit and splits off whatever the request does not need. Every live
/// region is tracked so offsets can be located and validated.
#[derive(Debug, Clone)]
pub struct RegionAllocator {
    /// Next never-used offset.
    bump: u64,
    /// Total bytes of memory currently available.
    capacity: u64,
    live: BTreeMap<u64, Block>,
    /// Freed blocks: offset -> block size.
    free: BTreeMap<u64, u64>,
    live_bytes: u64,
}

impl RegionAllocator {
    /// Allocator handing out offsets from `base` within `capacity` bytes of memory.
    pub fn new(base: u64, capacity: u64) -> Self {
        Self {
            bump: base.max(KERNEL_BASE),
            capacity,
            live: BTreeMap::new(),
            free: BTreeMap::new(),
            live_bytes: 0,
        }
    }

    /// Plan an allocation of `len` bytes.
    pub fn plan(&self, len: u64) -> AllocPlan {
        let block = align8(len.max(1));
        if let Some((&offset, _)) = self.free.iter().find(|(_, size)| **size >= block) {
            return AllocPlan {
                offset,
                block,
                grow_pages: 0,
                reused: true,
            };
        }
        let end = self.bump + block;
        let grow_pages = if end <= self.capacity {
            0
        } else {
            (end - self.capacity).div_ceil(PAGE_SIZE)
        };
        AllocPlan {
            offset: self.bump,
            block,
            grow_pages,
            reused: false,
        }
    }

    /// Record a planned allocation after memory has been grown and written.
    pub fn commit(&mut self, plan: &AllocPlan, len: u64) {
        if plan.reused {
            if let Some(size) = self.free.remove(&plan.offset) {
                if size > plan.block {
                    self.free.insert(plan.offset + plan.block, size - plan.block);
                }
            }
        } else {
            self.bump = plan.offset + plan.block;
            self.capacity += plan.grow_pages * PAGE_SIZE;
        }
        self.live.insert(
            plan.offset,
            Block {
                len,
                size: plan.block,
            },
        );
        self.live_bytes += len;
    }

    /// Release the region at `offset`, returning its length.
    pub fn free(&mut self, offset: u64) -> Result<u64, HostError> {
        let block = self
            .live
            .remove(&offset)
            .ok_or_else(HostError::bad_offset)?;
        self.live_bytes -= block.len;

        let mut start = offset;
        let mut size = block.size;
        if let Some((&prev, &prev_size)) = self.free.range(..offset).next_back() {
            if prev + prev_size == offset {
                self.free.remove(&prev);
                start = prev;
                size += prev_size;
            }
        }
        if let Some(next_size) = self.free.remove(&(offset + block.size)) {
            size += next_size;
        }

        if start + size == self.bump {
            self.bump = start;
        } else {
            self.free.insert(start, size);
        }
        Ok(block.len)
    }

    /// The live region starting at `offset`.
    pub fn region(&self, offset: u64) -> Option<Region> {
        self.live
            .get(&offset)
            .map(|block| Region::new(offset, block.len))
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn live_bytes(&self) -> u64 {
        self.live_bytes
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Bytes sitting in the free list.
    pub fn free_bytes(&self) -> u64 {
        self.free.values().sum()
    }
}
