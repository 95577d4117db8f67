//! Counter-source regions and their fixed-layout decoding.
//!
//! Producers (kernel modules, capture hooks) expose each metric family as a
//! fixed-size, fixed-layout little-endian binary region that is refreshed in
//! place. Readers take a point-in-time copy. Array regions hold up to
//! [`MAX_SLOTS`] records; a record whose name field starts with a NUL byte
//! marks the end of valid entries.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::rates::{CpuTicks, NetCounters};

/// Maximum number of records in an array region (per-CPU, per-interface).
pub const MAX_SLOTS: usize = 128;

/// Size in bytes of one `cpu_load` region.
pub const CPU_LOAD_SIZE: usize = 12;
/// Size in bytes of one `cpu_stat` slot: name[16] + 10 x f32.
pub const CPU_STAT_SLOT_SIZE: usize = 56;
/// Size in bytes of one `softirq_stat` slot: name[16] + 10 x u64.
pub const SOFTIRQ_SLOT_SIZE: usize = 96;
/// Size in bytes of one `net_stat` slot: name[32] + 8 x u64.
pub const NET_STAT_SLOT_SIZE: usize = 96;
/// Size in bytes of one `mem_info` region: 12 x u64.
pub const MEM_INFO_SIZE: usize = 96;

/// Errors raised while reading or decoding a counter region.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("counter source unavailable: {0}")]
    Unavailable(#[from] std::io::Error),

    #[error("counter region malformed: {0}")]
    Malformed(String),
}

/// A point-in-time copy of one metric family's counter region.
///
/// Implementations are swappable: device nodes in production, in-memory
/// buffers in tests.
pub trait CounterSource: Send {
    fn read_region(&mut self) -> Result<Vec<u8>, SourceError>;
}

/// File-backed counter region (a producer-owned device node or file).
#[derive(Debug, Clone)]
pub struct FileRegion {
    path: PathBuf,
}

impl FileRegion {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CounterSource for FileRegion {
    fn read_region(&mut self) -> Result<Vec<u8>, SourceError> {
        Ok(std::fs::read(&self.path)?)
    }
}

/// In-memory counter region, primarily for tests and synthetic producers.
///
/// Clones share the underlying buffer, so a producer-side [`refresh`] is
/// visible to a collector holding its own clone of the region.
///
/// [`refresh`]: StaticRegion::refresh
#[derive(Debug, Clone, Default)]
pub struct StaticRegion {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl StaticRegion {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Arc::new(Mutex::new(bytes)),
        }
    }

    /// Replace the region contents, as a producer refreshing in place would.
    pub fn refresh(&self, bytes: Vec<u8>) {
        *self.bytes.lock().unwrap() = bytes;
    }
}

impl CounterSource for StaticRegion {
    fn read_region(&mut self) -> Result<Vec<u8>, SourceError> {
        Ok(self.bytes.lock().unwrap().clone())
    }
}

/// CPU load averages as exposed by the load producer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CpuLoadRecord {
    pub load_avg_1: f32,
    pub load_avg_5: f32,
    pub load_avg_15: f32,
}

/// One per-CPU time-bucket record.
#[derive(Debug, Clone, PartialEq)]
pub struct CpuStatRecord {
    pub name: String,
    pub ticks: CpuTicks,
}

/// One per-CPU soft-interrupt counter record. Raw counters, not rates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftIrqRecord {
    pub name: String,
    pub hi: u64,
    pub timer: u64,
    pub net_tx: u64,
    pub net_rx: u64,
    pub block: u64,
    pub irq_poll: u64,
    pub tasklet: u64,
    pub sched: u64,
    pub hrtimer: u64,
    pub rcu: u64,
}

/// One per-interface traffic counter record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetStatRecord {
    pub name: String,
    pub counters: NetCounters,
}

/// Memory totals as exposed by the memory producer. Units are KiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemInfoRecord {
    pub total: u64,
    pub free: u64,
    pub available: u64,
    pub buffers: u64,
    pub cached: u64,
    pub swap_total: u64,
    pub swap_free: u64,
    pub swap_cached: u64,
    pub dirty: u64,
    pub writeback: u64,
    pub commit_limit: u64,
    pub committed: u64,
}

/// Decode a `cpu_load` region.
pub fn decode_cpu_load(region: &[u8]) -> Result<CpuLoadRecord, SourceError> {
    if region.len() < CPU_LOAD_SIZE {
        return Err(SourceError::Malformed(format!(
            "cpu_load region is {} bytes, expected at least {}",
            region.len(),
            CPU_LOAD_SIZE
        )));
    }
    let mut cursor = Cursor::new(region);
    Ok(CpuLoadRecord {
        load_avg_1: cursor.f32(),
        load_avg_5: cursor.f32(),
        load_avg_15: cursor.f32(),
    })
}

/// Decode a `cpu_stat` array region, stopping at the first empty slot.
pub fn decode_cpu_stats(region: &[u8]) -> Result<Vec<CpuStatRecord>, SourceError> {
    decode_slots(region, CPU_STAT_SLOT_SIZE, "cpu_stat", |slot| {
        let mut cursor = Cursor::new(slot);
        let name = cursor.name(16);
        CpuStatRecord {
            name,
            ticks: CpuTicks {
                user: cursor.f32() as f64,
                system: cursor.f32() as f64,
                idle: cursor.f32() as f64,
                nice: cursor.f32() as f64,
                io_wait: cursor.f32() as f64,
                irq: cursor.f32() as f64,
                soft_irq: cursor.f32() as f64,
                steal: cursor.f32() as f64,
                guest: cursor.f32() as f64,
                guest_nice: cursor.f32() as f64,
            },
        }
    })
}

/// Decode a `softirq_stat` array region, stopping at the first empty slot.
pub fn decode_softirq_stats(region: &[u8]) -> Result<Vec<SoftIrqRecord>, SourceError> {
    decode_slots(region, SOFTIRQ_SLOT_SIZE, "softirq_stat", |slot| {
        let mut cursor = Cursor::new(slot);
        let name = cursor.name(16);
        SoftIrqRecord {
            name,
            hi: cursor.u64(),
            timer: cursor.u64(),
            net_tx: cursor.u64(),
            net_rx: cursor.u64(),
            block: cursor.u64(),
            irq_poll: cursor.u64(),
            tasklet: cursor.u64(),
            sched: cursor.u64(),
            hrtimer: cursor.u64(),
            rcu: cursor.u64(),
        }
    })
}

/// Decode a `net_stat` array region, stopping at the first empty slot.
pub fn decode_net_stats(region: &[u8]) -> Result<Vec<NetStatRecord>, SourceError> {
    decode_slots(region, NET_STAT_SLOT_SIZE, "net_stat", |slot| {
        let mut cursor = Cursor::new(slot);
        let name = cursor.name(32);
        NetStatRecord {
            name,
            counters: NetCounters {
                rcv_bytes: cursor.u64(),
                rcv_packets: cursor.u64(),
                err_in: cursor.u64(),
                drop_in: cursor.u64(),
                snd_bytes: cursor.u64(),
                snd_packets: cursor.u64(),
                err_out: cursor.u64(),
                drop_out: cursor.u64(),
            },
        }
    })
}

/// Decode a `mem_info` region.
pub fn decode_mem_info(region: &[u8]) -> Result<MemInfoRecord, SourceError> {
    if region.len() < MEM_INFO_SIZE {
        return Err(SourceError::Malformed(format!(
            "mem_info region is {} bytes, expected at least {}",
            region.len(),
            MEM_INFO_SIZE
        )));
    }
    let mut cursor = Cursor::new(region);
    Ok(MemInfoRecord {
        total: cursor.u64(),
        free: cursor.u64(),
        available: cursor.u64(),
        buffers: cursor.u64(),
        cached: cursor.u64(),
        swap_total: cursor.u64(),
        swap_free: cursor.u64(),
        swap_cached: cursor.u64(),
        dirty: cursor.u64(),
        writeback: cursor.u64(),
        commit_limit: cursor.u64(),
        committed: cursor.u64(),
    })
}

/// Walk full slots of `slot_size` bytes, decoding until the sentinel (a slot
/// whose first byte is NUL), the end of the region, or [`MAX_SLOTS`].
fn decode_slots<T>(
    region: &[u8],
    slot_size: usize,
    family: &str,
    decode: impl Fn(&[u8]) -> T,
) -> Result<Vec<T>, SourceError> {
    if region.len() < slot_size {
        return Err(SourceError::Malformed(format!(
            "{} region is {} bytes, smaller than one {}-byte slot",
            family,
            region.len(),
            slot_size
        )));
    }

    let mut records = Vec::new();
    for slot in region.chunks_exact(slot_size).take(MAX_SLOTS) {
        if slot[0] == 0 {
            break;
        }
        records.push(decode(slot));
    }
    Ok(records)
}

/// Minimal little-endian reader over a byte slice.
///
/// Callers guarantee the slice is long enough; slot sizes are checked before
/// cursors are constructed.
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn f32(&mut self) -> f32 {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&self.bytes[self.pos..self.pos + 4]);
        self.pos += 4;
        f32::from_le_bytes(buf)
    }

    fn u64(&mut self) -> u64 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.bytes[self.pos..self.pos + 8]);
        self.pos += 8;
        u64::from_le_bytes(buf)
    }

    /// NUL-terminated fixed-width name field.
    fn name(&mut self, width: usize) -> String {
        let raw = &self.bytes[self.pos..self.pos + width];
        self.pos += width;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(width);
        String::from_utf8_lossy(&raw[..end]).into_owned()
    }
}
