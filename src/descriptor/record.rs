/// Persisted descriptor record
///
/// Layout (little-endian, no padding):
///
/// ```text
/// offset  size  field
///      0     4  device type tag
///      4     8  device size in bytes
///     12   8+1  vendor name        + reserved null
///     21  40+1  model number       + reserved null
///     62   8+1  firmware revision  + reserved null
///     71  20+1  serial number      + reserved null
///     92   8+1  physical interconnect          + reserved null
///    101   8+1  physical interconnect location + reserved null
///    110     8  SED flags, one byte each
///    118     8  world wide name
/// ```
///
/// A record written by one session may be replayed verbatim by another
/// through the driver's cached descriptor property, so this layout must not
/// change. Replay keeps every byte of the cached record except the reserved
/// nulls, which are forced to zero.
use std::hash::{Hash, Hasher};

use super::{
    DeviceDescriptor, DeviceType, FixedAscii, SedFlags, FIRMWARE_REV_LEN, INTERCONNECT_LEN,
    INTERCONNECT_LOCATION_LEN, MODEL_NUM_LEN, SERIAL_NUM_LEN, VENDOR_NAME_LEN,
    WORLD_WIDE_NAME_LEN,
};

const SED_FLAG_COUNT: usize = 8;
const ASCII_FIELD_START: usize = 12;

pub const DESCRIPTOR_RECORD_LEN: usize = 4
    + 8
    + (VENDOR_NAME_LEN + 1)
    + (MODEL_NUM_LEN + 1)
    + (FIRMWARE_REV_LEN + 1)
    + (SERIAL_NUM_LEN + 1)
    + (INTERCONNECT_LEN + 1)
    + (INTERCONNECT_LOCATION_LEN + 1)
    + SED_FLAG_COUNT
    + WORLD_WIDE_NAME_LEN;

/// Offsets of the null byte reserved after each ASCII field.
pub const RESERVED_NULL_OFFSETS: [usize; 6] = {
    let capacities = [
        VENDOR_NAME_LEN,
        MODEL_NUM_LEN,
        FIRMWARE_REV_LEN,
        SERIAL_NUM_LEN,
        INTERCONNECT_LEN,
        INTERCONNECT_LOCATION_LEN,
    ];
    let mut offsets = [0usize; 6];
    let mut pos = ASCII_FIELD_START;
    let mut i = 0;
    while i < capacities.len() {
        pos += capacities[i];
        offsets[i] = pos;
        pos += 1;
        i += 1;
    }
    offsets
};

struct RecordWriter {
    buf: [u8; DESCRIPTOR_RECORD_LEN],
    pos: usize,
}

impl RecordWriter {
    fn new() -> Self {
        Self {
            buf: [0u8; DESCRIPTOR_RECORD_LEN],
            pos: 0,
        }
    }

    fn put(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }

    fn put_ascii<const N: usize>(&mut self, field: &FixedAscii<N>) {
        self.put(field.raw());
        self.put(&[0]);
    }

    fn put_flag(&mut self, flag: bool) {
        self.put(&[u8::from(flag)]);
    }

    fn finish(self) -> [u8; DESCRIPTOR_RECORD_LEN] {
        debug_assert_eq!(self.pos, DESCRIPTOR_RECORD_LEN);
        self.buf
    }
}

struct RecordReader {
    buf: [u8; DESCRIPTOR_RECORD_LEN],
    pos: usize,
}

impl RecordReader {
    fn take<const K: usize>(&mut self) -> [u8; K] {
        let mut out = [0u8; K];
        out.copy_from_slice(&self.buf[self.pos..self.pos + K]);
        self.pos += K;
        out
    }

    // The reserved null slot is skipped; the field stops at its capacity.
    fn take_ascii<const N: usize>(&mut self) -> FixedAscii<N> {
        let raw = self.take::<N>();
        self.pos += 1;
        FixedAscii::from_bytes_truncated(&raw)
    }

    fn take_flag(&mut self) -> bool {
        self.take::<1>()[0] != 0
    }
}

impl DeviceDescriptor {
    /// Serialize to the persisted layout.
    ///
    /// A descriptor replayed from a driver cache returns the cached bytes as
    /// long as its fields have not been edited since.
    pub fn to_record(&self) -> [u8; DESCRIPTOR_RECORD_LEN] {
        match self.replayed {
            Some(raw) if decode(&raw).encode() == self.encode() => raw,
            _ => self.encode(),
        }
    }

    /// Replay a cached record.
    ///
    /// At most `DESCRIPTOR_RECORD_LEN` bytes are taken from `blob`; a short
    /// blob leaves the remaining bytes zero. The typed fields are a decoded
    /// view: unknown tags read as `Other`, nonzero flag bytes as set, and
    /// each string stops at its first null.
    pub fn from_record(blob: &[u8]) -> Self {
        let mut raw = [0u8; DESCRIPTOR_RECORD_LEN];
        let copied = blob.len().min(DESCRIPTOR_RECORD_LEN);
        raw[..copied].copy_from_slice(&blob[..copied]);
        for offset in RESERVED_NULL_OFFSETS {
            raw[offset] = 0;
        }

        Self {
            replayed: Some(raw),
            ..decode(&raw)
        }
    }

    fn encode(&self) -> [u8; DESCRIPTOR_RECORD_LEN] {
        let mut w = RecordWriter::new();
        w.put(&self.dev_type.tag().to_le_bytes());
        w.put(&self.dev_size.to_le_bytes());
        w.put_ascii(&self.vendor_name);
        w.put_ascii(&self.model_num);
        w.put_ascii(&self.firmware_rev);
        w.put_ascii(&self.serial_num);
        w.put_ascii(&self.physical_interconnect);
        w.put_ascii(&self.physical_interconnect_location);

        let sed = &self.sed;
        for flag in [
            sed.opal10,
            sed.opal20,
            sed.enterprise,
            sed.any_opal_ssc,
            sed.locking_mbr_enabled,
            sed.locking_mbr_done,
            sed.locking_locked,
            sed.locking_enabled,
        ] {
            w.put_flag(flag);
        }
        w.put(&self.world_wide_name);
        w.finish()
    }
}

fn decode(raw: &[u8; DESCRIPTOR_RECORD_LEN]) -> DeviceDescriptor {
    let mut r = RecordReader { buf: *raw, pos: 0 };
    let dev_type = DeviceType::from_tag(u32::from_le_bytes(r.take::<4>()));
    let dev_size = u64::from_le_bytes(r.take::<8>());
    let vendor_name = r.take_ascii();
    let model_num = r.take_ascii();
    let firmware_rev = r.take_ascii();
    let serial_num = r.take_ascii();
    let physical_interconnect = r.take_ascii();
    let physical_interconnect_location = r.take_ascii();
    let sed = SedFlags {
        opal10: r.take_flag(),
        opal20: r.take_flag(),
        enterprise: r.take_flag(),
        any_opal_ssc: r.take_flag(),
        locking_mbr_enabled: r.take_flag(),
        locking_mbr_done: r.take_flag(),
        locking_locked: r.take_flag(),
        locking_enabled: r.take_flag(),
    };
    let world_wide_name = r.take::<WORLD_WIDE_NAME_LEN>();

    DeviceDescriptor {
        dev_type,
        dev_size,
        vendor_name,
        model_num,
        firmware_rev,
        serial_num,
        physical_interconnect,
        physical_interconnect_location,
        sed,
        world_wide_name,
        replayed: None,
    }
}

impl PartialEq for DeviceDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.to_record() == other.to_record()
    }
}

impl Eq for DeviceDescriptor {}

impl Hash for DeviceDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_record().hash(state);
    }
}
