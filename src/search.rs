//! `linearsearch`/`binarysearch`/`linkedsearch` (spec.md §4.10).
//! Grounded on spec.md's options-bitfield description: bit 0 selects
//! indirect (by-address) keys, bit 1 treats an all-zero struct key as
//! an end-of-data sentinel, bit 2 (linear/binary only) returns the
//! matching index instead of its address.

use crate::error::FaultResult;
use crate::vm::Vm;

const OPT_KEY_INDIRECT: u32 = 1;
const OPT_ZERO_TERMINATES: u32 = 2;
const OPT_RETURN_INDEX: u32 = 4;

fn key_bytes(vm: &Vm, indirect: bool, key: u32, keysize: u32) -> FaultResult<Vec<u8>> {
    if indirect {
        (0..keysize).map(|i| vm.mem.read_u8(key + i).map(|b| b as u8)).collect()
    } else {
        Ok(key.to_be_bytes()[(4 - keysize.min(4)) as usize..].to_vec())
    }
}

fn struct_key(vm: &Vm, struct_addr: u32, keyoffset: u32, keysize: u32) -> FaultResult<Vec<u8>> {
    (0..keysize)
        .map(|i| vm.mem.read_u8(struct_addr + keyoffset + i).map(|b| b as u8))
        .collect()
}

fn is_all_zero(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| b == 0)
}

impl Vm {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn op_linearsearch(
        &self,
        key: u32,
        keysize: u32,
        start: u32,
        structsize: u32,
        numstructs: u32,
        keyoffset: u32,
        options: u32,
    ) -> FaultResult<u32> {
        let indirect = options & OPT_KEY_INDIRECT != 0;
        let zero_terminates = options & OPT_ZERO_TERMINATES != 0;
        let return_index = options & OPT_RETURN_INDEX != 0;
        let needle = key_bytes(self, indirect, key, keysize)?;
        let not_found = if return_index { 0xFFFF_FFFF } else { 0 };

        let max = numstructs as i32;
        let mut i = 0u32;
        loop {
            if max >= 0 && i as i32 >= max {
                return Ok(not_found);
            }
            let addr = start + i * structsize;
            let candidate = struct_key(self, addr, keyoffset, keysize)?;
            if zero_terminates && is_all_zero(&candidate) {
                return Ok(not_found);
            }
            if candidate == needle {
                return Ok(if return_index { i } else { addr });
            }
            i += 1;
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn op_binarysearch(
        &self,
        key: u32,
        keysize: u32,
        start: u32,
        structsize: u32,
        numstructs: u32,
        keyoffset: u32,
        options: u32,
    ) -> FaultResult<u32> {
        let indirect = options & OPT_KEY_INDIRECT != 0;
        let return_index = options & OPT_RETURN_INDEX != 0;
        let needle = key_bytes(self, indirect, key, keysize)?;
        let not_found = if return_index { 0xFFFF_FFFF } else { 0 };

        let (mut lo, mut hi) = (0i64, numstructs as i64 - 1);
        while lo <= hi {
            let mid = (lo + hi) / 2;
            let addr = start + (mid as u32) * structsize;
            let candidate = struct_key(self, addr, keyoffset, keysize)?;
            match candidate.cmp(&needle) {
                std::cmp::Ordering::Equal => {
                    return Ok(if return_index { mid as u32 } else { addr })
                }
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid - 1,
            }
        }
        Ok(not_found)
    }

    pub(crate) fn op_linkedsearch(
        &self,
        key: u32,
        keysize: u32,
        start: u32,
        keyoffset: u32,
        next_offset: u32,
        options: u32,
    ) -> FaultResult<u32> {
        let indirect = options & OPT_KEY_INDIRECT != 0;
        let zero_terminates = options & OPT_ZERO_TERMINATES != 0;
        let needle = key_bytes(self, indirect, key, keysize)?;

        let mut addr = start;
        loop {
            if addr == 0 {
                return Ok(0);
            }
            let candidate = struct_key(self, addr, keyoffset, keysize)?;
            if zero_terminates && is_all_zero(&candidate) {
                return Ok(0);
            }
            if candidate == needle {
                return Ok(addr);
            }
            addr = self.mem.read_u32(addr + next_offset)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{BumpHeap, InMemorySaveIo, NullHost, StdHostRng};
    use crate::image::{load, HEADER_LEN};

    fn vm_with_table(entries: &[(u32, u32)]) -> Vm {
        let mut data = vec![0u8; 256];
        data[0..4].copy_from_slice(b"Glul");
        byteorder::BigEndian::write_u32(&mut data[4..8], 0x0003_0102);
        byteorder::BigEndian::write_u32(&mut data[8..12], 64);
        byteorder::BigEndian::write_u32(&mut data[12..16], 64);
        byteorder::BigEndian::write_u32(&mut data[16..20], 256);
        byteorder::BigEndian::write_u32(&mut data[20..24], 256);
        byteorder::BigEndian::write_u32(&mut data[24..28], HEADER_LEN);
        data[HEADER_LEN as usize] = 0xC1;
        data[HEADER_LEN as usize + 1] = 0;
        data[HEADER_LEN as usize + 2] = 0;
        // table of (key:u32, payload:u32) pairs at offset 128
        for (i, &(k, p)) in entries.iter().enumerate() {
            let addr = 128 + i * 8;
            byteorder::BigEndian::write_u32(&mut data[addr..addr + 4], k);
            byteorder::BigEndian::write_u32(&mut data[addr + 4..addr + 8], p);
        }
        let loaded = load(data, 256).unwrap();
        Vm::new(
            loaded,
            Box::new(NullHost),
            Box::new(InMemorySaveIo::default()),
            Box::new(StdHostRng::default()),
            Box::new(BumpHeap::new(64, 256)),
        )
        .unwrap()
    }

    #[test]
    fn linear_search_finds_matching_struct() {
        let vm = vm_with_table(&[(10, 100), (20, 200), (30, 300)]);
        let addr = vm.op_linearsearch(20, 4, 128, 8, 3, 0, 0).unwrap();
        assert_eq!(addr, 136);
    }

    #[test]
    fn linear_search_returns_index_when_requested() {
        let vm = vm_with_table(&[(10, 100), (20, 200), (30, 300)]);
        let idx = vm
            .op_linearsearch(30, 4, 128, 8, 3, 0, OPT_RETURN_INDEX)
            .unwrap();
        assert_eq!(idx, 2);
    }

    #[test]
    fn binary_search_requires_sorted_keys() {
        let vm = vm_with_table(&[(10, 100), (20, 200), (30, 300)]);
        let addr = vm.op_binarysearch(30, 4, 128, 8, 3, 0, 0).unwrap();
        assert_eq!(addr, 144);
        let missing = vm.op_binarysearch(99, 4, 128, 8, 3, 0, 0).unwrap();
        assert_eq!(missing, 0);
    }
}
