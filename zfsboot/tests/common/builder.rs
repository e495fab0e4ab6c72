use crate::common::{encode_label, MemoryBlockDevice};
use gpt_disk_io::Disk;
use gpt_disk_types::{
    guid, BlockSize, GptHeader, GptPartitionEntryArray, GptPartitionType, LbaLe, U32Le,
};
use zfsboot::zap::fat::{
    chunks_offset, num_chunks, CHAIN_END, ZAP_CHUNK_ARRAY, ZAP_CHUNK_ENTRY, ZAP_CHUNK_FREE,
    ZAP_LEAF_ARRAY_BYTES, ZAP_LEAF_CHUNKSIZE, ZAP_LEAF_MAGIC, ZAP_MAGIC, ZAP_NUM_LEAFS_OFFSET,
};
use zfsboot::zap::micro::{MZAP_ENT_LEN, MZAP_HEADER_LEN, MZAP_NAME_LEN};
use zfsboot::zap::{ZBT_HEADER, ZBT_LEAF, ZBT_MICRO};
use zfsboot::{DirentType, VdevLabel};

/// Packed directory entry value
pub fn dirent(object: u64, kind: DirentType) -> u64 {
    ((kind as u64) << 60) | object
}

/// Solaris VTOC slice: tag, start, size
pub type Slice = (u16, u32, u32);

/// Builds 512-byte sector disks with a GPT or MBR, nested VTOCs and
/// mock vdev labels
pub struct DiskBuilder {
    blocks: u64,
    gpt: Vec<(GptPartitionType, u64, u64)>,
    mbr: Vec<(u8, u32, u32)>,
    vtocs: Vec<(u64, Vec<Slice>)>,
    labels: Vec<(u64, VdevLabel)>,
}

impl DiskBuilder {
    pub fn new(blocks: u64) -> Self {
        Self {
            blocks,
            gpt: Vec::new(),
            mbr: Vec::new(),
            vtocs: Vec::new(),
            labels: Vec::new(),
        }
    }

    /// GPT entry covering `start..=end`
    pub fn gpt_partition(mut self, kind: GptPartitionType, start: u64, end: u64) -> Self {
        self.gpt.push((kind, start, end));
        self
    }

    /// MBR primary entry
    pub fn mbr_partition(mut self, kind: u8, start: u32, count: u32) -> Self {
        self.mbr.push((kind, start, count));
        self
    }

    /// VTOC label in the second sector of the region starting at `lba`
    pub fn vtoc(mut self, lba: u64, slices: &[Slice]) -> Self {
        self.vtocs.push((lba, slices.to_vec()));
        self
    }

    /// Mock vdev label at `lba`
    pub fn label(mut self, lba: u64, label: VdevLabel) -> Self {
        self.labels.push((lba, label));
        self
    }

    pub fn build(self) -> MemoryBlockDevice {
        let device = MemoryBlockDevice::zeroed(self.blocks as usize, 512);

        if !self.gpt.is_empty() {
            write_gpt(&device, self.blocks, &self.gpt);
        }
        if !self.mbr.is_empty() {
            let mut sector = [0u8; 512];
            for (i, (kind, start, count)) in self.mbr.iter().enumerate() {
                let base = 446 + i * 16;
                sector[base + 4] = *kind;
                sector[base + 8..base + 12].copy_from_slice(&start.to_le_bytes());
                sector[base + 12..base + 16].copy_from_slice(&count.to_le_bytes());
            }
            sector[510] = 0x55;
            sector[511] = 0xAA;
            device.write_bytes(0, &sector);
        }
        for (lba, slices) in &self.vtocs {
            let mut sector = [0u8; 512];
            sector[12..16].copy_from_slice(&0x600D_DEEEu32.to_le_bytes());
            sector[30..32].copy_from_slice(&(slices.len() as u16).to_le_bytes());
            for (i, (tag, start, size)) in slices.iter().enumerate() {
                let base = 72 + i * 12;
                sector[base..base + 2].copy_from_slice(&tag.to_le_bytes());
                sector[base + 4..base + 8].copy_from_slice(&start.to_le_bytes());
                sector[base + 8..base + 12].copy_from_slice(&size.to_le_bytes());
            }
            sector[508..510].copy_from_slice(&0xDABEu16.to_le_bytes());
            device.write_bytes((*lba as usize + 1) * 512, &sector);
        }
        for (lba, label) in &self.labels {
            device.write_bytes(*lba as usize * 512, &encode_label(label));
        }

        device
    }
}

fn write_gpt(device: &MemoryBlockDevice, blocks: u64, parts: &[(GptPartitionType, u64, u64)]) {
    let mut disk = Disk::new(device.clone()).expect("disk");

    let mut header = GptHeader {
        my_lba: LbaLe::from_u64(1),
        alternate_lba: LbaLe::from_u64(blocks - 1),
        first_usable_lba: LbaLe::from_u64(34),
        last_usable_lba: LbaLe::from_u64(blocks - 34),
        disk_guid: guid!("12345678-1234-1234-1234-123456789012"),
        partition_entry_lba: LbaLe::from_u64(2),
        number_of_partition_entries: U32Le::from_u32(128),
        ..Default::default()
    };

    disk.write_protective_mbr(&mut [0u8; 512])
        .expect("protective mbr");

    let layout = header
        .get_partition_entry_array_layout()
        .expect("layout");
    let mut entry_buf = [0u8; 16384];
    let mut entry_array = GptPartitionEntryArray::new(layout, BlockSize::BS_512, &mut entry_buf)
        .expect("entry array");

    for (i, (kind, start, end)) in parts.iter().enumerate() {
        let entry = entry_array
            .get_partition_entry_mut(i.try_into().unwrap())
            .expect("entry slot");
        entry.partition_type_guid = *kind;
        entry.unique_partition_guid = guid!("12345678-1234-5678-1234-567812345678");
        entry.starting_lba = LbaLe::from_u64(*start);
        entry.ending_lba = LbaLe::from_u64(*end);
    }

    header.partition_entry_array_crc32 = entry_array.calculate_crc32();
    header.update_header_crc32();

    disk.write_primary_gpt_header(&header, &mut [0u8; 512])
        .expect("gpt header");
    disk.write_gpt_partition_entry_array(&entry_array)
        .expect("gpt entries");
    disk.flush().expect("flush");
}

/// Micro ZAP block; `None` slots are left empty
pub struct MicroZapBuilder {
    block_size: usize,
    slots: Vec<Option<(String, u64)>>,
}

impl MicroZapBuilder {
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size,
            slots: Vec::new(),
        }
    }

    pub fn entry(mut self, name: &str, value: u64) -> Self {
        assert!(name.len() < MZAP_NAME_LEN);
        self.slots.push(Some((name.to_string(), value)));
        self
    }

    pub fn empty(mut self) -> Self {
        self.slots.push(None);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut block = vec![0u8; self.block_size];
        block[..8].copy_from_slice(&ZBT_MICRO.to_le_bytes());

        for (i, slot) in self.slots.iter().enumerate() {
            let base = MZAP_HEADER_LEN + i * MZAP_ENT_LEN;
            assert!(base + MZAP_ENT_LEN <= self.block_size, "too many slots");
            if let Some((name, value)) = slot {
                block[base..base + 8].copy_from_slice(&value.to_le_bytes());
                block[base + 14..base + 14 + name.len()].copy_from_slice(name.as_bytes());
            }
        }
        block
    }
}

/// Fat ZAP object: a header block followed by one block per leaf
///
/// Chunk 0 of every leaf is left free so readers have to skip it.
pub struct FatZapBuilder {
    block_size: usize,
    leaves: Vec<Option<Vec<(Vec<u8>, u64)>>>,
}

impl FatZapBuilder {
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size,
            leaves: Vec::new(),
        }
    }

    /// Append a leaf holding `entries`
    pub fn leaf(mut self, entries: &[(&str, u64)]) -> Self {
        self.leaves.push(Some(
            entries
                .iter()
                .map(|(name, value)| {
                    let mut bytes = name.as_bytes().to_vec();
                    bytes.push(0);
                    (bytes, *value)
                })
                .collect(),
        ));
        self
    }

    /// Append a leaf with one entry whose name bytes are stored as given,
    /// without a terminator
    pub fn raw_name_leaf(mut self, name: &[u8], value: u64) -> Self {
        self.leaves.push(Some(vec![(name.to_vec(), value)]));
        self
    }

    /// Append a zeroed block counted as a leaf
    pub fn hole(mut self) -> Self {
        self.leaves.push(None);
        self
    }

    /// Header block with a wrong `zap_magic`
    pub fn build_with_bad_magic(self) -> Vec<u8> {
        let mut data = self.build();
        data[8] ^= 0xff;
        data
    }

    pub fn build(self) -> Vec<u8> {
        let bs = self.block_size;
        let mut data = vec![0u8; bs * (self.leaves.len() + 1)];
        data[..8].copy_from_slice(&ZBT_HEADER.to_le_bytes());
        data[8..16].copy_from_slice(&ZAP_MAGIC.to_le_bytes());
        data[ZAP_NUM_LEAFS_OFFSET..ZAP_NUM_LEAFS_OFFSET + 8]
            .copy_from_slice(&(self.leaves.len() as u64).to_le_bytes());

        for (i, entries) in self.leaves.iter().enumerate() {
            let Some(entries) = entries else { continue };
            let leaf = &mut data[bs * (i + 1)..bs * (i + 2)];
            LeafWriter::new(leaf).write(entries);
        }
        data
    }
}

struct LeafWriter<'a> {
    leaf: &'a mut [u8],
    next_chunk: usize,
}

impl<'a> LeafWriter<'a> {
    fn new(leaf: &'a mut [u8]) -> Self {
        leaf[..8].copy_from_slice(&ZBT_LEAF.to_le_bytes());
        leaf[24..28].copy_from_slice(&ZAP_LEAF_MAGIC.to_le_bytes());
        let mut writer = Self {
            leaf,
            next_chunk: 0,
        };
        for i in 0..num_chunks(writer.leaf.len()) {
            writer.chunk(i)[0] = ZAP_CHUNK_FREE;
        }
        writer.next_chunk = 1;
        writer
    }

    fn chunk(&mut self, index: usize) -> &mut [u8] {
        let start = chunks_offset(self.leaf.len()) + index * ZAP_LEAF_CHUNKSIZE;
        &mut self.leaf[start..start + ZAP_LEAF_CHUNKSIZE]
    }

    fn alloc(&mut self) -> usize {
        let index = self.next_chunk;
        assert!(index < num_chunks(self.leaf.len()), "leaf full");
        self.next_chunk += 1;
        index
    }

    /// Chain `bytes` through array chunks, returning the first chunk
    fn array(&mut self, bytes: &[u8]) -> u16 {
        let pieces: Vec<&[u8]> = bytes.chunks(ZAP_LEAF_ARRAY_BYTES).collect();
        let indices: Vec<usize> = pieces.iter().map(|_| self.alloc()).collect();
        for (n, piece) in pieces.iter().enumerate() {
            let next = indices.get(n + 1).map_or(CHAIN_END, |&i| i as u16);
            let c = self.chunk(indices[n]);
            c[0] = ZAP_CHUNK_ARRAY;
            c[1..1 + piece.len()].copy_from_slice(piece);
            c[22..24].copy_from_slice(&next.to_le_bytes());
        }
        indices[0] as u16
    }

    fn write(mut self, entries: &[(Vec<u8>, u64)]) {
        for (name, value) in entries {
            let entry = self.alloc();

            let name_chunk = self.array(name);
            let value_chunk = self.array(&value.to_be_bytes());

            let c = self.chunk(entry);
            c[0] = ZAP_CHUNK_ENTRY;
            c[1] = 8;
            c[2..4].copy_from_slice(&CHAIN_END.to_le_bytes());
            c[4..6].copy_from_slice(&name_chunk.to_le_bytes());
            c[6..8].copy_from_slice(&(name.len() as u16).to_le_bytes());
            c[8..10].copy_from_slice(&value_chunk.to_le_bytes());
            c[10..12].copy_from_slice(&1u16.to_le_bytes());
        }
    }
}
