//! Synthetic NTFS image builder for integration tests
//!
//! Produces a minimal but structurally faithful volume: a boot sector,
//! empty reserved clusters and a contiguous MFT whose record 0 describes
//! the table itself. Geometry: 512-byte sectors, 1024-byte clusters,
//! 1024-byte records (one record per cluster).

use mftfind::ntfs::{encode_runs, unix_to_filetime, Extent};

pub const BYTES_PER_SECTOR: u16 = 512;
pub const SECTORS_PER_CLUSTER: u8 = 2;
pub const BYTES_PER_CLUSTER: u64 = 1024;
pub const RECORD_SIZE: usize = 1024;
pub const MFT_START_CLUSTER: u64 = 4;

pub const ROOT_INDEX: u64 = 5;

const IN_USE: u16 = 0x0001;
const IS_DIRECTORY: u16 = 0x0002;

pub const ATTR_READONLY: u32 = 0x01;
pub const ATTR_HIDDEN: u32 = 0x02;
pub const ATTR_SYSTEM: u32 = 0x04;
pub const ATTR_DIRECTORY: u32 = 0x10;
pub const ATTR_ARCHIVE: u32 = 0x20;

/// One record to synthesise.
#[derive(Clone)]
pub struct FileSpec {
    pub name: String,
    pub parent: u64,
    /// 0=POSIX, 1=Win32, 2=DOS, 3=Win32+DOS
    pub namespace: u8,
    pub allocated: u64,
    pub real: u64,
    pub attrs: u32,
    pub modified_unix: i64,
    pub in_use: bool,
    pub directory: bool,
    /// Non-empty: add a non-resident unnamed DATA attribute with these runs
    pub extents: Vec<Extent>,
    /// Sparse flag on the DATA attribute header
    pub sparse_attr: bool,
    /// Extra named resident DATA stream
    pub extra_stream: Option<String>,
    /// Additional FILE_NAME attributes as (name, namespace)
    pub extra_names: Vec<(String, u8)>,
}

impl Default for FileSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            parent: ROOT_INDEX,
            namespace: 1,
            allocated: 0,
            real: 0,
            attrs: ATTR_ARCHIVE,
            modified_unix: 1_673_784_000, // 2023-01-15T12:00:00Z
            in_use: true,
            directory: false,
            extents: Vec::new(),
            sparse_attr: false,
            extra_stream: None,
            extra_names: Vec::new(),
        }
    }
}

pub struct ImageBuilder {
    /// Raw records; slot 0 is rebuilt with the real extent map at build time
    records: Vec<Option<Vec<u8>>>,
}

impl ImageBuilder {
    /// Start an image with the standard system records:
    /// 0=$MFT, 1=$MFTMirr, 2=$LogFile, 3=$Volume, 4=(blank), 5=root.
    pub fn new() -> Self {
        let mut builder = Self {
            records: vec![None], // $MFT placeholder
        };

        for name in ["$MFTMirr", "$LogFile", "$Volume"] {
            builder.push(FileSpec {
                name: name.to_string(),
                namespace: 3,
                attrs: ATTR_SYSTEM | ATTR_HIDDEN,
                allocated: 4096,
                real: 4096,
                ..Default::default()
            });
        }

        builder.records.push(Some(vec![0u8; RECORD_SIZE])); // record 4, never used

        builder.push(FileSpec {
            name: String::from("."),
            parent: ROOT_INDEX,
            namespace: 3,
            attrs: ATTR_SYSTEM | ATTR_HIDDEN | ATTR_DIRECTORY,
            directory: true,
            ..Default::default()
        });

        builder
    }

    /// Add a record and return its MFT index.
    pub fn push(&mut self, spec: FileSpec) -> u64 {
        let index = self.records.len() as u64;
        self.records.push(Some(Self::make_record(&spec)));
        index
    }

    pub fn add_file(&mut self, name: &str, parent: u64, size: u64) -> u64 {
        self.push(FileSpec {
            name: name.to_string(),
            parent,
            allocated: size,
            real: size,
            ..Default::default()
        })
    }

    pub fn add_dir(&mut self, name: &str, parent: u64) -> u64 {
        self.push(FileSpec {
            name: name.to_string(),
            parent,
            attrs: ATTR_DIRECTORY,
            directory: true,
            ..Default::default()
        })
    }

    pub fn record_count(&self) -> u64 {
        self.records.len() as u64
    }

    /// Break the fix-up of a record: flip its second sector's tail bytes.
    pub fn corrupt_fixup(&mut self, index: u64) {
        if let Some(Some(record)) = self.records.get_mut(index as usize) {
            record[RECORD_SIZE - 2] ^= 0xFF;
        }
    }

    /// Overwrite record 0's filename (to provoke bootstrap failures).
    pub fn rename_mft(&mut self, name: &str) -> &mut Self {
        let count = self.records.len() as u64;
        self.records[0] = Some(Self::make_mft_record(count, Some(name)));
        self
    }

    /// Assemble the full volume image.
    pub fn build(&self) -> Vec<u8> {
        let count = self.records.len() as u64;
        let image_len = (MFT_START_CLUSTER + count) as usize * BYTES_PER_CLUSTER as usize;
        let mut image = vec![0u8; image_len];

        write_boot_sector(&mut image);

        let mft_base = (MFT_START_CLUSTER * BYTES_PER_CLUSTER) as usize;
        for (i, record) in self.records.iter().enumerate() {
            let bytes = match record {
                Some(bytes) => bytes.clone(),
                None => Self::make_mft_record(count, None),
            };
            let at = mft_base + i * RECORD_SIZE;
            image[at..at + RECORD_SIZE].copy_from_slice(&bytes);
        }

        image
    }

    fn make_mft_record(total_records: u64, name_override: Option<&str>) -> Vec<u8> {
        let spec = FileSpec {
            name: name_override.unwrap_or("$MFT").to_string(),
            namespace: 3,
            attrs: ATTR_SYSTEM | ATTR_HIDDEN,
            allocated: total_records * RECORD_SIZE as u64,
            real: total_records * RECORD_SIZE as u64,
            extents: vec![Extent {
                lcn: Some(MFT_START_CLUSTER as i64),
                clusters: total_records,
            }],
            ..Default::default()
        };
        Self::make_record(&spec)
    }

    fn make_record(spec: &FileSpec) -> Vec<u8> {
        let modified = unix_to_filetime(spec.modified_unix);
        let mut attrs: Vec<Vec<u8>> = Vec::new();

        attrs.push(standard_info_attr(modified, spec.attrs));
        attrs.push(file_name_attr(
            spec.parent,
            &spec.name,
            spec.namespace,
            spec.allocated,
            spec.real,
            spec.attrs,
            modified,
        ));
        for (name, namespace) in &spec.extra_names {
            attrs.push(file_name_attr(
                spec.parent,
                name,
                *namespace,
                spec.allocated,
                spec.real,
                spec.attrs,
                modified,
            ));
        }
        if !spec.extents.is_empty() {
            attrs.push(non_resident_data_attr(
                &spec.extents,
                spec.allocated,
                spec.real,
                if spec.sparse_attr { 0x8000 } else { 0 },
                &[],
            ));
        }
        if let Some(stream) = &spec.extra_stream {
            let units: Vec<u16> = stream.encode_utf16().collect();
            attrs.push(resident_attr(0x80, b"stream-data", 0, &units));
        }

        build_record(spec.in_use, spec.directory, &attrs)
    }
}

// ----------------------------------------------------------------------
// Raw structure builders
// ----------------------------------------------------------------------

fn write_boot_sector(image: &mut [u8]) {
    image[0x03..0x0B].copy_from_slice(b"NTFS    ");
    image[0x0B..0x0D].copy_from_slice(&BYTES_PER_SECTOR.to_le_bytes());
    image[0x0D] = SECTORS_PER_CLUSTER;
    let total_sectors = image.len() as u64 / BYTES_PER_SECTOR as u64;
    image[0x28..0x30].copy_from_slice(&total_sectors.to_le_bytes());
    image[0x30..0x38].copy_from_slice(&(MFT_START_CLUSTER as i64).to_le_bytes());
    image[0x38..0x40].copy_from_slice(&2i64.to_le_bytes());
    image[0x40] = 0xF6; // 2^10 = 1024-byte records
    image[0x44] = 0x01;
    image[0x48..0x50].copy_from_slice(&0x1234_5678_9ABC_DEF0u64.to_le_bytes());
    image[0x1FE] = 0x55;
    image[0x1FF] = 0xAA;
}

fn build_record(in_use: bool, directory: bool, attrs: &[Vec<u8>]) -> Vec<u8> {
    let mut rec = vec![0u8; RECORD_SIZE];
    let usa_count = RECORD_SIZE / 512 + 1;
    let usa_offset = 48usize;
    let first_attr = (usa_offset + usa_count * 2 + 7) & !7;

    rec[0..4].copy_from_slice(b"FILE");
    rec[4..6].copy_from_slice(&(usa_offset as u16).to_le_bytes());
    rec[6..8].copy_from_slice(&(usa_count as u16).to_le_bytes());
    rec[16..18].copy_from_slice(&1u16.to_le_bytes());
    rec[18..20].copy_from_slice(&1u16.to_le_bytes());
    rec[20..22].copy_from_slice(&(first_attr as u16).to_le_bytes());
    let mut flags = 0u16;
    if in_use {
        flags |= IN_USE;
    }
    if directory {
        flags |= IS_DIRECTORY;
    }
    rec[22..24].copy_from_slice(&flags.to_le_bytes());

    let mut pos = first_attr;
    for attr in attrs {
        rec[pos..pos + attr.len()].copy_from_slice(attr);
        pos += attr.len();
    }
    rec[pos..pos + 4].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes());

    // Install the fix-up: stash each sector tail, stamp the sentinel
    let sentinel = 0x5AA5u16;
    rec[usa_offset..usa_offset + 2].copy_from_slice(&sentinel.to_le_bytes());
    for slot in 1..usa_count {
        let sector_end = slot * 512 - 2;
        let fixup_at = usa_offset + slot * 2;
        rec.copy_within(sector_end..sector_end + 2, fixup_at);
        rec[sector_end..sector_end + 2].copy_from_slice(&sentinel.to_le_bytes());
    }

    rec
}

fn standard_info_attr(modified: u64, file_attributes: u32) -> Vec<u8> {
    let mut value = vec![0u8; 48];
    value[0..8].copy_from_slice(&modified.to_le_bytes());
    value[8..16].copy_from_slice(&modified.to_le_bytes());
    value[16..24].copy_from_slice(&modified.to_le_bytes());
    value[24..32].copy_from_slice(&modified.to_le_bytes());
    value[32..36].copy_from_slice(&file_attributes.to_le_bytes());
    resident_attr(0x10, &value, 0, &[])
}

fn file_name_attr(
    parent: u64,
    name: &str,
    namespace: u8,
    allocated: u64,
    real: u64,
    file_attributes: u32,
    modified: u64,
) -> Vec<u8> {
    let units: Vec<u16> = name.encode_utf16().collect();
    let mut value = vec![0u8; 66 + units.len() * 2];
    value[0..8].copy_from_slice(&parent.to_le_bytes());
    value[8..16].copy_from_slice(&modified.to_le_bytes());
    value[16..24].copy_from_slice(&modified.to_le_bytes());
    value[24..32].copy_from_slice(&modified.to_le_bytes());
    value[32..40].copy_from_slice(&modified.to_le_bytes());
    value[40..48].copy_from_slice(&allocated.to_le_bytes());
    value[48..56].copy_from_slice(&real.to_le_bytes());
    value[56..60].copy_from_slice(&file_attributes.to_le_bytes());
    value[64] = units.len() as u8;
    value[65] = namespace;
    for (i, u) in units.iter().enumerate() {
        value[66 + i * 2..68 + i * 2].copy_from_slice(&u.to_le_bytes());
    }
    resident_attr(0x30, &value, 0, &[])
}

fn resident_attr(type_code: u32, value: &[u8], attr_flags: u16, name_units: &[u16]) -> Vec<u8> {
    let name_offset = 24usize;
    let value_offset = name_offset + name_units.len() * 2;
    let total = (value_offset + value.len() + 7) & !7;
    let mut attr = vec![0u8; total];
    attr[0..4].copy_from_slice(&type_code.to_le_bytes());
    attr[4..8].copy_from_slice(&(total as u32).to_le_bytes());
    attr[8] = 0;
    attr[9] = name_units.len() as u8;
    attr[10..12].copy_from_slice(&(name_offset as u16).to_le_bytes());
    attr[12..14].copy_from_slice(&attr_flags.to_le_bytes());
    attr[16..20].copy_from_slice(&(value.len() as u32).to_le_bytes());
    attr[20..22].copy_from_slice(&(value_offset as u16).to_le_bytes());
    for (i, u) in name_units.iter().enumerate() {
        attr[name_offset + i * 2..name_offset + i * 2 + 2].copy_from_slice(&u.to_le_bytes());
    }
    attr[value_offset..value_offset + value.len()].copy_from_slice(value);
    attr
}

fn non_resident_data_attr(
    extents: &[Extent],
    allocated: u64,
    real: u64,
    attr_flags: u16,
    name_units: &[u16],
) -> Vec<u8> {
    let runs = encode_runs(extents);
    let name_offset = 64usize;
    let runs_offset = name_offset + name_units.len() * 2;
    let total = (runs_offset + runs.len() + 7) & !7;
    let mut attr = vec![0u8; total];
    attr[0..4].copy_from_slice(&0x80u32.to_le_bytes());
    attr[4..8].copy_from_slice(&(total as u32).to_le_bytes());
    attr[8] = 1;
    attr[9] = name_units.len() as u8;
    attr[10..12].copy_from_slice(&(name_offset as u16).to_le_bytes());
    attr[12..14].copy_from_slice(&attr_flags.to_le_bytes());
    let clusters: u64 = extents.iter().map(|e| e.clusters).sum();
    attr[24..32].copy_from_slice(&clusters.saturating_sub(1).to_le_bytes());
    attr[32..34].copy_from_slice(&(runs_offset as u16).to_le_bytes());
    attr[40..48].copy_from_slice(&allocated.to_le_bytes());
    attr[48..56].copy_from_slice(&real.to_le_bytes());
    attr[56..64].copy_from_slice(&real.to_le_bytes());
    for (i, u) in name_units.iter().enumerate() {
        attr[name_offset + i * 2..name_offset + i * 2 + 2].copy_from_slice(&u.to_le_bytes());
    }
    attr[runs_offset..runs_offset + runs.len()].copy_from_slice(&runs);
    attr
}
