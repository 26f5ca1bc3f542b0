//! Resource map parsing.
//!
//! Four encodings are supported. The six-byte families pack type and number
//! into one word and the volume into the top bits of the offset word; the
//! directory families prefix per-type entry tables with a (type, offset)
//! index terminated by an FF entry.

use scires_utils::data_reader::DataReader;

use crate::{
    error::Error,
    ids::{ResourceId, ResourceType},
    version::ResVersion,
};

/// One catalog entry: where a resource lives.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MapEntry {
    pub id: ResourceId,
    pub volume_number: u32,
    pub file_offset: u32,
}

/// Reads a whole map file under the given format family.
///
/// `wide_offsets` is the extended-addressing mode of the associated volume:
/// offsets are stored halved and must be doubled back (SCI1.1 packed
/// layout).
pub(crate) fn read_map<R: DataReader>(
    reader: &mut R,
    version: ResVersion,
    wide_offsets: bool,
) -> Result<Vec<MapEntry>, Error> {
    let entries = match version {
        ResVersion::Sci0Sci1Early | ResVersion::Sci1Middle => read_map_six_byte(reader, version)?,
        ResVersion::Sci1Late | ResVersion::Sci11 => {
            read_map_directory(reader, version, wide_offsets)?
        }
    };
    if entries.is_empty() {
        return Err(Error::EmptyMap);
    }
    Ok(entries)
}

fn read_map_six_byte<R: DataReader>(
    reader: &mut R,
    version: ResVersion,
) -> Result<Vec<MapEntry>, Error> {
    // SCI0 proper gives the volume six bits of the offset word; the middle
    // SCI1 variant only four.
    let offset_bits = if version == ResVersion::Sci1Middle {
        28
    } else {
        26
    };
    let mut entries = Vec::new();

    loop {
        let id = read_map_field(reader.read_u16_le())?;
        let offset = read_map_field(reader.read_u32_le())?;
        if offset == 0xFFFF_FFFF {
            break;
        }
        let type_index = (id >> 11) as u8;
        let number = id & 0x7FF;
        let Ok(type_id) = ResourceType::from_index(type_index) else {
            log::warn!("Skipping map entry with invalid type index {type_index}");
            continue;
        };
        entries.push(MapEntry {
            id: ResourceId::new(type_id, number),
            volume_number: offset >> offset_bits,
            file_offset: offset & ((1 << offset_bits) - 1),
        });
    }
    Ok(entries)
}

fn read_map_directory<R: DataReader>(
    reader: &mut R,
    version: ResVersion,
    wide_offsets: bool,
) -> Result<Vec<MapEntry>, Error> {
    let entry_size = if version == ResVersion::Sci11 { 5 } else { 6 };

    // Directory of per-type table offsets; sizes fall out of consecutive
    // offsets, with the FF entry supplying the end of the last table.
    let mut table_offsets = [0u16; 32];
    let mut table_counts = [0u16; 32];
    let mut prev_type = 0usize;
    loop {
        let type_index = usize::from(read_map_field(reader.read_u8())? & 0x1F);
        let offset = read_map_field(reader.read_u16_le())?;
        table_offsets[type_index] = offset;
        let span = offset.wrapping_sub(table_offsets[prev_type]);
        table_counts[prev_type] = span / entry_size;
        prev_type = type_index;
        if type_index == 0x1F {
            break;
        }
    }

    let mut entries = Vec::new();
    for type_index in 0..0x1F {
        if table_offsets[type_index] == 0 {
            continue;
        }
        let Ok(type_id) = ResourceType::from_index(type_index as u8) else {
            log::warn!("Skipping map directory with invalid type index {type_index}");
            continue;
        };
        reader.seek_to(u32::from(table_offsets[type_index]))?;
        for _ in 0..table_counts[type_index] {
            let number = read_map_field(reader.read_u16_le())?;
            let (volume_number, file_offset) = if version == ResVersion::Sci11 {
                // Offset packed into three bytes, stored halved when the
                // volume uses extended addressing.
                let raw = read_map_field(reader.read_u24_le())?;
                (0, if wide_offsets { raw << 1 } else { raw })
            } else {
                let raw = read_map_field(reader.read_u32_le())?;
                (raw >> 28, raw & 0x0FFF_FFFF)
            };
            entries.push(MapEntry {
                id: ResourceId::new(type_id, number),
                volume_number,
                file_offset,
            });
        }
    }
    Ok(entries)
}

fn read_map_field<T>(result: std::io::Result<T>) -> Result<T, Error> {
    result.map_err(|_| Error::InvalidMapEntry("map file ends mid-entry".into()))
}
