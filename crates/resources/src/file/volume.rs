//! Per-resource record headers inside volume files.
//!
//! The layouts by family:
//!
//! - SCI0 / middle SCI1: `{id:u16, packed+4:u16, unpacked:u16, method:u16}`
//! - late SCI1:          `{type:u8, number:u16, packed+4:u16, unpacked:u16, method:u16}`
//! - SCI1.1:             `{type:u8, number:u16, packed:u16, unpacked:u16, method:u16}`
//!
//! The early families fold the four header bytes after the packed-size field
//! into the stored packed size; the parsed header always reports the payload
//! size alone.

use scires_utils::data_reader::DataReader;

use crate::{
    error::Error,
    ids::{ResourceId, ResourceType},
    version::ResVersion,
};

#[derive(Debug, Clone, Copy)]
pub(crate) struct RawEntryHeader {
    id: ResourceId,
    packed_size: u16,
    unpacked_size: u16,
    method: u16,
}

impl RawEntryHeader {
    pub(crate) fn id(&self) -> ResourceId {
        self.id
    }

    pub(crate) fn packed_size(&self) -> u16 {
        self.packed_size
    }

    pub(crate) fn unpacked_size(&self) -> u16 {
        self.unpacked_size
    }

    pub(crate) fn method(&self) -> u16 {
        self.method
    }

    pub(crate) fn parse<R: DataReader>(
        reader: &mut R,
        version: ResVersion,
    ) -> Result<RawEntryHeader, Error> {
        let (type_index, number) = match version {
            ResVersion::Sci0Sci1Early | ResVersion::Sci1Middle => {
                let id = reader.read_u16_le()?;
                ((id >> 11) as u8, id & 0x7FF)
            }
            ResVersion::Sci1Late | ResVersion::Sci11 => {
                let type_byte = reader.read_u8()? & 0x7F;
                (type_byte, reader.read_u16_le()?)
            }
        };
        let stored_packed = reader.read_u16_le()?;
        let unpacked_size = reader.read_u16_le()?;
        let method = reader.read_u16_le()?;

        let packed_size = if version == ResVersion::Sci11 {
            stored_packed
        } else {
            stored_packed.checked_sub(4).ok_or_else(|| {
                Error::InvalidMapEntry(format!(
                    "volume record stores impossible packed size {stored_packed}"
                ))
            })?
        };
        let type_id = ResourceType::from_index(type_index)?;

        Ok(RawEntryHeader {
            id: ResourceId::new(type_id, number),
            packed_size,
            unpacked_size,
            method,
        })
    }
}

/// Reads the record at the reader's position and returns its header and
/// packed payload.
pub(crate) fn read_record<R: DataReader>(
    reader: &mut R,
    version: ResVersion,
) -> Result<(RawEntryHeader, Vec<u8>), Error> {
    let header = RawEntryHeader::parse(reader, version)?;
    let mut payload = vec![0u8; usize::from(header.packed_size())];
    reader.read_exact(&mut payload)?;
    Ok((header, payload))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use datalit::datalit;
    use scires_utils::data_reader::IoDataReader;

    use super::*;

    fn parse_record(
        data: impl AsRef<[u8]>,
        version: ResVersion,
    ) -> Result<(RawEntryHeader, Vec<u8>), Error> {
        let mut reader = IoDataReader::new(Cursor::new(data.as_ref().to_vec()));
        read_record(&mut reader, version)
    }

    #[test]
    fn reads_early_record() {
        let data = datalit! {
            @endian = le,
            4196u16,        // script 100
            8u16,           // packed 4 + header remainder
            4u16,           // unpacked
            0u16,           // stored
            0xAABBCCDD,     // payload
        };

        let (header, payload) = parse_record(data, ResVersion::Sci0Sci1Early).unwrap();
        assert_eq!(header.id(), ResourceId::new(ResourceType::Script, 100));
        assert_eq!(header.packed_size(), 4);
        assert_eq!(header.unpacked_size(), 4);
        assert_eq!(header.method(), 0);
        assert_eq!(payload, vec![0xAA, 0xBB, 0xCC, 0xDD]);
    }

    #[test]
    fn reads_sci11_record() {
        let data = datalit! {
            @endian = le,
            129u8,          // pic
            100u16,
            4u16,           // packed, no remainder folded in
            4u16,
            0u16,
            0xFADEDFAE,     // payload
        };

        let (header, payload) = parse_record(data, ResVersion::Sci11).unwrap();
        assert_eq!(header.id(), ResourceId::new(ResourceType::Pic, 100));
        assert_eq!(header.packed_size(), 4);
        assert_eq!(payload, vec![0xFA, 0xDE, 0xDF, 0xAE]);
    }

    #[test]
    fn early_packed_size_below_remainder_is_invalid() {
        let data = datalit! {
            @endian = le,
            4196u16,
            3u16,
            4u16,
            0u16,
        };
        assert!(matches!(
            parse_record(data, ResVersion::Sci0Sci1Early),
            Err(Error::InvalidMapEntry(_))
        ));
    }

    #[test]
    fn truncated_payload_is_an_io_error() {
        let data = datalit! {
            @endian = le,
            129u8,
            100u16,
            10u16,
            10u16,
            0u16,
            0u8,
        };
        assert!(matches!(
            parse_record(data, ResVersion::Sci11),
            Err(Error::Io(_))
        ));
    }
}
