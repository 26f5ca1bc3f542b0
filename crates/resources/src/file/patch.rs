//! Loose patch files: one resource per file, overriding the map-derived
//! location of the same id.
//!
//! Two naming conventions exist. The old scheme spells the type out and
//! numbers the extension (`view.001`); the newer one numbers the stem and
//! tags the type with a three-letter suffix (`1.v56`). A file matching
//! either shape still has to agree with the type byte in its own header to
//! be accepted.

use std::{ffi::OsStr, fs::File, path::Path};

use scires_utils::data_reader::{DataReader, IoDataReader};

use crate::ids::{ResourceId, ResourceType};

/// What a validated patch file contributes to the catalog.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PatchInfo {
    pub id: ResourceId,
    /// Bytes between the two-byte file header and the resource data.
    pub header_size: u8,
    pub data_size: u32,
}

/// Guesses a resource id from a file name, trying both naming schemes.
pub(crate) fn infer_patch_id(path: &Path) -> Option<ResourceId> {
    let stem = path.file_stem().and_then(OsStr::to_str)?;
    let ext = path.extension().and_then(OsStr::to_str)?;

    // Newer scheme: NNN.SUF
    if let Ok(number) = stem.parse::<u16>()
        && let Ok(type_id) = ResourceType::from_file_ext(ext)
    {
        return Some(ResourceId::new(type_id, number));
    }

    // Old scheme: TYPE.NNN
    if let Ok(number) = ext.parse::<u16>()
        && let Ok(type_id) = ResourceType::from_name(&stem.to_lowercase())
    {
        return Some(ResourceId::new(type_id, number));
    }

    None
}

/// Validates a candidate patch file against its inferred id.
///
/// Returns `None` (with a log line) for files that are not usable patches;
/// this path never hard-fails a scan.
pub(crate) fn read_patch_info(path: &Path, id: ResourceId) -> Option<PatchInfo> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) => {
            log::warn!("Failed to open patch file {}: {err}", path.display());
            return None;
        }
    };
    let mut reader = IoDataReader::new(file);

    let info = (|| -> std::io::Result<Option<PatchInfo>> {
        let file_size = reader.file_size()?;
        if file_size < 3 {
            log::debug!("Patching {} failed - file too small", path.display());
            return Ok(None);
        }

        let patch_type = reader.read_u8()? & 0x7F;
        let mut data_offset = reader.read_u8()?;

        if patch_type != id.type_id().index() {
            log::debug!(
                "Patching {} failed - resource type mismatch",
                path.display()
            );
            return Ok(None);
        }

        // A set high bit selects one of a few fixed header sizes instead of
        // storing the size directly (observed in SQ5/German patches).
        if data_offset & 0x80 != 0 {
            data_offset = match data_offset & 0x7F {
                0 => 24,
                1 => 2,
                4 => 8,
                other => {
                    log::warn!("Resource patch unsupported special case {other:X}");
                    return Ok(None);
                }
            };
        }

        if u32::from(data_offset) + 2 >= file_size {
            log::debug!(
                "Patching {} failed - patch starting at offset {} can't be in file of size {}",
                path.display(),
                u32::from(data_offset) + 2,
                file_size
            );
            return Ok(None);
        }

        Ok(Some(PatchInfo {
            id,
            header_size: data_offset,
            data_size: file_size - u32::from(data_offset) - 2,
        }))
    })();

    match info {
        Ok(result) => result,
        Err(err) => {
            log::warn!("Failed to read patch file {}: {err}", path.display());
            None
        }
    }
}
