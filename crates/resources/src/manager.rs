//! The public facade: locating, decoding, caching, and pinning resources.

use std::{
    collections::BTreeMap,
    fs::File,
    io::{Read as _, Seek as _, SeekFrom},
    path::{Path, PathBuf},
};

use scires_utils::data_reader::{DataReader, IoDataReader};

use crate::{
    cache::{LruCache, Record, Status},
    compression,
    error::Error,
    file::{map, patch, volume},
    ids::{ResourceId, ResourceType},
    source::{SourceId, SourceKind, SourceRegistry},
    version::{self, ResVersion},
};

/// Default decoded-data budget for the LRU queue.
const DEFAULT_MAX_MEMORY: usize = 256 * 1024;
/// Hard cap on a single decoded resource.
const MAX_RESOURCE_SIZE: u32 = 0x0040_0000;
/// Volume file handles kept open, most recently used first.
const MAX_OPEN_VOLUMES: usize = 5;

#[derive(Debug, Clone)]
pub struct ResourceManagerOptions {
    /// Pin the container format family instead of probing the files.
    pub version: Option<ResVersion>,
    /// Scan the game directory for loose patch files.
    pub allow_patches: bool,
    /// LRU memory budget in bytes.
    pub max_memory: usize,
}

impl Default for ResourceManagerOptions {
    fn default() -> Self {
        ResourceManagerOptions {
            version: None,
            allow_patches: true,
            max_memory: DEFAULT_MAX_MEMORY,
        }
    }
}

/// The resource store for one game directory.
///
/// All operations are synchronous; dropping the manager releases every
/// decoded buffer and open file handle.
#[derive(Debug)]
pub struct ResourceManager {
    root: PathBuf,
    sources: SourceRegistry,
    records: BTreeMap<ResourceId, Record>,
    cache: LruCache,
    map_version: ResVersion,
    volume_version: ResVersion,
    volume_files: Vec<(PathBuf, File)>,
}

impl ResourceManager {
    /// Opens a game directory: registers its maps, volumes, and patch
    /// directory, settles the format versions, and scans everything.
    pub fn open(dir: impl AsRef<Path>, options: ResourceManagerOptions) -> Result<Self, Error> {
        let root = dir.as_ref().to_path_buf();
        let mut sources = SourceRegistry::default();
        register_sources(&mut sources, &root, options.allow_patches)?;

        let (map_version, volume_version) = match options.version {
            Some(version) => (version, version),
            None => detect_versions(&sources)?,
        };
        log::debug!("Detected resource map version: {map_version}");
        log::debug!("Detected volume version: {volume_version}");
        sources.set_wide_offsets(map_version == ResVersion::Sci11);

        let mut manager = ResourceManager {
            root,
            sources,
            records: BTreeMap::new(),
            cache: LruCache::new(options.max_memory),
            map_version,
            volume_version,
            volume_files: Vec::new(),
        };
        manager.scan_sources()?;
        manager.add_internal_sources();
        manager.scan_sources()?;
        Ok(manager)
    }

    #[must_use]
    pub fn map_version(&self) -> ResVersion {
        self.map_version
    }

    #[must_use]
    pub fn volume_version(&self) -> ResVersion {
        self.volume_version
    }

    /// Bytes of decoded data currently in the LRU queue.
    #[must_use]
    pub fn lru_memory(&self) -> usize {
        self.cache.memory_lru()
    }

    /// Bytes of decoded data pinned by lockers.
    #[must_use]
    pub fn locked_memory(&self) -> usize {
        self.cache.memory_locked()
    }

    #[must_use]
    pub fn max_memory(&self) -> usize {
        self.cache.max_memory()
    }

    /// Whether a resource exists in the catalog. Never loads anything.
    #[must_use]
    pub fn test(&self, id: ResourceId) -> bool {
        self.records.contains_key(&self.normalize(id))
    }

    pub fn resource_ids(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.records.keys().copied()
    }

    pub fn resources_of_type(
        &self,
        type_id: ResourceType,
    ) -> impl Iterator<Item = ResourceId> + '_ {
        self.records
            .keys()
            .copied()
            .filter(move |id| id.type_id() == type_id)
    }

    /// Looks a resource up, decoding it if necessary.
    ///
    /// With `lock` the resource is pinned until a matching number of
    /// [`ResourceManager::unlock`] calls; otherwise it joins the front of
    /// the LRU queue. Returns `None` both for unknown ids and for
    /// resources whose load failed (the failure is logged, not raised).
    pub fn find(&mut self, id: ResourceId, lock: bool) -> Option<&[u8]> {
        let id = self.normalize(id);
        if !self.records.contains_key(&id) {
            return None;
        }

        match self.records[&id].status {
            Status::NoMalloc => self.load_resource(id),
            Status::Enqueued => {
                let record = self.records.get_mut(&id).expect("record checked present");
                self.cache.remove(record);
            }
            _ => {}
        }
        // Unless an error occurred, the resource is now either locked or
        // allocated, but never queued or freed. Trim the queue before the
        // found record joins it, sparing the last survivor.
        self.cache.evict_over_budget(&mut self.records, true);

        let record = self.records.get_mut(&id).expect("record checked present");
        if lock {
            match record.status {
                Status::Allocated => {
                    record.status = Status::Locked;
                    record.lockers = 1;
                    self.cache.note_locked(record.size);
                }
                Status::Locked => record.lockers += 1,
                _ => {}
            }
        } else if record.status == Status::Allocated {
            self.cache.enqueue(record);
        }

        match &record.data {
            Some(data) => Some(data.as_slice()),
            None => {
                log::warn!("Failed to read {id}");
                None
            }
        }
    }

    /// Releases one lock; at zero the resource rejoins the LRU queue and
    /// an eviction sweep runs (this one may empty the queue).
    pub fn unlock(&mut self, id: ResourceId) {
        let id = self.normalize(id);
        let Some(record) = self.records.get_mut(&id) else {
            log::warn!("Attempt to unlock unknown resource {id}");
            return;
        };
        if record.status != Status::Locked {
            log::warn!("Attempt to unlock unlocked resource {id}");
            return;
        }
        record.lockers -= 1;
        if record.lockers == 0 {
            record.status = Status::Allocated;
            self.cache.note_unlocked(record.size);
            self.cache.enqueue(record);
        }
        self.cache.evict_over_budget(&mut self.records, false);
    }

    /// Scans any sources registered since the last scan. Each source is
    /// scanned exactly once; calling this again is cheap.
    pub fn scan_sources(&mut self) -> Result<(), Error> {
        enum ScanAction {
            Map(PathBuf),
            PatchDir(PathBuf),
            IntMap(u16),
            Nothing,
        }

        let pending: Vec<SourceId> = self
            .sources
            .ids()
            .filter(|id| !self.sources.get(*id).scanned)
            .collect();
        for source_id in pending {
            self.sources.mark_scanned(source_id);
            let action = match &self.sources.get(source_id).kind {
                SourceKind::ExtMap { file, .. } => ScanAction::Map(file.clone()),
                SourceKind::Directory { dir } => ScanAction::PatchDir(dir.clone()),
                SourceKind::IntMap { number } => ScanAction::IntMap(*number),
                _ => ScanAction::Nothing,
            };
            match action {
                ScanAction::Map(path) => self.read_resource_map(source_id, &path)?,
                ScanAction::PatchDir(dir) => self.read_resource_patches(&dir),
                ScanAction::IntMap(number) => self.read_internal_map(source_id, number),
                ScanAction::Nothing => {}
            }
        }
        Ok(())
    }

    /// Checks whether `script.000` uses the early block-table layout.
    ///
    /// A structurally impossible block table is distinct from "no": it
    /// means the script resource is from a format this store does not
    /// understand.
    pub fn has_old_script_header(&mut self) -> Result<bool, Error> {
        let id = ResourceId::new(ResourceType::Script, 0);
        let Some(data) = self.find(id, false) else {
            log::warn!("Failed to find script.000");
            return Ok(false);
        };

        const BLOCK_TYPES: u16 = 17;
        let mut offset = 2usize;
        while offset + 4 <= data.len() {
            let block_type = u16::from_le_bytes([data[offset], data[offset + 1]]);
            if block_type == 0 {
                return Ok(offset + 2 == data.len());
            }
            if block_type >= BLOCK_TYPES {
                return Err(Error::InvalidScriptVersion);
            }
            let skip = usize::from(u16::from_le_bytes([data[offset + 2], data[offset + 3]]));
            if skip < 2 {
                return Err(Error::InvalidScriptVersion);
            }
            offset += skip;
        }
        Ok(false)
    }

    /// Reduces an out-of-range resource number modulo the per-version
    /// bound.
    fn normalize(&self, id: ResourceId) -> ResourceId {
        let max = self.map_version.max_resource_number();
        let number = u32::from(id.resource_num());
        if number < max {
            return id;
        }
        let wrapped = (number % max) as u16;
        log::warn!(
            "Resource number {} out of range for {}, using {} instead",
            id,
            self.map_version,
            wrapped
        );
        ResourceId::new(id.type_id(), wrapped)
    }

    fn read_resource_map(&mut self, map_source: SourceId, path: &Path) -> Result<(), Error> {
        let file = File::open(path).map_err(|_| Error::MapNotFound)?;
        let mut reader = IoDataReader::new(file);
        let wide = self.sources.ids().any(|id| {
            matches!(
                self.sources.get(id).kind,
                SourceKind::Volume { map: Some(m), wide_offsets: true, .. } if m == map_source
            )
        });
        let entries = map::read_map(&mut reader, self.map_version, wide)?;
        for entry in entries {
            let Some(volume_source) = self.sources.volume_for(map_source, entry.volume_number)
            else {
                log::warn!(
                    "Could not get volume {} for resource {}",
                    entry.volume_number,
                    entry.id
                );
                continue;
            };
            // Adding a new resource only if it does not exist: a patch
            // scanned earlier keeps precedence.
            self.records
                .entry(entry.id)
                .or_insert_with(|| Record::new(entry.id, volume_source, entry.file_offset));
        }
        Ok(())
    }

    fn read_resource_patches(&mut self, dir: &Path) {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                log::warn!("Failed to scan patch directory {}: {err}", dir.display());
                return;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(id) = patch::infer_patch_id(&path) else {
                continue;
            };
            // Tuple-addressed audio patches use a different naming scheme
            // and are not single-number resources.
            if matches!(id.type_id(), ResourceType::Audio36 | ResourceType::Sync36) {
                continue;
            }
            let Some(info) = patch::read_patch_info(&path, id) else {
                continue;
            };

            let source = self.sources.add(SourceKind::Patch { file: path.clone() });
            self.sources.mark_scanned(source);
            let record = self
                .records
                .entry(id)
                .or_insert_with(|| Record::new(id, source, 0));
            match record.status {
                Status::Locked => {
                    log::warn!("Not patching {id}: resource is locked");
                    continue;
                }
                Status::Enqueued => self.cache.remove(record),
                _ => {}
            }
            // Overwrite everything, because we're patching.
            record.unalloc();
            record.source = source;
            record.size = info.data_size as usize;
            record.header_size = info.header_size;
            record.file_offset = 0;
            record.lockers = 0;
            log::debug!("Patching {} - OK", path.display());
        }
    }

    /// Registers an embedded map source for every `Map`-type resource in
    /// the catalog, associated with the matching digital-sample volume.
    fn add_internal_sources(&mut self) {
        let map_numbers: Vec<u16> = self
            .resources_of_type(ResourceType::Map)
            .map(|id| id.resource_num())
            .collect();
        for number in map_numbers {
            let audio_file = if number == 65535 {
                self.file_in_root("resource.sfx")
                    .or_else(|| self.file_in_root("resource.aud"))
            } else {
                self.file_in_root("resource.aud")
            };
            let int_map = self.sources.add(SourceKind::IntMap { number });
            match audio_file {
                Some(file) => {
                    self.sources.add(SourceKind::AudioVolume {
                        file,
                        map: Some(int_map),
                    });
                }
                None => log::debug!("No digital-sample volume for internal map {number}"),
            }
        }
    }

    fn read_internal_map(&mut self, map_source: SourceId, number: u16) {
        let map_id = ResourceId::new(ResourceType::Map, number);
        let Some(audio_volume) = self.sources.audio_volume_for(map_source) else {
            log::debug!("Internal map {number} has no associated sample volume");
            return;
        };
        let data = match self.find(map_id, false) {
            Some(data) => data.to_vec(),
            None => {
                log::warn!("Failed to read internal map {map_id}");
                return;
            }
        };
        if number != 65535 {
            // Tuple-addressed maps belong to the audio36 layer.
            log::debug!("Internal map {number} uses tuple entries; not scanned");
            return;
        }

        let mut pos = 0usize;
        while pos + 2 <= data.len() {
            let sample_number = u16::from_le_bytes([data[pos], data[pos + 1]]);
            pos += 2;
            if sample_number == 0xFFFF {
                break;
            }
            if pos + 4 > data.len() {
                log::warn!("Internal map {map_id} ends mid-entry");
                break;
            }
            let offset =
                u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]);
            pos += 4;
            let id = ResourceId::new(ResourceType::Audio, sample_number);
            self.records
                .entry(id)
                .or_insert_with(|| Record::new(id, audio_volume, offset));
        }
    }

    fn file_in_root(&self, name: &str) -> Option<PathBuf> {
        let entries = std::fs::read_dir(&self.root).ok()?;
        for entry in entries.flatten() {
            if entry
                .file_name()
                .to_str()
                .is_some_and(|n| n.eq_ignore_ascii_case(name))
            {
                return Some(entry.path());
            }
        }
        None
    }

    fn load_resource(&mut self, id: ResourceId) {
        match self.try_load(id) {
            Ok(data) => {
                let record = self.records.get_mut(&id).expect("record checked present");
                record.size = data.len();
                record.data = Some(data);
                record.status = Status::Allocated;
            }
            Err(err) => {
                log::warn!("Error occurred while reading {id}: {err}");
                let record = self.records.get_mut(&id).expect("record checked present");
                record.unalloc();
            }
        }
    }

    fn try_load(&mut self, id: ResourceId) -> Result<Vec<u8>, Error> {
        let record = &self.records[&id];
        let source_id = record.source;
        let offset = record.file_offset;
        let header_size = record.header_size;
        let declared_size = record.size;

        match &self.sources.get(source_id).kind {
            SourceKind::Patch { file } => load_patch_data(file, header_size, declared_size),
            SourceKind::Volume { file, .. } => {
                let path = file.clone();
                self.load_from_volume(&path, offset, id)
            }
            SourceKind::AudioVolume { file, .. } => {
                let path = file.clone();
                self.load_from_audio_volume(&path, offset, id)
            }
            _ => Err(Error::Io(std::io::Error::other(
                "resource source is not loadable",
            ))),
        }
    }

    fn load_from_volume(&mut self, path: &Path, offset: u32, id: ResourceId) -> Result<Vec<u8>, Error> {
        let volume_version = self.volume_version;
        let file = volume_file(&mut self.volume_files, path)?;
        let mut reader = IoDataReader::new(file);
        reader.seek_to(offset)?;
        let (header, payload) = volume::read_record(&mut reader, volume_version)?;
        if header.id() != id {
            return Err(Error::ResourceIdMismatch {
                expected: id,
                got: header.id(),
            });
        }
        let unpacked = u32::from(header.unpacked_size());
        if unpacked == 0 {
            return Err(Error::EmptyResource);
        }
        if unpacked > MAX_RESOURCE_SIZE {
            return Err(Error::ResourceTooBig(unpacked));
        }
        compression::decompress(header.method(), &payload, unpacked as usize)
    }

    fn load_from_audio_volume(
        &mut self,
        path: &Path,
        offset: u32,
        id: ResourceId,
    ) -> Result<Vec<u8>, Error> {
        let file = volume_file(&mut self.volume_files, path)?;
        let mut reader = IoDataReader::new(file);
        reader.seek_to(offset)?;

        // WAVE samples are stored verbatim, size in the RIFF header.
        let mut tag = [0u8; 4];
        reader.read_exact(&mut tag)?;
        if &tag == b"RIFF" {
            let size = reader.read_u32_le()? + 8;
            if size > MAX_RESOURCE_SIZE {
                return Err(Error::ResourceTooBig(size));
            }
            reader.seek_to(offset)?;
            let mut data = vec![0u8; size as usize];
            reader.read_exact(&mut data)?;
            return Ok(data);
        }

        reader.seek_to(offset)?;
        let type_byte = reader.read_u8()? & 0x7F;
        let got_type = ResourceType::from_index(type_byte)?;
        if got_type != id.type_id() {
            return Err(Error::ResourceIdMismatch {
                expected: id,
                got: ResourceId::new(got_type, id.resource_num()),
            });
        }
        let header_size = reader.read_u8()?;
        if header_size != 11 && header_size != 12 {
            return Err(Error::InvalidMapEntry(format!(
                "unexpected audio header size {header_size}"
            )));
        }
        // The sample size sits in the last four bytes of the 11-byte
        // header core.
        reader.skip(7)?;
        let size = reader.read_u32_le()?;
        if size == 0 {
            return Err(Error::EmptyResource);
        }
        if size > MAX_RESOURCE_SIZE {
            return Err(Error::ResourceTooBig(size));
        }
        reader.seek_to(offset + 2 + u32::from(header_size))?;
        let mut data = vec![0u8; size as usize];
        reader.read_exact(&mut data)?;
        Ok(data)
    }
}

fn register_sources(
    sources: &mut SourceRegistry,
    root: &Path,
    allow_patches: bool,
) -> Result<(), Error> {
    let mut listing: Vec<(String, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(root)?.flatten() {
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        listing.push((name.to_lowercase(), entry.path()));
    }
    let find_file = |name: &str| {
        listing
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p.clone())
    };

    let Some(map_path) = find_file("resource.map") else {
        return Err(Error::MapNotFound);
    };
    let map_source = sources.add(SourceKind::ExtMap {
        file: map_path,
        number: 0,
    });

    let mut volume_count = 0usize;
    for (name, path) in &listing {
        if let Some(number) = volume_number_of(name) {
            sources.add(SourceKind::Volume {
                file: path.clone(),
                number,
                wide_offsets: false,
                map: Some(map_source),
            });
            volume_count += 1;
        }
    }
    if volume_count == 0 {
        return Err(Error::NoSourceFiles);
    }

    if let (Some(message_map), Some(message_volume)) =
        (find_file("message.map"), find_file("resource.msg"))
    {
        let message_source = sources.add(SourceKind::ExtMap {
            file: message_map,
            number: 0,
        });
        sources.add(SourceKind::Volume {
            file: message_volume,
            number: 0,
            wide_offsets: false,
            map: Some(message_source),
        });
    }

    if allow_patches {
        sources.add(SourceKind::Directory {
            dir: root.to_path_buf(),
        });
    }
    Ok(())
}

/// Matches the `resource.0NN` volume naming scheme.
fn volume_number_of(name: &str) -> Option<u32> {
    let ext = name.strip_prefix("resource.")?;
    if ext.len() == 3 && ext.starts_with('0') && ext.chars().all(|c| c.is_ascii_digit()) {
        ext.parse().ok()
    } else {
        None
    }
}

fn detect_versions(sources: &SourceRegistry) -> Result<(ResVersion, ResVersion), Error> {
    let map_source = sources.first_ext_map().ok_or(Error::MapNotFound)?;
    let map_path = sources.path_of(map_source).expect("external map has a path");
    let mut map_reader = IoDataReader::new(File::open(map_path)?);
    let map_version =
        version::detect_map_version(&mut map_reader, |number| sources.has_volume_number(number));

    let volume_source = sources.first_volume().ok_or(Error::NoSourceFiles)?;
    let volume_path = sources.path_of(volume_source).expect("volume has a path");
    let mut volume_reader = IoDataReader::new(File::open(volume_path)?);
    let volume_version = version::detect_vol_version(&mut volume_reader);

    match (map_version, volume_version) {
        (Ok(map), Ok(volume)) => Ok((map, volume)),
        (Ok(map), Err(_)) => {
            log::warn!("Volume version not detected, using map version {map}");
            Ok((map, map))
        }
        (Err(_), Ok(volume)) => {
            log::warn!("Map version not detected, using volume version {volume}");
            Ok((volume, volume))
        }
        (Err(err), Err(_)) => Err(err),
    }
}

fn load_patch_data(path: &Path, header_size: u8, size: usize) -> Result<Vec<u8>, Error> {
    let mut file = File::open(path)?;
    // Skip the two-byte file header and any patch header bytes.
    file.seek(SeekFrom::Start(2 + u64::from(header_size)))?;
    let mut data = vec![0u8; size];
    file.read_exact(&mut data)?;
    Ok(data)
}

fn volume_file<'a>(
    files: &'a mut Vec<(PathBuf, File)>,
    path: &Path,
) -> Result<&'a mut File, Error> {
    if let Some(pos) = files.iter().position(|(p, _)| p == path) {
        let entry = files.remove(pos);
        files.insert(0, entry);
    } else {
        let file = File::open(path)?;
        files.insert(0, (path.to_path_buf(), file));
        if files.len() > MAX_OPEN_VOLUMES {
            files.pop();
        }
    }
    Ok(&mut files[0].1)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use proptest::prelude::*;

    use super::*;

    fn push_u16(out: &mut Vec<u8>, value: u16) {
        out.extend_from_slice(&value.to_le_bytes());
    }

    fn push_u32(out: &mut Vec<u8>, value: u32) {
        out.extend_from_slice(&value.to_le_bytes());
    }

    /// Builds a minimal SCI0-family game directory: one map, one volume.
    struct GameBuilder {
        /// id, method, packed payload, declared unpacked size.
        resources: Vec<(ResourceId, u16, Vec<u8>, u16)>,
    }

    impl GameBuilder {
        fn new() -> Self {
            GameBuilder {
                resources: Vec::new(),
            }
        }

        fn packed_resource(
            mut self,
            id: ResourceId,
            method: u16,
            payload: Vec<u8>,
            unpacked: u16,
        ) -> Self {
            self.resources.push((id, method, payload, unpacked));
            self
        }

        fn resource(self, id: ResourceId, data: Vec<u8>) -> Self {
            let unpacked = data.len() as u16;
            self.packed_resource(id, 0, data, unpacked)
        }

        fn script(self, number: u16, data: Vec<u8>) -> Self {
            self.resource(ResourceId::new(ResourceType::Script, number), data)
        }

        fn write(self, dir: &Path) {
            let mut vol = Vec::new();
            let mut offsets = Vec::new();
            for (id, method, payload, unpacked) in &self.resources {
                offsets.push(vol.len() as u32);
                let id_word = (u16::from(id.type_id().index()) << 11) | id.resource_num();
                push_u16(&mut vol, id_word);
                push_u16(&mut vol, payload.len() as u16 + 4);
                push_u16(&mut vol, *unpacked);
                push_u16(&mut vol, *method);
                vol.extend_from_slice(payload);
            }
            fs::write(dir.join("resource.000"), vol).unwrap();

            let mut map = Vec::new();
            for ((id, _, _, _), offset) in self.resources.iter().zip(&offsets) {
                let id_word = (u16::from(id.type_id().index()) << 11) | id.resource_num();
                push_u16(&mut map, id_word);
                push_u32(&mut map, *offset);
            }
            map.extend_from_slice(&[0xFF; 6]);
            fs::write(dir.join("resource.map"), map).unwrap();
        }
    }

    fn script_id(number: u16) -> ResourceId {
        ResourceId::new(ResourceType::Script, number)
    }

    fn open_game(dir: &Path, max_memory: usize) -> ResourceManager {
        ResourceManager::open(
            dir,
            ResourceManagerOptions {
                max_memory,
                ..ResourceManagerOptions::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn finds_and_decodes_map_resources() {
        let dir = tempfile::tempdir().unwrap();
        GameBuilder::new()
            .script(1, b"hello".to_vec())
            .script(2, b"world!".to_vec())
            .write(dir.path());

        let mut mgr = open_game(dir.path(), DEFAULT_MAX_MEMORY);
        assert_eq!(mgr.map_version(), ResVersion::Sci0Sci1Early);
        assert!(mgr.test(script_id(1)));
        assert!(!mgr.test(script_id(3)));
        assert_eq!(mgr.find(script_id(1), false).unwrap(), b"hello");
        assert_eq!(mgr.find(script_id(2), false).unwrap(), b"world!");
        assert!(mgr.find(script_id(3), false).is_none());
    }

    #[test]
    fn repeated_find_reuses_the_decoded_buffer() {
        let dir = tempfile::tempdir().unwrap();
        GameBuilder::new().script(1, vec![7; 64]).write(dir.path());

        let mut mgr = open_game(dir.path(), DEFAULT_MAX_MEMORY);
        mgr.find(script_id(1), false).unwrap();
        let first_ptr = mgr.records[&script_id(1)].data.as_ref().unwrap().as_ptr();
        mgr.find(script_id(1), false).unwrap();
        let second_ptr = mgr.records[&script_id(1)].data.as_ref().unwrap().as_ptr();
        assert_eq!(first_ptr, second_ptr);
    }

    #[test]
    fn token_compressed_records_decode_through_find() {
        let dir = tempfile::tempdir().unwrap();
        // Four literals, then three dictionary phrases, then end-of-stream.
        let mut w = crate::compression::lzw::tests::MsbBitWriter::new();
        for byte in [b'A', b'B', b'C', b'D'] {
            w.push_bits(u32::from(byte), 9);
        }
        for code in [0x102u32, 0x104, 0x103, 0x101] {
            w.push_bits(code, 9);
        }
        GameBuilder::new()
            .packed_resource(script_id(7), 2, w.finish(), 10)
            .write(dir.path());

        let mut mgr = open_game(dir.path(), DEFAULT_MAX_MEMORY);
        assert_eq!(mgr.find(script_id(7), false).unwrap(), b"ABCDABCDBC");
    }

    #[test]
    fn unknown_compression_method_loads_as_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        GameBuilder::new()
            .packed_resource(script_id(7), 9, vec![1, 2, 3], 3)
            .write(dir.path());

        let mut mgr = ResourceManager::open(
            dir.path(),
            ResourceManagerOptions {
                version: Some(ResVersion::Sci0Sci1Early),
                ..ResourceManagerOptions::default()
            },
        )
        .unwrap();
        assert!(mgr.test(script_id(7)));
        assert!(mgr.find(script_id(7), false).is_none());
    }

    #[test]
    fn missing_map_fails_construction() {
        let dir = tempfile::tempdir().unwrap();
        let err = ResourceManager::open(dir.path(), ResourceManagerOptions::default()).unwrap_err();
        assert!(matches!(err, Error::MapNotFound));
    }

    #[test]
    fn missing_volumes_fail_construction() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("resource.map"), [0xFF; 6]).unwrap();
        let err = ResourceManager::open(dir.path(), ResourceManagerOptions::default()).unwrap_err();
        assert!(matches!(err, Error::NoSourceFiles));
    }

    #[test]
    fn patch_file_overrides_map_entry() {
        let dir = tempfile::tempdir().unwrap();
        GameBuilder::new()
            .script(42, b"from volume".to_vec())
            .write(dir.path());
        let mut patch = vec![0x82, 0x00];
        patch.extend_from_slice(b"from patch");
        fs::write(dir.path().join("42.scr"), patch).unwrap();

        let mut mgr = open_game(dir.path(), DEFAULT_MAX_MEMORY);
        assert!(mgr.test(script_id(42)));
        assert_eq!(mgr.find(script_id(42), false).unwrap(), b"from patch");
    }

    #[test]
    fn old_style_patch_names_work_too() {
        let dir = tempfile::tempdir().unwrap();
        GameBuilder::new()
            .resource(ResourceId::new(ResourceType::View, 3), b"packed".to_vec())
            .write(dir.path());
        let mut patch = vec![0x80, 0x00];
        patch.extend_from_slice(b"loose");
        fs::write(dir.path().join("view.003"), patch).unwrap();

        let mut mgr = open_game(dir.path(), DEFAULT_MAX_MEMORY);
        assert_eq!(
            mgr.find(ResourceId::new(ResourceType::View, 3), false).unwrap(),
            b"loose"
        );
    }

    #[test]
    fn disallowing_patches_keeps_volume_data() {
        let dir = tempfile::tempdir().unwrap();
        GameBuilder::new()
            .script(42, b"from volume".to_vec())
            .write(dir.path());
        let mut patch = vec![0x82, 0x00];
        patch.extend_from_slice(b"from patch");
        fs::write(dir.path().join("42.scr"), patch).unwrap();

        let mut mgr = ResourceManager::open(
            dir.path(),
            ResourceManagerOptions {
                allow_patches: false,
                ..ResourceManagerOptions::default()
            },
        )
        .unwrap();
        assert_eq!(mgr.find(script_id(42), false).unwrap(), b"from volume");
    }

    #[test]
    fn out_of_range_numbers_wrap_modulo_bound() {
        let dir = tempfile::tempdir().unwrap();
        GameBuilder::new()
            .script(42, b"wrapped".to_vec())
            .write(dir.path());

        let mut mgr = open_game(dir.path(), DEFAULT_MAX_MEMORY);
        // SCI0-family bound is 1000, so 1042 lands on 42.
        assert!(mgr.test(script_id(1042)));
        assert_eq!(mgr.find(script_id(1042), false).unwrap(), b"wrapped");
    }

    #[test]
    fn eviction_follows_recency_order() {
        let dir = tempfile::tempdir().unwrap();
        GameBuilder::new()
            .script(1, vec![b'a'; 100])
            .script(2, vec![b'b'; 100])
            .script(3, vec![b'c'; 100])
            .script(4, vec![b'd'; 100])
            .write(dir.path());

        let mut mgr = open_game(dir.path(), 250);
        mgr.find(script_id(1), false).unwrap();
        mgr.find(script_id(2), false).unwrap();
        mgr.find(script_id(3), false).unwrap();
        // Touch 1 again so 2 becomes the least recently used.
        mgr.find(script_id(1), false).unwrap();
        mgr.find(script_id(4), false).unwrap();

        assert_eq!(mgr.records[&script_id(2)].status, Status::NoMalloc);
        for number in [1, 3, 4] {
            assert_eq!(
                mgr.records[&script_id(number)].status,
                Status::Enqueued,
                "script {number} should stay resident"
            );
        }
    }

    #[test]
    fn locking_prevents_eviction() {
        let dir = tempfile::tempdir().unwrap();
        GameBuilder::new()
            .script(1, vec![b'a'; 100])
            .script(2, vec![b'b'; 100])
            .script(3, vec![b'c'; 100])
            .script(4, vec![b'd'; 100])
            .write(dir.path());

        let mut mgr = open_game(dir.path(), 150);
        mgr.find(script_id(1), true).unwrap();
        assert_eq!(mgr.locked_memory(), 100);
        for number in [2, 3, 4] {
            mgr.find(script_id(number), false).unwrap();
        }
        assert_eq!(mgr.records[&script_id(1)].status, Status::Locked);
        assert!(mgr.records[&script_id(1)].data.is_some());

        // Nested locks release one at a time.
        mgr.find(script_id(1), true).unwrap();
        mgr.unlock(script_id(1));
        assert_eq!(mgr.records[&script_id(1)].status, Status::Locked);
        mgr.unlock(script_id(1));
        assert_eq!(mgr.records[&script_id(1)].status, Status::Enqueued);
        assert_eq!(mgr.locked_memory(), 0);
    }

    #[test]
    fn unlock_sweep_can_empty_the_queue() {
        let dir = tempfile::tempdir().unwrap();
        GameBuilder::new()
            .script(1, vec![0; 400])
            .script(2, vec![0; 50])
            .write(dir.path());

        let mut mgr = open_game(dir.path(), 250);
        mgr.find(script_id(1), false).unwrap();
        // The load-triggered sweep runs over budget here but spares the
        // sole queued entry.
        mgr.find(script_id(2), false).unwrap();
        assert_eq!(mgr.records[&script_id(1)].status, Status::Enqueued);

        // An unlock-triggered sweep has no such mercy.
        mgr.find(script_id(1), true).unwrap();
        mgr.unlock(script_id(1));
        assert_eq!(mgr.records[&script_id(1)].status, Status::NoMalloc);
        assert_eq!(mgr.lru_memory(), 0);
    }

    #[test]
    fn empty_resources_load_as_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        GameBuilder::new().script(9, Vec::new()).write(dir.path());

        let mut mgr = open_game(dir.path(), DEFAULT_MAX_MEMORY);
        assert!(mgr.test(script_id(9)));
        assert!(mgr.find(script_id(9), false).is_none());
        assert_eq!(mgr.records[&script_id(9)].status, Status::NoMalloc);
    }

    #[test]
    fn detects_old_script_header() {
        let dir = tempfile::tempdir().unwrap();
        // Header word, export block (type 7, size 6), terminator.
        let script = vec![0, 0, 7, 0, 6, 0, 0xAB, 0xCD, 0, 0];
        GameBuilder::new().script(0, script).write(dir.path());

        let mut mgr = open_game(dir.path(), DEFAULT_MAX_MEMORY);
        assert!(mgr.has_old_script_header().unwrap());
    }

    #[test]
    fn malformed_script_block_table_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        // Block type 99 is past every known block kind.
        let script = vec![0, 0, 99, 0, 6, 0, 0, 0];
        GameBuilder::new().script(0, script).write(dir.path());

        let mut mgr = open_game(dir.path(), DEFAULT_MAX_MEMORY);
        assert!(matches!(
            mgr.has_old_script_header(),
            Err(Error::InvalidScriptVersion)
        ));
    }

    #[test]
    fn internal_map_exposes_audio_samples() {
        let dir = tempfile::tempdir().unwrap();

        // SCI1.1 volume holding the embedded audio map as resource map.65535.
        let mut audio_map = Vec::new();
        push_u16(&mut audio_map, 5);
        push_u32(&mut audio_map, 0);
        push_u16(&mut audio_map, 0xFFFF);

        let mut vol = Vec::new();
        vol.push(0x90); // map type
        push_u16(&mut vol, 65535);
        push_u16(&mut vol, audio_map.len() as u16);
        push_u16(&mut vol, audio_map.len() as u16);
        push_u16(&mut vol, 0);
        vol.extend_from_slice(&audio_map);
        fs::write(dir.path().join("resource.000"), vol).unwrap();

        // SCI1.1 map: one five-byte entry for map.65535 at offset 0.
        let mut map = Vec::new();
        map.push(0x90);
        push_u16(&mut map, 9);
        map.push(0xFF);
        push_u16(&mut map, 14);
        push_u16(&mut map, 65535);
        map.extend_from_slice(&[0, 0, 0]);
        fs::write(dir.path().join("resource.map"), map).unwrap();

        // Sample volume: audio header then four sample bytes.
        let mut aud = vec![0x8D, 11];
        aud.extend_from_slice(&[0; 7]);
        push_u32(&mut aud, 4);
        aud.extend_from_slice(b"WXYZ");
        fs::write(dir.path().join("resource.aud"), aud).unwrap();

        let mut mgr = ResourceManager::open(
            dir.path(),
            ResourceManagerOptions {
                version: Some(ResVersion::Sci11),
                ..ResourceManagerOptions::default()
            },
        )
        .unwrap();
        let audio_id = ResourceId::new(ResourceType::Audio, 5);
        assert!(mgr.test(audio_id));
        assert_eq!(mgr.find(audio_id, false).unwrap(), b"WXYZ");
    }

    fn check_invariants(mgr: &ResourceManager) {
        let enqueued_sum: usize = mgr
            .records
            .values()
            .filter(|r| r.status == Status::Enqueued)
            .map(|r| r.size)
            .sum();
        assert_eq!(mgr.lru_memory(), enqueued_sum);
        for record in mgr.records.values() {
            let has_data = record.data.is_some();
            let should_have_data = matches!(
                record.status,
                Status::Allocated | Status::Enqueued | Status::Locked
            );
            assert_eq!(has_data, should_have_data, "data/status drift on {}", record.id);
            if record.status == Status::Locked {
                assert!(
                    !mgr.cache.contains(record.id),
                    "locked {} sits in the LRU queue",
                    record.id
                );
            }
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn cache_accounting_survives_arbitrary_op_sequences(
            ops in prop::collection::vec((0u16..6, 0u8..3), 1..60)
        ) {
            let dir = tempfile::tempdir().unwrap();
            let mut builder = GameBuilder::new();
            for number in 0..6u16 {
                builder = builder.script(number, vec![number as u8; 50 + usize::from(number) * 30]);
            }
            builder.write(dir.path());

            let mut mgr = open_game(dir.path(), 200);
            for (number, op) in ops {
                match op {
                    0 => {
                        mgr.find(script_id(number), false);
                    }
                    1 => {
                        mgr.find(script_id(number), true);
                    }
                    _ => mgr.unlock(script_id(number)),
                }
                check_invariants(&mgr);
            }
        }
    }
}
