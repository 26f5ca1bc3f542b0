//! The registry of places resources can come from: packed volume files,
//! their map files (external or embedded), patch directories, and the
//! individual patch files discovered in them.

use std::path::{Path, PathBuf};

/// Index of a source in the registry. Sources live as long as the manager;
/// records refer to them by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SourceId(usize);

#[derive(Debug)]
pub(crate) enum SourceKind {
    /// A packed resource volume (`resource.0NN`).
    Volume {
        file: PathBuf,
        number: u32,
        /// Extended addressing: map offsets into this volume are stored
        /// halved and doubled back on read.
        wide_offsets: bool,
        map: Option<SourceId>,
    },
    /// A digital-sample volume (`resource.aud` / `resource.sfx`),
    /// addressed through an embedded map.
    AudioVolume { file: PathBuf, map: Option<SourceId> },
    /// An external map file (`resource.map` and friends).
    ExtMap { file: PathBuf, number: u32 },
    /// A map embedded as a `Map`-type resource.
    IntMap { number: u16 },
    /// A directory scanned for loose patch files.
    Directory { dir: PathBuf },
    /// One validated patch file.
    Patch { file: PathBuf },
}

#[derive(Debug)]
pub(crate) struct Source {
    pub kind: SourceKind,
    /// Each source is scanned exactly once.
    pub scanned: bool,
}

#[derive(Debug, Default)]
pub(crate) struct SourceRegistry {
    sources: Vec<Source>,
}

impl SourceRegistry {
    pub(crate) fn add(&mut self, kind: SourceKind) -> SourceId {
        self.sources.push(Source {
            kind,
            scanned: false,
        });
        SourceId(self.sources.len() - 1)
    }

    pub(crate) fn get(&self, id: SourceId) -> &Source {
        &self.sources[id.0]
    }

    pub(crate) fn mark_scanned(&mut self, id: SourceId) {
        self.sources[id.0].scanned = true;
    }

    pub(crate) fn ids(&self) -> impl Iterator<Item = SourceId> {
        (0..self.sources.len()).map(SourceId)
    }

    /// The volume associated with a map, by volume number.
    pub(crate) fn volume_for(&self, map: SourceId, number: u32) -> Option<SourceId> {
        self.ids().find(|id| match &self.get(*id).kind {
            SourceKind::Volume {
                number: vol_number,
                map: Some(vol_map),
                ..
            } => *vol_map == map && *vol_number == number,
            _ => false,
        })
    }

    /// The audio volume associated with an embedded map.
    pub(crate) fn audio_volume_for(&self, map: SourceId) -> Option<SourceId> {
        self.ids().find(|id| match &self.get(*id).kind {
            SourceKind::AudioVolume {
                map: Some(vol_map), ..
            } => *vol_map == map,
            _ => false,
        })
    }

    /// Whether any registered volume carries this number.
    pub(crate) fn has_volume_number(&self, number: u32) -> bool {
        self.ids().any(|id| {
            matches!(
                &self.get(id).kind,
                SourceKind::Volume { number: n, .. } if *n == number
            )
        })
    }

    pub(crate) fn first_ext_map(&self) -> Option<SourceId> {
        self.ids()
            .find(|id| matches!(self.get(*id).kind, SourceKind::ExtMap { .. }))
    }

    pub(crate) fn first_volume(&self) -> Option<SourceId> {
        self.ids()
            .find(|id| matches!(self.get(*id).kind, SourceKind::Volume { .. }))
    }

    /// Flips extended addressing on every volume; decided once version
    /// detection has settled.
    pub(crate) fn set_wide_offsets(&mut self, wide: bool) {
        for source in &mut self.sources {
            if let SourceKind::Volume { wide_offsets, .. } = &mut source.kind {
                *wide_offsets = wide;
            }
        }
    }

    pub(crate) fn path_of(&self, id: SourceId) -> Option<&Path> {
        match &self.get(id).kind {
            SourceKind::Volume { file, .. }
            | SourceKind::AudioVolume { file, .. }
            | SourceKind::ExtMap { file, .. }
            | SourceKind::Patch { file } => Some(file),
            SourceKind::Directory { dir } => Some(dir),
            SourceKind::IntMap { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_lookup_respects_map_association() {
        let mut registry = SourceRegistry::default();
        let map_a = registry.add(SourceKind::ExtMap {
            file: "a.map".into(),
            number: 0,
        });
        let map_b = registry.add(SourceKind::ExtMap {
            file: "b.map".into(),
            number: 0,
        });
        let vol_a = registry.add(SourceKind::Volume {
            file: "a.000".into(),
            number: 0,
            wide_offsets: false,
            map: Some(map_a),
        });
        let vol_b = registry.add(SourceKind::Volume {
            file: "b.000".into(),
            number: 0,
            wide_offsets: false,
            map: Some(map_b),
        });

        assert_eq!(registry.volume_for(map_a, 0), Some(vol_a));
        assert_eq!(registry.volume_for(map_b, 0), Some(vol_b));
        assert_eq!(registry.volume_for(map_a, 1), None);
    }

    #[test]
    fn scanned_flag_sticks() {
        let mut registry = SourceRegistry::default();
        let dir = registry.add(SourceKind::Directory { dir: ".".into() });
        assert!(!registry.get(dir).scanned);
        registry.mark_scanned(dir);
        assert!(registry.get(dir).scanned);
    }
}
