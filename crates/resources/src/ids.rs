//! Identifiers for the resources a game ships. These do no IO; they only
//! name things.

/// The resource kinds understood by the store.
///
/// Discriminants match the on-disk type bytes of patch files and late-format
/// volume records (`0x80`-based); map files store the bare index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ResourceType {
    View = 0x80,
    Pic,
    Script,
    Text,
    Sound,
    Memory,
    Vocab,
    Font,
    Cursor,
    Patch,
    Bitmap,
    Palette,
    CdAudio,
    Audio,
    Sync,
    Message,
    Map,
    Heap,
    Audio36,
    Sync36,
    Translation,
    Rave,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("Conversion Error: {0}")]
pub struct TypeConversionError(String);

const ALL_TYPES: [ResourceType; 22] = [
    ResourceType::View,
    ResourceType::Pic,
    ResourceType::Script,
    ResourceType::Text,
    ResourceType::Sound,
    ResourceType::Memory,
    ResourceType::Vocab,
    ResourceType::Font,
    ResourceType::Cursor,
    ResourceType::Patch,
    ResourceType::Bitmap,
    ResourceType::Palette,
    ResourceType::CdAudio,
    ResourceType::Audio,
    ResourceType::Sync,
    ResourceType::Message,
    ResourceType::Map,
    ResourceType::Heap,
    ResourceType::Audio36,
    ResourceType::Sync36,
    ResourceType::Translation,
    ResourceType::Rave,
];

impl ResourceType {
    /// Every supported type, in on-disk index order.
    pub fn all() -> impl Iterator<Item = ResourceType> {
        ALL_TYPES.into_iter()
    }

    /// The bare index used by map files (type byte without the `0x80` base).
    #[must_use]
    pub fn index(self) -> u8 {
        self as u8 & 0x7F
    }

    /// Converts a map-file type index back into a type.
    pub fn from_index(index: u8) -> Result<Self, TypeConversionError> {
        Self::try_from(0x80 | index)
    }

    /// The lowercase name used by the old `TYPE.NNN` patch naming scheme
    /// and by diagnostics.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ResourceType::View => "view",
            ResourceType::Pic => "pic",
            ResourceType::Script => "script",
            ResourceType::Text => "text",
            ResourceType::Sound => "sound",
            ResourceType::Memory => "memory",
            ResourceType::Vocab => "vocab",
            ResourceType::Font => "font",
            ResourceType::Cursor => "cursor",
            ResourceType::Patch => "patch",
            ResourceType::Bitmap => "bitmap",
            ResourceType::Palette => "palette",
            ResourceType::CdAudio => "cdaudio",
            ResourceType::Audio => "audio",
            ResourceType::Sync => "sync",
            ResourceType::Message => "message",
            ResourceType::Map => "map",
            ResourceType::Heap => "heap",
            ResourceType::Audio36 => "audio36",
            ResourceType::Sync36 => "sync36",
            ResourceType::Translation => "translation",
            ResourceType::Rave => "rave",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, TypeConversionError> {
        ALL_TYPES
            .into_iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| TypeConversionError(format!("Invalid resource type name: {name}")))
    }

    pub fn from_file_ext(ext: &str) -> Result<Self, TypeConversionError> {
        match ext.to_lowercase().as_str() {
            "v56" => Ok(ResourceType::View),
            "p56" => Ok(ResourceType::Pic),
            "scr" => Ok(ResourceType::Script),
            "tex" => Ok(ResourceType::Text),
            "snd" => Ok(ResourceType::Sound),
            "voc" => Ok(ResourceType::Vocab),
            "fon" => Ok(ResourceType::Font),
            "cur" => Ok(ResourceType::Cursor),
            "pat" => Ok(ResourceType::Patch),
            "bit" => Ok(ResourceType::Bitmap),
            "pal" => Ok(ResourceType::Palette),
            "cda" => Ok(ResourceType::CdAudio),
            "aud" => Ok(ResourceType::Audio),
            "syn" => Ok(ResourceType::Sync),
            "msg" => Ok(ResourceType::Message),
            "map" => Ok(ResourceType::Map),
            "hep" => Ok(ResourceType::Heap),
            "trn" => Ok(ResourceType::Translation),
            _ => Err(TypeConversionError(format!(
                "Invalid file extension for resource type: {ext}"
            ))),
        }
    }

    // This may need to be given a target engine version to be correct.
    #[must_use]
    pub fn to_file_ext(self) -> &'static str {
        match self {
            ResourceType::View => "v56",
            ResourceType::Pic => "p56",
            ResourceType::Script => "scr",
            ResourceType::Text => "tex",
            ResourceType::Sound => "snd",
            ResourceType::Vocab => "voc",
            ResourceType::Font => "fon",
            ResourceType::Cursor => "cur",
            ResourceType::Patch => "pat",
            ResourceType::Bitmap => "bit",
            ResourceType::Palette => "pal",
            ResourceType::CdAudio => "cda",
            ResourceType::Audio => "aud",
            ResourceType::Sync => "syn",
            ResourceType::Message => "msg",
            ResourceType::Map => "map",
            ResourceType::Heap => "hep",
            ResourceType::Translation => "trn",
            _ => "",
        }
    }
}

impl TryFrom<u8> for ResourceType {
    type Error = TypeConversionError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x80 => Ok(ResourceType::View),
            0x81 => Ok(ResourceType::Pic),
            0x82 => Ok(ResourceType::Script),
            0x83 => Ok(ResourceType::Text),
            0x84 => Ok(ResourceType::Sound),
            0x85 => Ok(ResourceType::Memory),
            0x86 => Ok(ResourceType::Vocab),
            0x87 => Ok(ResourceType::Font),
            0x88 => Ok(ResourceType::Cursor),
            0x89 => Ok(ResourceType::Patch),
            0x8A => Ok(ResourceType::Bitmap),
            0x8B => Ok(ResourceType::Palette),
            0x8C => Ok(ResourceType::CdAudio),
            0x8D => Ok(ResourceType::Audio),
            0x8E => Ok(ResourceType::Sync),
            0x8F => Ok(ResourceType::Message),
            0x90 => Ok(ResourceType::Map),
            0x91 => Ok(ResourceType::Heap),
            0x92 => Ok(ResourceType::Audio36),
            0x93 => Ok(ResourceType::Sync36),
            0x94 => Ok(ResourceType::Translation),
            0x95 => Ok(ResourceType::Rave),
            _ => Err(TypeConversionError(format!(
                "Invalid resource type: 0x{value:02X}"
            ))),
        }
    }
}

impl From<ResourceType> for u8 {
    fn from(value: ResourceType) -> u8 {
        value as u8
    }
}

/// A typed, numbered resource identity.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId {
    type_id: ResourceType,
    resource_num: u16,
}

impl ResourceId {
    #[must_use]
    pub fn new(type_id: ResourceType, resource_num: u16) -> ResourceId {
        ResourceId {
            type_id,
            resource_num,
        }
    }

    #[must_use]
    pub fn type_id(&self) -> ResourceType {
        self.type_id
    }

    #[must_use]
    pub fn resource_num(&self) -> u16 {
        self.resource_num
    }
}

impl std::fmt::Debug for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}:{}", self.type_id, self.resource_num)
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:03}", self.type_id.name(), self.resource_num)
    }
}
