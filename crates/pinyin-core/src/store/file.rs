use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{DictionaryStore, FrequencyStore};
use crate::dict::{DictError, Tier, TierMap, ToneVariant};

const TIER_MAGIC: &[u8; 4] = b"PYTD";
const FREQ_MAGIC: &[u8; 4] = b"PYFQ";
const VERSION: u8 = 1;

/// Flat serialization format for bincode, sorted for reproducible files.
#[derive(Serialize, Deserialize)]
struct TierData {
    entries: Vec<(String, Vec<String>)>,
}

#[derive(Serialize, Deserialize)]
struct FrequencyData {
    counts: Vec<(String, u64)>,
}

fn encode<T: Serialize>(magic: &[u8; 4], data: &T) -> Result<Vec<u8>, DictError> {
    let body = bincode::serialize(data).map_err(DictError::Serialize)?;
    let mut buf = Vec::with_capacity(5 + body.len());
    buf.extend_from_slice(magic);
    buf.push(VERSION);
    buf.extend_from_slice(&body);
    Ok(buf)
}

fn decode<T: for<'de> Deserialize<'de>>(magic: &[u8; 4], bytes: &[u8]) -> Result<T, DictError> {
    if bytes.len() < 5 {
        return Err(DictError::InvalidHeader);
    }
    if &bytes[0..4] != magic {
        return Err(DictError::InvalidMagic);
    }
    if bytes[4] != VERSION {
        return Err(DictError::UnsupportedVersion(bytes[4]));
    }
    bincode::deserialize(&bytes[5..]).map_err(DictError::Deserialize)
}

/// Atomic write: write to .tmp then rename.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), DictError> {
    let tmp = path.with_extension("tmp");
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Read a file, mapping "does not exist" to `None`.
fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, DictError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// One `<tier>.<variant>.pytd` file per tier variant under a directory.
pub struct FileDictionaryStore {
    dir: PathBuf,
}

impl FileDictionaryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, tier: Tier, variant: ToneVariant) -> PathBuf {
        self.dir
            .join(format!("{}.{}.pytd", tier.name(), variant.name()))
    }
}

impl DictionaryStore for FileDictionaryStore {
    fn load(&self, tier: Tier, variant: ToneVariant) -> Result<Option<TierMap>, DictError> {
        let Some(bytes) = read_optional(&self.path_for(tier, variant))? else {
            return Ok(None);
        };
        let data: TierData = decode(TIER_MAGIC, &bytes)?;
        Ok(Some(data.entries.into_iter().collect()))
    }

    fn save(&self, tier: Tier, variant: ToneVariant, map: &TierMap) -> Result<(), DictError> {
        let mut entries: Vec<(String, Vec<String>)> =
            map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        entries.sort();
        let bytes = encode(TIER_MAGIC, &TierData { entries })?;
        write_atomic(&self.path_for(tier, variant), &bytes)
    }
}

/// Frequency counters in a single `.pyfq` file.
pub struct FileFrequencyStore {
    path: PathBuf,
}

impl FileFrequencyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl FrequencyStore for FileFrequencyStore {
    /// A missing file is an empty ledger.
    fn load(&self) -> Result<HashMap<String, u64>, DictError> {
        let Some(bytes) = read_optional(&self.path)? else {
            return Ok(HashMap::new());
        };
        let data: FrequencyData = decode(FREQ_MAGIC, &bytes)?;
        Ok(data.counts.into_iter().collect())
    }

    fn save(&self, counts: &HashMap<String, u64>) -> Result<(), DictError> {
        let mut counts: Vec<(String, u64)> =
            counts.iter().map(|(k, v)| (k.clone(), *v)).collect();
        counts.sort();
        let bytes = encode(FREQ_MAGIC, &FrequencyData { counts })?;
        write_atomic(&self.path, &bytes)
    }
}
