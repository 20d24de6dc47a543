use std::fs;
use std::io::{self, ErrorKind};
use std::path::PathBuf;
use std::sync::Mutex;

use hashbrown::HashMap;
use strata_chunk::{ChunkCoord, Voxel, VoxelType};

use crate::pager::PageError;

const CHUNK_MAGIC: &[u8; 4] = b"STRC";
const HEADER_LEN: usize = 6;

/// Byte storage addressed by name. Formats are the caller's business.
pub trait Persister: Send + Sync {
    /// `Ok(None)` when nothing is stored under `name`.
    fn read(&self, name: &str) -> io::Result<Option<Vec<u8>>>;
    fn write(&self, name: &str, bytes: &[u8]) -> io::Result<()>;
}

/// Stores each name as a file inside one directory.
pub struct FsPersister {
    root: PathBuf,
}

impl FsPersister {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Persister for FsPersister {
    fn read(&self, name: &str) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.root.join(name)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, name: &str, bytes: &[u8]) -> io::Result<()> {
        fs::create_dir_all(&self.root)?;
        let path = self.root.join(name);
        let tmp = self.root.join(format!("{name}.tmp"));
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)
    }
}

/// In-memory store; contents vanish with the value.
#[derive(Default)]
pub struct MemPersister {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemPersister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.lock().unwrap().contains_key(name)
    }
}

impl Persister for MemPersister {
    fn read(&self, name: &str) -> io::Result<Option<Vec<u8>>> {
        Ok(self.entries.lock().unwrap().get(name).cloned())
    }

    fn write(&self, name: &str, bytes: &[u8]) -> io::Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(name.to_string(), bytes.to_vec());
        Ok(())
    }
}

pub fn chunk_file_name(coord: ChunkCoord) -> String {
    format!("chunk_{}_{}_{}.strc", coord.cx, coord.cy, coord.cz)
}

/// Magic, little-endian `u16` side, then one material byte per voxel.
pub fn encode_chunk(voxels: &[Voxel], side: i32) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + voxels.len());
    out.extend_from_slice(CHUNK_MAGIC);
    out.extend_from_slice(&(side as u16).to_le_bytes());
    out.extend(voxels.iter().map(|v| v.material().as_u8()));
    out
}

pub fn decode_chunk(bytes: &[u8], side: i32, out: &mut [Voxel]) -> Result<(), PageError> {
    if bytes.len() < HEADER_LEN || &bytes[..4] != CHUNK_MAGIC {
        return Err(PageError::Corrupt("bad magic".into()));
    }
    let stored_side = u16::from_le_bytes([bytes[4], bytes[5]]) as i32;
    if stored_side != side {
        return Err(PageError::Corrupt(format!(
            "chunk side {stored_side} does not match volume side {side}"
        )));
    }
    let body = &bytes[HEADER_LEN..];
    if body.len() != out.len() {
        return Err(PageError::Corrupt(format!(
            "expected {} voxels, found {}",
            out.len(),
            body.len()
        )));
    }
    for (dst, &b) in out.iter_mut().zip(body) {
        let ty = VoxelType::from_u8(b)
            .ok_or_else(|| PageError::Corrupt(format!("unknown material id {b}")))?;
        *dst = Voxel::new(ty);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_preserves_materials() {
        let voxels: Vec<Voxel> = (0..8)
            .map(|i| Voxel::new(VoxelType::ALL[i % VoxelType::ALL.len()]))
            .collect();
        let bytes = encode_chunk(&voxels, 2);
        let mut back = vec![Voxel::AIR; 8];
        decode_chunk(&bytes, 2, &mut back).unwrap();
        assert_eq!(back, voxels);
    }

    #[test]
    fn decode_rejects_side_mismatch_and_unknown_ids() {
        let bytes = encode_chunk(&[Voxel::AIR; 8], 2);
        let mut out = vec![Voxel::AIR; 27];
        assert!(matches!(decode_chunk(&bytes, 3, &mut out), Err(PageError::Corrupt(_))));

        let mut bad = encode_chunk(&[Voxel::AIR; 8], 2);
        bad[HEADER_LEN] = 250;
        let mut out = vec![Voxel::AIR; 8];
        assert!(matches!(decode_chunk(&bad, 2, &mut out), Err(PageError::Corrupt(_))));
        assert!(matches!(decode_chunk(b"nope", 2, &mut out), Err(PageError::Corrupt(_))));
    }

    #[test]
    fn fs_persister_reports_missing_as_none() {
        let dir = std::env::temp_dir().join(format!("strata-persist-{}", std::process::id()));
        let p = FsPersister::new(&dir);
        assert!(p.read("missing.strc").unwrap().is_none());
        p.write("a.strc", b"hello").unwrap();
        assert_eq!(p.read("a.strc").unwrap().as_deref(), Some(&b"hello"[..]));
        let _ = fs::remove_dir_all(&dir);
    }
}
