//! Snapshot persistence.
//!
//! A snapshot is one blob: `[magic "FRSNAP01"][bincode payload][CRC32 BE]`.
//! The payload carries the field names it was built with so a reader can
//! refuse a snapshot fitted under a different schema. An index directory
//! holds the snapshot next to a human-readable `meta.json`.

use crate::config::IndexSchema;
use crate::error::{RankError, Result};
use crate::index::{FittedState, SearchIndex};
use serde::{Deserialize, Serialize};
use std::fs::{self, create_dir_all, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

const SNAPSHOT_MAGIC: &[u8; 8] = b"FRSNAP01";
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub created_at: String,
    pub version: u32,
    pub text_fields: Vec<String>,
    pub keyword_fields: Vec<String>,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn snapshot(&self) -> PathBuf { self.root.join("snapshot.bin") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    text_fields: &'a [String],
    keyword_fields: &'a [String],
    state: &'a FittedState,
}

#[derive(Deserialize)]
struct SnapshotOwned {
    text_fields: Vec<String>,
    keyword_fields: Vec<String>,
    state: FittedState,
}

pub(crate) fn write_snapshot<W: Write>(mut sink: W, schema: &IndexSchema, state: &FittedState) -> Result<()> {
    let payload = bincode::serialize(&SnapshotRef {
        text_fields: &schema.text_fields,
        keyword_fields: &schema.keyword_fields,
        state,
    })?;
    let crc = crc32fast::hash(&payload);
    sink.write_all(SNAPSHOT_MAGIC)?;
    sink.write_all(&payload)?;
    sink.write_all(&crc.to_be_bytes())?;
    sink.flush()?;
    tracing::info!(bytes = payload.len() + SNAPSHOT_MAGIC.len() + 4, crc = %format!("{crc:#010x}"), "snapshot written");
    Ok(())
}

pub(crate) fn read_snapshot<R: Read>(mut source: R, schema: &IndexSchema) -> Result<FittedState> {
    let mut raw = Vec::new();
    source.read_to_end(&mut raw)?;
    if raw.len() < SNAPSHOT_MAGIC.len() + 4 || &raw[..SNAPSHOT_MAGIC.len()] != SNAPSHOT_MAGIC {
        return Err(RankError::CorruptSnapshot("missing snapshot header".into()));
    }
    let (payload, footer) = raw[SNAPSHOT_MAGIC.len()..].split_at(raw.len() - SNAPSHOT_MAGIC.len() - 4);
    let stored = u32::from_be_bytes([footer[0], footer[1], footer[2], footer[3]]);
    let computed = crc32fast::hash(payload);
    if stored != computed {
        return Err(RankError::CorruptSnapshot(format!(
            "checksum mismatch: stored {stored:#010x}, computed {computed:#010x}"
        )));
    }
    let snapshot: SnapshotOwned =
        bincode::deserialize(payload).map_err(|e| RankError::CorruptSnapshot(format!("undecodable payload: {e}")))?;

    if !same_fields(&snapshot.text_fields, &schema.text_fields)
        || !same_fields(&snapshot.keyword_fields, &schema.keyword_fields)
    {
        return Err(RankError::CorruptSnapshot(format!(
            "snapshot fields text={:?} keyword={:?} do not match index fields text={:?} keyword={:?}",
            snapshot.text_fields, snapshot.keyword_fields, schema.text_fields, schema.keyword_fields
        )));
    }
    snapshot.state.check_shape(schema)?;
    Ok(snapshot.state)
}

fn same_fields(a: &[String], b: &[String]) -> bool {
    let mut a: Vec<&String> = a.iter().collect();
    let mut b: Vec<&String> = b.iter().collect();
    a.sort_unstable();
    b.sort_unstable();
    a == b
}

/// Write the snapshot to `path` through a temp file and rename it into place.
pub(crate) fn save_snapshot_file(path: &Path, schema: &IndexSchema, state: &FittedState) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    let result = File::create(&tmp)
        .map_err(RankError::from)
        .and_then(|f| write_snapshot(BufWriter::new(f), schema, state));
    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

pub(crate) fn load_snapshot_file(path: &Path, schema: &IndexSchema) -> Result<FittedState> {
    let f = File::open(path)?;
    read_snapshot(BufReader::new(f), schema)
}

/// Write the snapshot and `meta.json` for `index` into an index directory.
pub fn save_index(index: &SearchIndex, paths: &IndexPaths, created_at: String) -> Result<()> {
    create_dir_all(&paths.root)?;
    index.save_to_path(paths.snapshot())?;
    let meta = MetaFile {
        num_docs: index.len() as u32,
        created_at,
        version: SNAPSHOT_VERSION,
        text_fields: index.schema().text_fields.clone(),
        keyword_fields: index.schema().keyword_fields.clone(),
    };
    save_meta(paths, &meta)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta())?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}
