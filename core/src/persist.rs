use crate::catalog::{Catalog, CatalogRecord};
use crate::error::CatalogError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

const CATALOG_MAGIC: &[u8; 4] = b"LXCT";
pub const CATALOG_VERSION: u8 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub num_terms: u32,
    pub word_width: u8,
    pub created_at: String,
    pub version: u32,
}

/// Locations of the two index files produced by a build.
#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub dictionary: PathBuf,
    pub postings: PathBuf,
}

impl IndexPaths {
    pub fn new<D: AsRef<Path>, P: AsRef<Path>>(dictionary: D, postings: P) -> Self {
        Self { dictionary: dictionary.as_ref().to_path_buf(), postings: postings.as_ref().to_path_buf() }
    }

    pub fn meta(&self) -> PathBuf {
        let mut name = self.dictionary.clone().into_os_string();
        name.push(".meta.json");
        PathBuf::from(name)
    }
}

pub(crate) fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => create_dir_all(dir),
        _ => Ok(()),
    }
}

/// Serialize a catalog: magic, format version byte, bincode record.
pub fn write_catalog<W: Write>(mut out: W, catalog: &Catalog) -> Result<(), CatalogError> {
    out.write_all(CATALOG_MAGIC)?;
    out.write_all(&[CATALOG_VERSION])?;
    bincode::serialize_into(&mut out, &catalog.to_record())?;
    out.flush()?;
    Ok(())
}

pub fn read_catalog<R: Read>(mut input: R) -> Result<Catalog, CatalogError> {
    let mut head = [0u8; 5];
    input.read_exact(&mut head)?;
    if &head[..4] != CATALOG_MAGIC {
        return Err(CatalogError::BadMagic);
    }
    if head[4] != CATALOG_VERSION {
        return Err(CatalogError::UnsupportedVersion(head[4]));
    }
    let record: CatalogRecord = bincode::deserialize_from(input)?;
    Catalog::from_record(record)
}

pub fn save_catalog(path: &Path, catalog: &Catalog) -> Result<(), CatalogError> {
    ensure_parent(path)?;
    let f = File::create(path)?;
    write_catalog(BufWriter::new(f), catalog)
}

pub fn load_catalog(path: &Path) -> Result<Catalog> {
    let f = File::open(path).with_context(|| format!("opening dictionary {}", path.display()))?;
    let catalog = read_catalog(BufReader::new(f)).with_context(|| format!("reading dictionary {}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        num_docs = catalog.num_docs(),
        num_terms = catalog.num_terms(),
        "loaded catalog"
    );
    Ok(catalog)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    let path = paths.meta();
    ensure_parent(&path)?;
    let mut f = File::create(&path)?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::WordWidth;

    #[test]
    fn catalog_survives_a_write_read_cycle() {
        let catalog = Catalog::new(vec!["delict".into()], vec![3, 1], WordWidth::new(2).unwrap());
        let mut bytes = Vec::new();
        write_catalog(&mut bytes, &catalog).unwrap();
        assert_eq!(&bytes[..4], b"LXCT");
        assert_eq!(bytes[4], CATALOG_VERSION);
        let loaded = read_catalog(bytes.as_slice()).unwrap();
        assert_eq!(loaded, catalog);
        assert_eq!(loaded.word_width().get(), 2);
    }

    #[test]
    fn rejects_foreign_files_and_future_versions() {
        assert!(matches!(read_catalog(&b"PK\x03\x04\x01rest"[..]), Err(CatalogError::BadMagic)));
        assert!(matches!(read_catalog(&b"LXCT\x09"[..]), Err(CatalogError::UnsupportedVersion(9))));
    }

    #[test]
    fn meta_sits_next_to_the_dictionary() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::new(dir.path().join("dictionary.txt"), dir.path().join("postings.txt"));
        assert!(paths.meta().ends_with("dictionary.txt.meta.json"));
        let meta = MetaFile { num_docs: 2, num_terms: 5, word_width: 3, created_at: "2024-01-01T00:00:00Z".into(), version: 1 };
        save_meta(&paths, &meta).unwrap();
        let back = load_meta(&paths).unwrap();
        assert_eq!(back.num_terms, 5);
    }
}
