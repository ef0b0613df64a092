use std::io::Write;
use std::path::{Path, PathBuf};

use gs_types::{CacheError, GsError, GsResult, SweepOutcome};

/// Leading bytes of every result artifact.
const MAGIC: &[u8; 4] = b"GSRS";
/// Bumped whenever the persisted layout of [`SweepOutcome`] changes.
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = MAGIC.len() + 4;

/// Storage manager for sweep result artifacts.
///
/// Artifacts are binary: a magic tag, a little-endian format version, then
/// the `bincode` encoding of the [`SweepOutcome`]. Loading an artifact yields
/// a value equal to the one saved.
#[derive(Debug)]
pub struct ResultStore {
    pub output_dir: PathBuf,
}

impl ResultStore {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> GsResult<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&output_dir)?;

        Ok(Self { output_dir })
    }

    /// Artifact file name for an experiment/universe pair.
    pub fn artifact_name(experiment: &str, universe: &str) -> String {
        format!("experiment{}_{}_grid_search_results.bin", experiment, universe)
    }

    pub fn artifact_path(&self, outcome: &SweepOutcome) -> PathBuf {
        self.output_dir.join(Self::artifact_name(
            &outcome.experiment.to_string(),
            &outcome.universe,
        ))
    }

    /// Persist `outcome`, replacing any artifact from an earlier run of the
    /// same configuration.
    pub fn save(&self, outcome: &SweepOutcome) -> GsResult<PathBuf> {
        let path = self.artifact_path(outcome);
        let bytes = encode(outcome)?;
        write_atomic(&self.output_dir, &path, &bytes)?;

        tracing::info!(
            "Saved {} result records ({} bytes) to {}",
            outcome.records.len(),
            bytes.len(),
            path.display()
        );
        Ok(path)
    }

    /// Load an artifact written by [`ResultStore::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> GsResult<SweepOutcome> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| CacheError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        decode(&bytes).map_err(|message| {
            CacheError::Corrupt {
                path: path.display().to_string(),
                message,
            }
            .into()
        })
    }

    /// Write a pretty-printed JSON copy of `outcome` for inspection.
    pub fn export_json<P: AsRef<Path>>(&self, outcome: &SweepOutcome, path: P) -> GsResult<()> {
        let path = path.as_ref();
        let json = serde_json::to_vec_pretty(outcome)?;
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(&self.output_dir);
        write_atomic(dir, path, &json)?;
        tracing::info!("Exported JSON results to {}", path.display());
        Ok(())
    }
}

fn encode(outcome: &SweepOutcome) -> GsResult<Vec<u8>> {
    let payload = bincode::serde::encode_to_vec(outcome, bincode::config::standard())
        .map_err(|e| GsError::Encoding(e.to_string()))?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

fn decode(bytes: &[u8]) -> Result<SweepOutcome, String> {
    if bytes.len() < HEADER_LEN || &bytes[..MAGIC.len()] != MAGIC {
        return Err("missing result artifact header".to_string());
    }
    let mut version = [0u8; 4];
    version.copy_from_slice(&bytes[MAGIC.len()..HEADER_LEN]);
    let version = u32::from_le_bytes(version);
    if version != FORMAT_VERSION {
        return Err(format!(
            "unsupported format version {} (expected {})",
            version, FORMAT_VERSION
        ));
    }

    let (outcome, read) = bincode::serde::decode_from_slice::<SweepOutcome, _>(
        &bytes[HEADER_LEN..],
        bincode::config::standard(),
    )
    .map_err(|e| e.to_string())?;
    if HEADER_LEN + read != bytes.len() {
        return Err(format!(
            "{} trailing bytes after payload",
            bytes.len() - HEADER_LEN - read
        ));
    }
    Ok(outcome)
}

fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> GsResult<()> {
    let write_error = |e: std::io::Error| CacheError::Write {
        path: path.display().to_string(),
        message: e.to_string(),
    };

    let mut temp = tempfile::Builder::new()
        .prefix(".results-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(write_error)?;
    temp.write_all(bytes).map_err(write_error)?;
    temp.as_file().sync_all().map_err(write_error)?;
    temp.persist(path).map_err(|e| write_error(e.error))?;
    Ok(())
}
