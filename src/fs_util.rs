use std::fs;
use std::io::{BufRead, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;

use crate::error::PipelineError;

/// Opens `path` for buffered reading, decoding gzip when the name ends
/// in `.gz`.
pub fn open_input(path: &Path) -> Result<Box<dyn BufRead>, PipelineError> {
    let file = fs::File::open(path)
        .map_err(|err| PipelineError::Filesystem(format!("open {}: {err}", path.display())))?;
    let is_gz = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);
    if is_gz {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

pub fn plain_or_gz(path: &Path) -> PathBuf {
    if path.exists() {
        return path.to_path_buf();
    }
    let mut gz = path.as_os_str().to_owned();
    gz.push(".gz");
    let gz = PathBuf::from(gz);
    if gz.exists() { gz } else { path.to_path_buf() }
}

pub fn ensure_dir(dir: &Path) -> Result<(), PipelineError> {
    fs::create_dir_all(dir)
        .map_err(|err| PipelineError::Filesystem(format!("create {}: {err}", dir.display())))
}

pub fn create_output(path: &Path) -> Result<BufWriter<fs::File>, PipelineError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }
    let file = fs::File::create(path)
        .map_err(|err| PipelineError::Filesystem(format!("create {}: {err}", path.display())))?;
    Ok(BufWriter::new(file))
}
