use std::ffi::OsStr;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;

/// Serialized form of a history DAG, chosen from a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DagFileType {
    /// Larch mutation-annotated DAG protobuf.
    Protobuf,
    /// Flattened DAG as JSON.
    Json,
}

pub struct DagFileInfo {
    pub file_type: DagFileType,
    pub is_gzipped: bool,
}

///
/// Determine the DAG file type from a path like `dag.pb`, `dag.json` or `dag.json.gz`.
///
pub fn get_file_info(path: &Path) -> Option<DagFileInfo> {
    let is_gzipped = path.extension() == Some(OsStr::new("gz"));
    let inner = if is_gzipped {
        Path::new(path.file_stem()?)
    } else {
        path
    };
    let file_type = match inner.extension().and_then(OsStr::to_str) {
        Some("pb") => DagFileType::Protobuf,
        Some("json") => DagFileType::Json,
        _ => return None,
    };
    Some(DagFileInfo {
        file_type,
        is_gzipped,
    })
}

///
/// Get a reader for either a gzip'd or non-gzip'd file.
///
/// # Arguments
///
/// - path: path to the file to read
///
pub fn get_dynamic_reader(path: &Path) -> Result<BufReader<Box<dyn Read>>> {
    let is_gzipped = path.extension() == Some(OsStr::new("gz"));
    let file = File::open(path).with_context(|| format!("Failed to open file: {:?}", path))?;
    let file: Box<dyn Read> = match is_gzipped {
        true => Box::new(MultiGzDecoder::new(file)),
        false => Box::new(file),
    };

    Ok(BufReader::new(file))
}

///
/// File writer that gzips its output when the path ends in `.gz`.
///
/// Call [`DynamicWriter::finish`] when done: it writes the gzip trailer and reports
/// errors that would otherwise be lost on drop.
///
pub enum DynamicWriter {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl DynamicWriter {
    pub fn finish(self) -> io::Result<()> {
        match self {
            DynamicWriter::Plain(mut writer) => writer.flush(),
            DynamicWriter::Gzip(encoder) => encoder.finish()?.flush(),
        }
    }
}

impl Write for DynamicWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            DynamicWriter::Plain(writer) => writer.write(buf),
            DynamicWriter::Gzip(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            DynamicWriter::Plain(writer) => writer.flush(),
            DynamicWriter::Gzip(encoder) => encoder.flush(),
        }
    }
}

///
/// Get a writer for either a gzip'd or non-gzip'd file.
///
/// # Arguments
///
/// - path: path to the file to create
///
pub fn get_dynamic_writer(path: &Path) -> Result<DynamicWriter> {
    let is_gzipped = path.extension() == Some(OsStr::new("gz"));
    let file =
        File::create(path).with_context(|| format!("Failed to create file: {:?}", path))?;
    let file = BufWriter::new(file);

    Ok(match is_gzipped {
        true => DynamicWriter::Gzip(GzEncoder::new(file, Compression::default())),
        false => DynamicWriter::Plain(file),
    })
}
