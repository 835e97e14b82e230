use std::ffi::OsString;
use std::fmt;
use std::fs::{self, File, Metadata};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local, NaiveDate, TimeZone};
use exif::{In, Tag};
use md5::{Digest, Md5};

use crate::config::TimestampSource;
use crate::error::FingerprintError;
use crate::extensions::{normalize_extension, ExtensionAllowList};

/// Hex MD5 digest of a file's full content. Equal content, equal hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ContentHash {
    fn from(hex: &str) -> Self {
        Self(hex.to_string())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One file considered for placement. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Base name with extension, byte for byte as on disk.
    pub full_name: OsString,
    /// Base name without the last extension.
    pub stem: OsString,
    pub source_path: PathBuf,
    /// Directory holding `source_path`.
    pub directory: PathBuf,
    /// Lowercase with a leading dot, or empty.
    pub extension: String,
    pub size_bytes: u64,
    /// Date the file is filed under.
    pub effective_timestamp: DateTime<Local>,
}

impl FileRecord {
    pub fn new(path: &Path, size_bytes: u64, effective_timestamp: DateTime<Local>) -> Self {
        Self {
            full_name: path.file_name().map(OsString::from).unwrap_or_default(),
            stem: path.file_stem().map(OsString::from).unwrap_or_default(),
            source_path: path.to_path_buf(),
            directory: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            extension: extension_of(path),
            size_bytes,
            effective_timestamp,
        }
    }

    /// Extension exactly as it appears in `full_name`, dot included.
    pub fn original_extension(&self) -> OsString {
        match Path::new(&self.full_name).extension() {
            Some(ext) => {
                let mut dotted = OsString::from(".");
                dotted.push(ext);
                dotted
            }
            None => OsString::new(),
        }
    }
}

pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| normalize_extension(&e.to_string_lossy()))
        .unwrap_or_default()
}

/// Turns a path into a `(hash, record)` pair, or decides it does not belong
/// in the index at all.
#[derive(Debug, Clone)]
pub struct Fingerprinter {
    extensions: ExtensionAllowList,
    min_size: u64,
    timestamps: TimestampSource,
}

impl Fingerprinter {
    pub fn new(extensions: ExtensionAllowList, min_size: u64, timestamps: TimestampSource) -> Self {
        Self {
            extensions,
            min_size,
            timestamps,
        }
    }

    /// Hashes and dates one file.
    ///
    /// # Arguments
    /// * `path` - File yielded by the walker
    ///
    /// # Returns
    /// * `Ok(Some(_))` - The content hash and the record for the index
    /// * `Ok(None)` - Filtered out by extension or size, never read
    /// * `Err(_)` - The file could not be stat'ed or read
    pub fn fingerprint(
        &self,
        path: &Path,
    ) -> Result<Option<(ContentHash, FileRecord)>, FingerprintError> {
        if !self.extensions.allows(&extension_of(path)) {
            return Ok(None);
        }

        let metadata = fs::metadata(path).map_err(|err| FingerprintError::StatFailed {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        if metadata.len() < self.min_size {
            return Ok(None);
        }

        let hash = hash_file(path)?;
        let timestamp = self.effective_timestamp(path, &metadata)?;

        Ok(Some((hash, FileRecord::new(path, metadata.len(), timestamp))))
    }

    fn effective_timestamp(
        &self,
        path: &Path,
        metadata: &Metadata,
    ) -> Result<DateTime<Local>, FingerprintError> {
        if self.timestamps == TimestampSource::Exif {
            if let Some(taken) = exif_timestamp(path) {
                return Ok(taken);
            }
        }

        earliest_filesystem_time(metadata)
            .map(DateTime::<Local>::from)
            .ok_or_else(|| FingerprintError::StatFailed {
                path: path.to_path_buf(),
                reason: "no filesystem timestamps available".to_string(),
            })
    }
}

/// Streams the file through MD5. Any read error discards the whole file.
pub fn hash_file(path: &Path) -> Result<ContentHash, FingerprintError> {
    let unreadable = |source| FingerprintError::Unreadable {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(unreadable)?;
    let mut hasher = Md5::new();
    let mut buffer = [0; 8192];

    loop {
        let count = file.read(&mut buffer).map_err(unreadable)?;
        if count == 0 {
            break;
        }
        hasher.update(&buffer[..count]);
    }

    Ok(ContentHash(format!("{:x}", hasher.finalize())))
}

/// Oldest of creation, access and modification time, skipping whichever
/// the platform cannot report.
pub fn earliest_filesystem_time(metadata: &Metadata) -> Option<SystemTime> {
    [metadata.created(), metadata.accessed(), metadata.modified()]
        .into_iter()
        .filter_map(Result::ok)
        .min()
}

fn exif_timestamp(path: &Path) -> Option<DateTime<Local>> {
    let file = File::open(path).ok()?;
    let mut reader = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut reader).ok()?;

    // DateTimeOriginal is when the shutter fired; DateTime is the last edit.
    [Tag::DateTimeOriginal, Tag::DateTime]
        .into_iter()
        .filter_map(|tag| exif.get_field(tag, In::PRIMARY))
        .find_map(|field| match field.value {
            exif::Value::Ascii(ref values) => values
                .first()
                .and_then(|raw| exif::DateTime::from_ascii(raw).ok())
                .and_then(|dt| {
                    NaiveDate::from_ymd_opt(dt.year.into(), dt.month.into(), dt.day.into())?
                        .and_hms_opt(dt.hour.into(), dt.minute.into(), dt.second.into())
                })
                .and_then(|naive| Local.from_local_datetime(&naive).earliest()),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::FileTimes;
    use tempfile::tempdir;

    fn set_times(path: &Path, when: SystemTime) {
        let file = fs::OpenOptions::new().write(true).open(path).unwrap();
        file.set_times(FileTimes::new().set_accessed(when).set_modified(when))
            .unwrap();
    }

    #[test]
    fn equal_content_hashes_equal() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.jpg");
        let b = dir.path().join("b.JPG");
        let c = dir.path().join("c.jpg");
        fs::write(&a, b"same bytes").unwrap();
        fs::write(&b, b"same bytes").unwrap();
        fs::write(&c, b"other bytes").unwrap();

        assert_eq!(hash_file(&a).unwrap(), hash_file(&b).unwrap());
        assert_ne!(hash_file(&a).unwrap(), hash_file(&c).unwrap());
        assert_eq!(hash_file(&a).unwrap().as_str().len(), 32);
    }

    #[test]
    fn known_md5_digest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.jpg");
        fs::write(&path, b"").unwrap();
        assert_eq!(
            hash_file(&path).unwrap().as_str(),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
    }

    #[test]
    fn record_fields_come_from_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Holiday.Beach.JPG");
        fs::write(&path, b"pixels").unwrap();

        let fp = Fingerprinter::new(ExtensionAllowList::default(), 0, TimestampSource::Filesystem);
        let (_, record) = fp.fingerprint(&path).unwrap().unwrap();

        assert_eq!(record.full_name, "Holiday.Beach.JPG");
        assert_eq!(record.stem, "Holiday.Beach");
        assert_eq!(record.extension, ".jpg");
        assert_eq!(record.original_extension(), ".JPG");
        assert_eq!(record.size_bytes, 6);
        assert_eq!(record.directory, dir.path());
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_names_survive_in_the_record() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let r = FileRecord::new(
            &Path::new("/src").join(OsStr::from_bytes(b"caf\xe9.Jpg")),
            1,
            Local::now(),
        );
        assert_eq!(r.full_name, OsStr::from_bytes(b"caf\xe9.Jpg"));
        assert_eq!(r.stem, OsStr::from_bytes(b"caf\xe9"));
        assert_eq!(r.original_extension(), ".Jpg");
        assert_eq!(r.extension, ".jpg");
    }

    #[test]
    fn effective_timestamp_is_the_earliest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("old.jpg");
        fs::write(&path, b"old").unwrap();
        let past = Local
            .with_ymd_and_hms(2019, 3, 14, 9, 26, 53)
            .single()
            .unwrap();
        set_times(&path, SystemTime::from(past));

        let fp = Fingerprinter::new(ExtensionAllowList::default(), 0, TimestampSource::Filesystem);
        let (_, record) = fp.fingerprint(&path).unwrap().unwrap();
        assert_eq!(record.effective_timestamp, past);
    }

    #[test]
    fn exif_source_falls_back_to_filesystem() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("not_really.jpg");
        fs::write(&path, b"no exif here").unwrap();
        let past = Local.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).single().unwrap();
        set_times(&path, SystemTime::from(past));

        let fp = Fingerprinter::new(ExtensionAllowList::default(), 0, TimestampSource::Exif);
        let (_, record) = fp.fingerprint(&path).unwrap().unwrap();
        assert_eq!(record.effective_timestamp, past);
    }

    /// Minimal TIFF container carrying the given ASCII date tags.
    fn write_tiff_with_dates(path: &Path, tags: &[(Tag, &str)]) {
        use exif::experimental::Writer;
        use exif::{Field, Value};
        use std::io::Cursor;

        let fields: Vec<Field> = tags
            .iter()
            .map(|(tag, value)| Field {
                tag: *tag,
                ifd_num: In::PRIMARY,
                value: Value::Ascii(vec![value.as_bytes().to_vec()]),
            })
            .collect();
        let mut writer = Writer::new();
        for field in &fields {
            writer.push_field(field);
        }
        let mut buf = Cursor::new(Vec::new());
        writer.write(&mut buf, true).unwrap();
        fs::write(path, buf.into_inner()).unwrap();
    }

    #[test]
    fn exif_capture_date_wins_over_filesystem_times() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shot.tif");
        write_tiff_with_dates(
            &path,
            &[
                (Tag::DateTime, "2021:11:30 18:00:00"),
                (Tag::DateTimeOriginal, "2012:06:30 14:15:16"),
            ],
        );
        // Filesystem times both earlier and later than the capture date.
        let earlier = Local.with_ymd_and_hms(2005, 1, 1, 0, 0, 0).single().unwrap();
        set_times(&path, SystemTime::from(earlier));

        let fp = Fingerprinter::new(ExtensionAllowList::default(), 0, TimestampSource::Exif);
        let (_, record) = fp.fingerprint(&path).unwrap().unwrap();
        let taken = Local.with_ymd_and_hms(2012, 6, 30, 14, 15, 16).single().unwrap();
        assert_eq!(record.effective_timestamp, taken);

        // The filesystem source ignores the tags entirely.
        let fp = Fingerprinter::new(ExtensionAllowList::default(), 0, TimestampSource::Filesystem);
        let (_, record) = fp.fingerprint(&path).unwrap().unwrap();
        assert_eq!(record.effective_timestamp, earlier);
    }

    #[test]
    fn exif_date_time_is_used_without_original() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("edited.tif");
        write_tiff_with_dates(&path, &[(Tag::DateTime, "2018:02:03 04:05:06")]);
        let later = Local.with_ymd_and_hms(2024, 9, 9, 9, 9, 9).single().unwrap();
        set_times(&path, SystemTime::from(later));

        let fp = Fingerprinter::new(ExtensionAllowList::default(), 0, TimestampSource::Exif);
        let (_, record) = fp.fingerprint(&path).unwrap().unwrap();
        let edited = Local.with_ymd_and_hms(2018, 2, 3, 4, 5, 6).single().unwrap();
        assert_eq!(record.effective_timestamp, edited);
    }

    #[test]
    fn disallowed_extension_and_small_files_are_filtered() {
        let dir = tempdir().unwrap();
        let txt = dir.path().join("notes.txt");
        let tiny = dir.path().join("tiny.jpg");
        fs::write(&txt, b"hello").unwrap();
        fs::write(&tiny, b"x").unwrap();

        let fp = Fingerprinter::new(ExtensionAllowList::default(), 2, TimestampSource::Filesystem);
        assert!(fp.fingerprint(&txt).unwrap().is_none());
        assert!(fp.fingerprint(&tiny).unwrap().is_none());
    }

    #[test]
    fn vanished_file_is_stat_failure() {
        let dir = tempdir().unwrap();
        let fp = Fingerprinter::new(ExtensionAllowList::default(), 0, TimestampSource::Filesystem);
        let err = fp.fingerprint(&dir.path().join("gone.jpg")).unwrap_err();
        assert!(matches!(err, FingerprintError::StatFailed { .. }));
    }

    #[test]
    fn unopenable_file_is_unreadable() {
        let dir = tempdir().unwrap();
        let err = hash_file(&dir.path().join("gone.jpg")).unwrap_err();
        assert!(matches!(err, FingerprintError::Unreadable { .. }));
    }
}
