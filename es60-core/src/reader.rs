//! File sessions
//!
//! A [`TelegramFile`] owns one open `.raw` file. It detects the byte order on
//! open, tracks the offset of every telegram it reads, and can optionally
//! build a [`FileIndex`] during one sequential pass.

use crate::codec::{detect_byte_order, read_telegram_at, ByteOrder};
use crate::config::ConfigDatagram;
use crate::error::TelegramError;
use crate::index::{FileIndex, IndexBuilder};
use crate::telegram::Telegram;
use crate::timestamp::Timestamp;
use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

#[cfg(feature = "logging")]
use tracing::{debug, warn};

/// An open recording
#[derive(Debug)]
pub struct TelegramFile {
    path: PathBuf,
    reader: BufReader<File>,
    order: ByteOrder,
    position: u64,
    len: u64,
    config: Option<ConfigDatagram>,
    start: Option<Timestamp>,
    indexer: Option<IndexBuilder>,
    index: Option<FileIndex>,
}

impl TelegramFile {
    /// Open a file for sequential reading
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TelegramError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let len = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        let order = detect_byte_order(&mut reader)?;

        #[cfg(feature = "logging")]
        debug!("Opened {} ({} bytes, {})", path.display(), len, order.name());

        Ok(Self {
            path,
            reader,
            order,
            position: 0,
            len,
            config: None,
            start: None,
            indexer: None,
            index: None,
        })
    }

    /// Open a file and build its index while it is read
    ///
    /// The first telegram must be CON0; its transducer count sizes the
    /// index. The session is rewound so the next [`read`](Self::read)
    /// returns the CON0 telegram again.
    pub fn open_indexed(path: impl AsRef<Path>) -> Result<Self, TelegramError> {
        let mut file = Self::open(path)?;
        let first = file.read()?;
        let channels = first
            .as_config()
            .ok_or_else(|| {
                TelegramError::Decode(format!(
                    "{} does not start with CON0, cannot build an index",
                    file.path.display()
                ))
            })?
            .transducer_count()?;

        file.indexer = Some(IndexBuilder::new(usize::try_from(channels).unwrap_or(0)));
        file.rewind()?;
        Ok(file)
    }

    /// Read the next telegram
    ///
    /// Returns [`TelegramError::EndOfStream`] at the end of the file, at which
    /// point an index being built is sealed.
    pub fn read(&mut self) -> Result<Telegram, TelegramError> {
        let offset = self.position;
        match read_telegram_at(&mut self.reader, self.order, Some(offset)) {
            Ok(telegram) => {
                self.position += telegram.encoded_len() as u64;
                if self.start.is_none() {
                    self.start = Some(telegram.time());
                }
                if self.config.is_none() {
                    self.config = telegram.as_config().cloned();
                }
                if let Some(indexer) = self.indexer.as_mut() {
                    indexer.record(&telegram);
                }
                Ok(telegram)
            }
            Err(e) => {
                if e.is_end_of_stream() {
                    if let Some(indexer) = self.indexer.take() {
                        self.index = Some(indexer.seal());
                    }
                }
                Err(e)
            }
        }
    }

    /// Read the telegram at `offset` without moving the sequential cursor
    pub fn read_at(&mut self, offset: u64) -> Result<Telegram, TelegramError> {
        self.reader.seek(SeekFrom::Start(offset))?;
        let result = read_telegram_at(&mut self.reader, self.order, Some(offset));
        self.reader.seek(SeekFrom::Start(self.position))?;
        result
    }

    /// Iterate over the remaining telegrams
    pub fn telegrams(&mut self) -> Telegrams<'_> {
        Telegrams {
            file: self,
            done: false,
        }
    }

    /// Go back to the start of the file
    pub fn rewind(&mut self) -> Result<(), TelegramError> {
        self.reader.seek(SeekFrom::Start(0))?;
        self.position = 0;
        Ok(())
    }

    /// Timestamp of the first telegram
    pub fn start_time(&mut self) -> Result<Timestamp, TelegramError> {
        if let Some(start) = self.start {
            return Ok(start);
        }
        let start = self.read_at(0)?.time();
        self.start = Some(start);
        Ok(start)
    }

    /// Timestamp of the last positioned NMEA telegram, else of the latest
    /// RAW0 telegram
    ///
    /// Needs a sealed index; `None` before the indexed pass completes or
    /// when the file has neither.
    pub fn end_time(&mut self) -> Result<Option<Timestamp>, TelegramError> {
        let Some(index) = self.index.as_ref() else {
            return Ok(None);
        };
        let last = match index.positions().last() {
            Some(&offset) => Some(offset),
            None => {
                #[cfg(feature = "logging")]
                warn!("{} has no GPS data", self.path.display());
                index.last_ping()
            }
        };
        match last {
            Some(offset) => Ok(Some(self.read_at(offset)?.time())),
            None => Ok(None),
        }
    }

    /// Path the file was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Detected byte order
    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    /// File length in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    /// True for an empty file
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Offset of the next sequential read
    pub fn position(&self) -> u64 {
        self.position
    }

    /// First CON0 datagram read so far
    pub fn config(&self) -> Option<&ConfigDatagram> {
        self.config.as_ref()
    }

    /// Sealed index, once an indexed pass has reached the end
    pub fn index(&self) -> Option<&FileIndex> {
        self.index.as_ref()
    }
}

/// Iterator over the telegrams of a file
///
/// Ends at the end of the file. A truncated final telegram is logged and
/// also ends the iteration; any other error is yielded once.
pub struct Telegrams<'a> {
    file: &'a mut TelegramFile,
    done: bool,
}

impl Iterator for Telegrams<'_> {
    type Item = Result<Telegram, TelegramError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.file.read() {
            Ok(telegram) => Some(Ok(telegram)),
            Err(TelegramError::EndOfStream { partial }) => {
                self.done = true;
                if partial > 0 {
                    #[cfg(feature = "logging")]
                    warn!(
                        "{}: ignoring {} bytes of a truncated telegram",
                        self.file.path.display(),
                        partial
                    );
                }
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{nmea_telegram, ConfigBuilder, RawPingBuilder, TransducerBuilder};
    use crate::codec::encode_telegram;
    use crate::telegram::TelegramKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BASE: i64 = 128_000_000_000_000_000;

    fn stamp(seconds: i64) -> Timestamp {
        Timestamp::from_ticks(BASE + seconds * 10_000_000).unwrap()
    }

    fn write_file(order: ByteOrder, telegrams: &[Telegram]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for t in telegrams {
            file.write_all(&encode_telegram(t, order)).unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn sample(order: ByteOrder) -> Vec<Telegram> {
        vec![
            ConfigBuilder::new("survey", "t1", "ES60")
                .time(stamp(0))
                .transducer(TransducerBuilder::new("38"))
                .build(order),
            nmea_telegram(stamp(1), "$GPGLL,4250.0000,S,14718.0000,E"),
            RawPingBuilder::new(1)
                .time(stamp(2))
                .power(vec![1, 2, 3])
                .build(order)
                .unwrap(),
            nmea_telegram(stamp(3), "$GPGLL,4251.0000,S,14718.0000,E"),
            RawPingBuilder::new(1)
                .time(stamp(4))
                .power(vec![4, 5, 6])
                .build(order)
                .unwrap(),
        ]
    }

    #[test]
    fn test_sequential_read_with_offsets() {
        for order in [ByteOrder::BigEndian, ByteOrder::LittleEndian] {
            let telegrams = sample(order);
            let tmp = write_file(order, &telegrams);

            let mut file = TelegramFile::open(tmp.path()).unwrap();
            assert_eq!(file.byte_order(), order);

            let read: Vec<Telegram> = file.telegrams().collect::<Result<_, _>>().unwrap();
            assert_eq!(read.len(), 5);
            assert_eq!(read[0].offset, Some(0));
            assert_eq!(read[1].offset, Some(telegrams[0].encoded_len() as u64));
            assert_eq!(file.position(), file.len());
            assert!(file.config().is_some());
            assert!(file.index().is_none());
        }
    }

    #[test]
    fn test_indexed_pass_and_times() {
        let tmp = write_file(ByteOrder::LittleEndian, &sample(ByteOrder::LittleEndian));
        let mut file = TelegramFile::open_indexed(tmp.path()).unwrap();
        assert_eq!(file.position(), 0);

        let first = file.read().unwrap();
        assert_eq!(first.kind(), TelegramKind::Config);
        assert!(file.index().is_none());
        while file.read().is_ok() {}

        let index = file.index().unwrap().clone();
        assert_eq!(index.positions().len(), 2);
        assert_eq!(index.channel(1).len(), 2);

        assert_eq!(file.start_time().unwrap(), stamp(0));
        assert_eq!(file.end_time().unwrap(), Some(stamp(3)));

        let ping = file.read_at(index.channel(1)[1]).unwrap();
        assert_eq!(ping.as_raw().unwrap().sum(0, 2).unwrap(), Some(15));
    }

    #[test]
    fn test_open_indexed_requires_config() {
        let order = ByteOrder::BigEndian;
        let tmp = write_file(order, &sample(order)[1..]);
        assert!(matches!(
            TelegramFile::open_indexed(tmp.path()),
            Err(TelegramError::Decode(_))
        ));
    }

    #[test]
    fn test_open_indexed_rejects_oversized_transducer_count() {
        let order = ByteOrder::BigEndian;
        let mut bytes: Vec<u8> = sample(order)
            .iter()
            .flat_map(|t| encode_telegram(t, order).to_vec())
            .collect();
        // Transducer count of the leading CON0 payload
        bytes[528..532].copy_from_slice(&i32::MAX.to_be_bytes());
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(&bytes).unwrap();

        assert!(matches!(
            TelegramFile::open_indexed(tmp.path()),
            Err(TelegramError::Decode(_))
        ));
        // Sequential reading is unaffected
        let mut file = TelegramFile::open(tmp.path()).unwrap();
        assert_eq!(file.telegrams().count(), 5);
    }

    #[test]
    fn test_truncated_tail_ends_iteration() {
        let order = ByteOrder::BigEndian;
        let telegrams = sample(order);
        let mut bytes: Vec<u8> = telegrams
            .iter()
            .flat_map(|t| encode_telegram(t, order).to_vec())
            .collect();
        bytes.truncate(bytes.len() - 5);
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(&bytes).unwrap();

        let mut file = TelegramFile::open(tmp.path()).unwrap();
        let read: Vec<_> = file.telegrams().collect();
        assert_eq!(read.len(), 4);
        assert!(read.iter().all(|r| r.is_ok()));
    }

    #[test]
    fn test_read_at_keeps_cursor() {
        let order = ByteOrder::BigEndian;
        let tmp = write_file(order, &sample(order));
        let mut file = TelegramFile::open(tmp.path()).unwrap();
        file.read().unwrap();
        let second_offset = file.position();

        let config = file.read_at(0).unwrap();
        assert_eq!(config.kind(), TelegramKind::Config);
        let second = file.read().unwrap();
        assert_eq!(second.offset, Some(second_offset));
        assert_eq!(second.kind(), TelegramKind::Nmea);
    }

    #[test]
    fn test_empty_file_is_error() {
        let tmp = NamedTempFile::new().unwrap();
        assert!(TelegramFile::open(tmp.path()).is_err());
    }
}
