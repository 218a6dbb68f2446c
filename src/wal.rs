use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::model::Event;

/// Largest payload replay will allocate for; anything bigger is treated as corruption.
const MAX_RECORD_LEN: usize = 16 * 1024 * 1024;

/// Encode a single event to [len][bincode][crc32] format.
fn encode_event(writer: &mut impl Write, event: &Event) -> io::Result<()> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = payload.len() as u32;
    let crc = crc32fast::hash(&payload);
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc.to_le_bytes())?;
    Ok(())
}

/// Append-only Write-Ahead Log.
///
/// Format per entry: `[u32: len][bincode: Event][u32: crc32]`
/// - `len` is the byte length of the bincode payload (not including the CRC).
/// - Truncated last entry (crash) is safely discarded via length-prefix + CRC check.
pub struct Wal {
    writer: BufWriter<File>,
    path: PathBuf,
    appends_since_compact: u64,
}

impl Wal {
    /// Open (or create) the WAL file at `path`.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            appends_since_compact: 0,
        })
    }

    /// Append a single event and fsync. Tests only; the engine batches through
    /// `append_buffered` + `flush_sync`.
    #[cfg(test)]
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        self.append_buffered(event)?;
        self.flush_sync()
    }

    /// Append a single event to the BufWriter without flushing or syncing.
    /// Call `flush_sync()` after the batch to durably commit all buffered events.
    pub fn append_buffered(&mut self, event: &Event) -> io::Result<()> {
        encode_event(&mut self.writer, event)?;
        self.appends_since_compact += 1;
        Ok(())
    }

    /// Flush the BufWriter and fsync the underlying file.
    pub fn flush_sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }

    /// Return the WAL file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write compacted events to a temp file and fsync.
    pub fn write_compact_file(path: &Path, events: &[Event]) -> io::Result<()> {
        let tmp_path = path.with_extension("wal.tmp");
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        for event in events {
            encode_event(&mut writer, event)?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Atomic swap: rename temp file over the WAL and reopen.
    pub fn swap_compact_file(&mut self) -> io::Result<()> {
        let tmp_path = self.path.with_extension("wal.tmp");
        fs::rename(&tmp_path, &self.path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.appends_since_compact = 0;
        Ok(())
    }

    /// Both compaction phases in one call. Tests only.
    #[cfg(test)]
    pub fn compact(&mut self, events: &[Event]) -> io::Result<()> {
        Self::write_compact_file(&self.path, events)?;
        self.swap_compact_file()
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    /// Replay the WAL from disk, returning all valid events.
    /// A torn or corrupt tail is discarded; corruption is logged.
    pub fn replay(path: &Path) -> io::Result<Vec<Event>> {
        Ok(replay_valid_prefix(path)?.0)
    }

    /// Replay, then cut any discarded tail off the file so later appends follow
    /// the last valid record instead of the garbage.
    pub fn recover(path: &Path) -> io::Result<Vec<Event>> {
        let (events, valid_len) = replay_valid_prefix(path)?;
        if let Ok(meta) = fs::metadata(path) {
            if meta.len() > valid_len {
                tracing::warn!(
                    "WAL {}: truncating {} trailing bytes",
                    path.display(),
                    meta.len() - valid_len
                );
                let file = OpenOptions::new().write(true).open(path)?;
                file.set_len(valid_len)?;
                file.sync_all()?;
            }
        }
        Ok(events)
    }
}

/// Decode frames until the first torn or corrupt one. Returns the events and
/// the byte length of the valid prefix.
fn replay_valid_prefix(path: &Path) -> io::Result<(Vec<Event>, u64)> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((Vec::new(), 0)),
        Err(e) => return Err(e),
    };
    let mut reader = BufReader::new(file);
    let mut events = Vec::new();
    let mut valid_len = 0u64;

    while let Some(frame) = read_frame(&mut reader)? {
        match frame {
            Frame::Valid(payload) => match bincode::deserialize::<Event>(&payload) {
                Ok(event) => {
                    valid_len += (payload.len() + 8) as u64;
                    events.push(event);
                }
                Err(e) => {
                    tracing::warn!("WAL {}: undecodable record after {} events ({e}), discarding tail", path.display(), events.len());
                    break;
                }
            },
            Frame::Corrupt(reason) => {
                tracing::warn!("WAL {}: {reason} after {} events, discarding tail", path.display(), events.len());
                break;
            }
        }
    }

    Ok((events, valid_len))
}

enum Frame {
    Valid(Vec<u8>),
    Corrupt(&'static str),
}

/// Fill `buf` completely. `Ok(false)` on a clean or partial EOF (a torn write).
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Read one `[len][payload][crc]` frame. `None` at end of log, including a torn last frame.
fn read_frame(reader: &mut impl Read) -> io::Result<Option<Frame>> {
    let mut len_buf = [0u8; 4];
    if !read_full(reader, &mut len_buf)? {
        return Ok(None);
    }
    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_RECORD_LEN {
        return Ok(Some(Frame::Corrupt("implausible record length")));
    }

    let mut payload = vec![0u8; len];
    let mut crc_buf = [0u8; 4];
    if !read_full(reader, &mut payload)? || !read_full(reader, &mut crc_buf)? {
        return Ok(None);
    }

    if u32::from_le_bytes(crc_buf) != crc32fast::hash(&payload) {
        return Ok(Some(Frame::Corrupt("CRC mismatch")));
    }
    Ok(Some(Frame::Valid(payload)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ulid::Ulid;

    use crate::model::SlotTime;

    fn tmp_path(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join("covers_test_wal");
        fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    fn t(hour: u32, minute: u32) -> SlotTime {
        SlotTime::from_hm(hour, minute).unwrap()
    }

    fn slots(max_party_size: u32) -> Event {
        Event::SlotsDefined {
            times: vec![t(12, 0), t(12, 15)],
            max_party_size,
            max_reservations: 3,
        }
    }

    fn admitted(email: &str) -> Event {
        Event::ReservationAdmitted {
            id: Ulid::new(),
            name: "Guest".into(),
            email: email.into(),
            party_size: 2,
            date: NaiveDate::from_ymd_opt(2024, 10, 30).unwrap(),
            time: t(12, 0),
        }
    }

    #[test]
    fn append_and_replay() {
        let path = tmp_path("append_and_replay.wal");
        let _ = fs::remove_file(&path);

        let events = vec![slots(8), admitted("a@example.com")];
        {
            let mut wal = Wal::open(&path).unwrap();
            for e in &events {
                wal.append(e).unwrap();
            }
        }

        let replayed = Wal::replay(&path).unwrap();
        assert_eq!(replayed, events);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn replay_handles_truncation() {
        let path = tmp_path("truncation.wal");
        let _ = fs::remove_file(&path);

        let event = slots(8);
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&event).unwrap();
        }

        // Simulate a crash mid-write of the second entry
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[0u8; 6]).unwrap();
        }

        let replayed = Wal::replay(&path).unwrap();
        assert_eq!(replayed, vec![event]);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn recover_truncates_torn_tail_so_appends_survive() {
        let path = tmp_path("recover.wal");
        let _ = fs::remove_file(&path);

        let first = slots(8);
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&first).unwrap();
        }
        let valid_len = fs::metadata(&path).unwrap().len();
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[7u8; 5]).unwrap();
        }

        assert_eq!(Wal::recover(&path).unwrap(), vec![first.clone()]);
        assert_eq!(fs::metadata(&path).unwrap().len(), valid_len);

        let second = admitted("a@example.com");
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&second).unwrap();
        }
        assert_eq!(Wal::replay(&path).unwrap(), vec![first, second]);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn replay_nonexistent_file() {
        let path = tmp_path("nonexistent.wal");
        let _ = fs::remove_file(&path);
        assert!(Wal::replay(&path).unwrap().is_empty());
    }

    #[test]
    fn replay_corrupt_crc() {
        let path = tmp_path("corrupt_crc.wal");
        let _ = fs::remove_file(&path);

        {
            let payload = bincode::serialize(&admitted("a@example.com")).unwrap();
            let len = payload.len() as u32;
            let bad_crc: u32 = 0xDEADBEEF;

            let mut f = File::create(&path).unwrap();
            f.write_all(&len.to_le_bytes()).unwrap();
            f.write_all(&payload).unwrap();
            f.write_all(&bad_crc.to_le_bytes()).unwrap();
        }

        assert!(Wal::replay(&path).unwrap().is_empty());

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn replay_rejects_implausible_length() {
        let path = tmp_path("huge_len.wal");
        let _ = fs::remove_file(&path);

        let event = slots(4);
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&event).unwrap();
        }
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&u32::MAX.to_le_bytes()).unwrap();
            f.write_all(&[1u8; 32]).unwrap();
        }

        assert_eq!(Wal::replay(&path).unwrap(), vec![event]);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn compact_reduces_wal() {
        let path = tmp_path("compact_reduce.wal");
        let _ = fs::remove_file(&path);

        // Repeated redefinitions of the same slots
        {
            let mut wal = Wal::open(&path).unwrap();
            for size in 1..=20 {
                wal.append(&slots(size)).unwrap();
            }
        }
        let before = fs::metadata(&path).unwrap().len();

        let compacted = vec![slots(20)];
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.compact(&compacted).unwrap();
            assert_eq!(wal.appends_since_compact(), 0);
        }

        let after = fs::metadata(&path).unwrap().len();
        assert!(after < before, "compacted WAL should be smaller: {after} < {before}");
        assert_eq!(Wal::replay(&path).unwrap(), compacted);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn compact_then_append() {
        let path = tmp_path("compact_append.wal");
        let _ = fs::remove_file(&path);

        let compacted = vec![slots(8)];
        let new_event = admitted("b@example.com");
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&compacted[0]).unwrap();
            wal.compact(&compacted).unwrap();
            wal.append(&new_event).unwrap();
        }

        let replayed = Wal::replay(&path).unwrap();
        assert_eq!(replayed, vec![compacted[0].clone(), new_event]);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn append_buffered_then_flush_sync() {
        let path = tmp_path("buffered_flush.wal");
        let _ = fs::remove_file(&path);

        let events: Vec<Event> = (0..5).map(|i| admitted(&format!("g{i}@example.com"))).collect();
        {
            let mut wal = Wal::open(&path).unwrap();
            for e in &events {
                wal.append_buffered(e).unwrap();
            }
            assert_eq!(wal.appends_since_compact(), 5);
            wal.flush_sync().unwrap();
        }

        assert_eq!(Wal::replay(&path).unwrap(), events);

        let _ = fs::remove_file(&path);
    }
}
