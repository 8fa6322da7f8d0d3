use crate::adb::protocol::sync;
use crate::adb::session::Session;
use crate::adb::stream::AdbStream;
use crate::error::{AdbError, Result};
use crate::progress::ProgressReporter;
use bytes::{BufMut, BytesMut};
use log::*;
use std::fmt;
use std::path::Path;
use std::time::UNIX_EPOCH;
use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const SYNC_HEADER_LENGTH: usize = 8;

// File type bits of st_mode
const S_IFMT: u32 = 0o170000;
const S_IFSOCK: u32 = 0o140000;
const S_IFLNK: u32 = 0o120000;
const S_IFREG: u32 = 0o100000;
const S_IFBLK: u32 = 0o060000;
const S_IFDIR: u32 = 0o040000;
const S_IFCHR: u32 = 0o020000;
const S_IFIFO: u32 = 0o010000;

/// Mode used for pushed files when the local one is unknown
pub const DEFAULT_PUSH_MODE: u32 = 0o644;

/// Reply to a STAT request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncStat {
    pub mode: u32,
    pub size: u32,
    pub mtime: u32,
}

impl SyncStat {
    /// The device answers STAT for a missing path with all zeros
    pub fn exists(&self) -> bool {
        self.mode != 0 || self.size != 0 || self.mtime != 0
    }

    pub fn is_file(&self) -> bool {
        self.mode & S_IFMT == S_IFREG
    }

    pub fn is_directory(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    pub fn is_symlink(&self) -> bool {
        self.mode & S_IFMT == S_IFLNK
    }

    pub fn file_type(&self) -> &'static str {
        match self.mode & S_IFMT {
            S_IFIFO => "Named pipe (fifo)",
            S_IFCHR => "Character device",
            S_IFDIR => "Directory",
            S_IFBLK => "Block device",
            S_IFREG => "Regular file",
            S_IFLNK => "Symbolic link",
            S_IFSOCK => "Socket",
            _ => "Unknown",
        }
    }

    /// `ls -l` style mode string, e.g. `drwxr-xr-x`
    pub fn permissions_string(&self) -> String {
        let file_type = match self.mode & S_IFMT {
            S_IFIFO => 'p',
            S_IFCHR => 'c',
            S_IFDIR => 'd',
            S_IFBLK => 'b',
            S_IFREG => '-',
            S_IFLNK => 'l',
            S_IFSOCK => 's',
            _ => '?',
        };

        let mut out = String::with_capacity(10);
        out.push(file_type);
        out.push_str(&permission_triplet(self.mode >> 6, self.mode & 0o4000 != 0, 's'));
        out.push_str(&permission_triplet(self.mode >> 3, self.mode & 0o2000 != 0, 's'));
        out.push_str(&permission_triplet(self.mode, self.mode & 0o1000 != 0, 't'));
        out
    }
}

fn permission_triplet(bits: u32, special: bool, special_char: char) -> String {
    let mut triplet = String::with_capacity(3);
    triplet.push(if bits & 4 != 0 { 'r' } else { '-' });
    triplet.push(if bits & 2 != 0 { 'w' } else { '-' });
    triplet.push(match (bits & 1 != 0, special) {
        (false, false) => '-',
        (true, false) => 'x',
        (false, true) => special_char.to_ascii_uppercase(),
        (true, true) => special_char,
    });
    triplet
}

/// One LIST entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub stat: SyncStat,
}

impl fmt::Display for DirEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:>10} {:>10} {}",
            self.stat.permissions_string(),
            self.stat.size,
            self.stat.mtime,
            self.name
        )
    }
}

/// File transfer over a `sync:` stream.
///
/// Requests are strictly sequential: each call finishes reading its reply
/// before returning, so one session must not be shared by concurrent calls.
pub struct SyncSession {
    stream: AdbStream,
}

impl Session for SyncSession {
    fn from_stream(stream: AdbStream) -> Self {
        Self { stream }
    }

    fn stream(&self) -> &AdbStream {
        &self.stream
    }
}

impl SyncSession {
    /// Largest DATA payload, keeping header plus payload within one WRTE
    pub fn data_chunk_size(&self) -> usize {
        self.stream
            .max_data()
            .min(sync::MAX_DATA)
            .saturating_sub(SYNC_HEADER_LENGTH)
            .max(1)
    }

    /// Upload everything `reader` yields to `remote_path`.
    /// Returns the number of bytes sent.
    pub async fn push<R>(
        &self,
        reader: &mut R,
        remote_path: &str,
        mode: u32,
        mtime: u32,
        progress: &dyn ProgressReporter,
    ) -> Result<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        info!("Pushing to {} (mode {:o})", remote_path, mode);
        let target = format!("{},{}", remote_path, mode);
        self.send_request(sync::SEND, target.as_bytes()).await?;

        let mut buf = vec![0u8; self.data_chunk_size()];
        let mut sent = 0u64;
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            self.send_request(sync::DATA, &buf[..n]).await?;
            sent += n as u64;
            progress.update(sent);
        }

        self.send_header(sync::DONE, mtime).await?;
        self.read_status(remote_path).await?;
        progress.finish();

        info!("Pushed {} bytes to {}", sent, remote_path);
        Ok(sent)
    }

    /// Push a local file, keeping its permission bits and mtime
    pub async fn push_file(
        &self,
        local_path: &Path,
        remote_path: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<u64> {
        let metadata = fs::metadata(local_path).await.map_err(|e| {
            AdbError::FileTransfer(format!("Cannot read {}: {}", local_path.display(), e))
        })?;
        if !metadata.is_file() {
            return Err(AdbError::FileTransfer(format!(
                "{} is not a regular file",
                local_path.display()
            )));
        }

        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);

        progress.start(metadata.len());
        let mut file = File::open(local_path).await?;
        self.push(&mut file, remote_path, file_mode(&metadata), mtime, progress)
            .await
    }

    /// Download `remote_path` into `writer`. Returns the number of bytes received.
    pub async fn pull<W>(
        &self,
        remote_path: &str,
        writer: &mut W,
        progress: &dyn ProgressReporter,
    ) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        info!("Pulling {}", remote_path);
        self.send_request(sync::RECV, remote_path.as_bytes()).await?;

        let mut received = 0u64;
        loop {
            let (id, length) = self.read_header().await?;
            match &id {
                id if id == sync::DATA => {
                    let data = self.read_payload(length).await?;
                    writer.write_all(&data).await?;
                    received += data.len() as u64;
                    progress.update(received);
                }
                id if id == sync::DONE => break,
                id if id == sync::FAIL => {
                    let message = self.read_message(length).await?;
                    return Err(AdbError::FileTransfer(format!(
                        "Pull of {} failed: {}",
                        remote_path, message
                    )));
                }
                other => return Err(unexpected_reply(other)),
            }
        }

        writer.flush().await?;
        progress.finish();
        info!("Pulled {} bytes from {}", received, remote_path);
        Ok(received)
    }

    /// Pull into a local file, creating or truncating it
    pub async fn pull_file(
        &self,
        remote_path: &str,
        local_path: &Path,
        progress: &dyn ProgressReporter,
    ) -> Result<u64> {
        let stat = self.stat(remote_path).await?;
        if !stat.exists() {
            return Err(AdbError::FileTransfer(format!(
                "{} does not exist",
                remote_path
            )));
        }
        if stat.is_directory() {
            return Err(AdbError::FileTransfer(format!(
                "{} is a directory",
                remote_path
            )));
        }
        progress.start(u64::from(stat.size));

        let mut file = File::create(local_path).await.map_err(|e| {
            AdbError::FileTransfer(format!("Cannot create {}: {}", local_path.display(), e))
        })?;
        let received = self.pull(remote_path, &mut file, progress).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(stat.mode & 0o777);
            fs::set_permissions(local_path, permissions).await?;
        }

        Ok(received)
    }

    pub async fn stat(&self, remote_path: &str) -> Result<SyncStat> {
        debug!("STAT {}", remote_path);
        self.send_request(sync::STAT, remote_path.as_bytes()).await?;

        let mut reply = [0u8; 16];
        self.stream.fill(&mut reply).await?;
        if &reply[0..4] != sync::STAT {
            return Err(unexpected_reply(&reply[0..4]));
        }

        Ok(SyncStat {
            mode: le_u32(&reply[4..8]),
            size: le_u32(&reply[8..12]),
            mtime: le_u32(&reply[12..16]),
        })
    }

    /// Directory listing, as sent by the device (including `.` and `..`)
    pub async fn list(&self, remote_path: &str) -> Result<Vec<DirEntry>> {
        debug!("LIST {}", remote_path);
        self.send_request(sync::LIST, remote_path.as_bytes()).await?;

        let mut entries = Vec::new();
        loop {
            let mut dent = [0u8; 20];
            self.stream.fill(&mut dent).await?;
            match &dent[0..4] {
                id if id == sync::DONE => break,
                id if id == sync::DENT => {}
                other => return Err(unexpected_reply(other)),
            }

            let stat = SyncStat {
                mode: le_u32(&dent[4..8]),
                size: le_u32(&dent[8..12]),
                mtime: le_u32(&dent[12..16]),
            };
            let name = self.read_message(le_u32(&dent[16..20])).await?;
            entries.push(DirEntry { name, stat });
        }

        Ok(entries)
    }

    /// End the sync service and close the stream
    pub async fn quit(&self) -> Result<()> {
        self.send_header(sync::QUIT, 0).await?;
        self.stream.close().await
    }

    async fn send_request(&self, id: &[u8; 4], payload: &[u8]) -> Result<()> {
        let mut request = BytesMut::with_capacity(SYNC_HEADER_LENGTH + payload.len());
        request.put_slice(id);
        request.put_u32_le(payload.len() as u32);
        request.put_slice(payload);
        self.stream.write(&request).await
    }

    async fn send_header(&self, id: &[u8; 4], value: u32) -> Result<()> {
        let mut header = BytesMut::with_capacity(SYNC_HEADER_LENGTH);
        header.put_slice(id);
        header.put_u32_le(value);
        self.stream.write(&header).await
    }

    async fn read_header(&self) -> Result<([u8; 4], u32)> {
        let mut header = [0u8; SYNC_HEADER_LENGTH];
        self.stream.fill(&mut header).await?;
        let id = [header[0], header[1], header[2], header[3]];
        Ok((id, le_u32(&header[4..8])))
    }

    async fn read_payload(&self, length: u32) -> Result<Vec<u8>> {
        let length = length as usize;
        if length > sync::MAX_DATA {
            return Err(AdbError::Protocol(format!(
                "sync payload of {} bytes exceeds {}",
                length,
                sync::MAX_DATA
            )));
        }
        let mut payload = vec![0u8; length];
        self.stream.fill(&mut payload).await?;
        Ok(payload)
    }

    async fn read_message(&self, length: u32) -> Result<String> {
        let payload = self.read_payload(length).await?;
        Ok(String::from_utf8_lossy(&payload).into_owned())
    }

    /// OKAY, or FAIL with a message
    async fn read_status(&self, remote_path: &str) -> Result<()> {
        let (id, length) = self.read_header().await?;
        match &id {
            id if id == sync::OKAY => Ok(()),
            id if id == sync::FAIL => {
                let message = self.read_message(length).await?;
                Err(AdbError::FileTransfer(format!(
                    "Push to {} failed: {}",
                    remote_path, message
                )))
            }
            other => Err(unexpected_reply(other)),
        }
    }
}

fn le_u32(bytes: &[u8]) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(word)
}

fn unexpected_reply(id: &[u8]) -> AdbError {
    AdbError::Protocol(format!(
        "unexpected sync reply {:?}",
        String::from_utf8_lossy(id)
    ))
}

#[cfg(unix)]
fn file_mode(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn file_mode(_metadata: &std::fs::Metadata) -> u32 {
    DEFAULT_PUSH_MODE
}
