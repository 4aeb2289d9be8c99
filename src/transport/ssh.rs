use crate::profile::ConnectionProfile;
use crate::transport::{Connector, RemoteSession};
use crate::{PoUploadError, Result};
use ssh2::{ErrorCode, Session, Sftp};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// SFTP status codes that mean "nothing there".
const SFTP_NO_SUCH_FILE: i32 = 2;
const SFTP_NO_SUCH_PATH: i32 = 10;

/// Opens password-authenticated SFTP sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct SftpConnector;

impl Connector for SftpConnector {
    type Session = SftpSession;

    fn open(&self, profile: &ConnectionProfile) -> Result<SftpSession> {
        SftpSession::connect(profile)
    }
}

pub struct SftpSession {
    session: Session,
    sftp: Option<Sftp>,
    _tcp: TcpStream,
}

impl SftpSession {
    pub fn connect(profile: &ConnectionProfile) -> Result<Self> {
        let timeout = (profile.timeout_secs > 0).then(|| Duration::from_secs(profile.timeout_secs));
        let tcp = connect_tcp(&profile.host, profile.port, timeout)?;

        let mut session = Session::new()
            .map_err(|e| PoUploadError::SshConnection(e.to_string()))?;
        if let Some(t) = timeout {
            session.set_timeout(t.as_millis().min(u32::MAX as u128) as u32);
        }

        session.set_tcp_stream(tcp.try_clone()?);
        session.handshake()
            .map_err(|e| PoUploadError::SshConnection(format!("Handshake failed: {}", e)))?;

        session.userauth_password(&profile.username, profile.password.expose())
            .map_err(|e| PoUploadError::Authentication(format!("Password auth failed for {}: {}", profile.username, e)))?;

        if !session.authenticated() {
            return Err(PoUploadError::Authentication(format!("Server rejected credentials for {}", profile.username)));
        }

        let sftp = session.sftp()
            .map_err(|e| PoUploadError::SshConnection(format!("SFTP init failed: {}", e)))?;

        debug!("SFTP session open to {}:{}", profile.host, profile.port);
        Ok(Self { session, sftp: Some(sftp), _tcp: tcp })
    }

    fn sftp(&self) -> Result<&Sftp> {
        self.sftp.as_ref()
            .ok_or_else(|| PoUploadError::Transfer("Session already closed".into()))
    }
}

fn connect_tcp(host: &str, port: u16, timeout: Option<Duration>) -> Result<TcpStream> {
    let fail = |e: std::io::Error| PoUploadError::SshConnection(format!("Failed to connect to {}:{}: {}", host, port, e));

    let Some(timeout) = timeout else {
        return TcpStream::connect((host, port)).map_err(fail);
    };

    let mut last_err = None;
    for addr in (host, port).to_socket_addrs().map_err(fail)? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }
    Err(fail(last_err.unwrap_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "host resolved to no addresses")
    })))
}

fn is_absent(err: &ssh2::Error) -> bool {
    matches!(err.code(), ErrorCode::SFTP(SFTP_NO_SUCH_FILE) | ErrorCode::SFTP(SFTP_NO_SUCH_PATH))
}

impl RemoteSession for SftpSession {
    fn exists(&self, remote: &str) -> Result<bool> {
        match self.sftp()?.stat(Path::new(remote)) {
            Ok(_) => Ok(true),
            Err(e) if is_absent(&e) => Ok(false),
            Err(e) => Err(PoUploadError::Transfer(format!("Remote stat failed for {}: {}", remote, e))),
        }
    }

    fn write(&self, local: &Path, remote: &str) -> Result<()> {
        let mut local_file = std::fs::File::open(local).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PoUploadError::FileNotFound(local.to_path_buf()),
            _ => PoUploadError::Io(e),
        })?;

        let mut remote_file = self.sftp()?.create(Path::new(remote))
            .map_err(|e| PoUploadError::Transfer(format!("Remote file create failed {}: {}", remote, e)))?;

        std::io::copy(&mut local_file, &mut remote_file)
            .map_err(|e| PoUploadError::Transfer(format!("Write to {} failed: {}", remote, e)))?;
        Ok(())
    }

    fn remove(&self, remote: &str) -> Result<()> {
        self.sftp()?.unlink(Path::new(remote))
            .map_err(|e| PoUploadError::Transfer(format!("Remote remove failed for {}: {}", remote, e)))
    }

    fn list_dir(&self, remote: &str) -> Result<Vec<String>> {
        let items = self.sftp()?.readdir(Path::new(remote))
            .map_err(|e| PoUploadError::Transfer(format!("SFTP readdir failed for {}: {}", remote, e)))?;

        Ok(items
            .into_iter()
            .filter_map(|(pb, _)| pb.file_name().and_then(|n| n.to_str()).map(str::to_string))
            .filter(|name| name != "." && name != "..")
            .collect())
    }

    fn close(&mut self) -> Result<()> {
        let Some(sftp) = self.sftp.take() else {
            return Ok(());
        };
        drop(sftp);
        self.session.disconnect(None, "upload session complete", None)
            .map_err(|e| PoUploadError::SshConnection(format!("Disconnect failed: {}", e)))
    }
}
