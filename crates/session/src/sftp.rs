//! SFTP implementation of [`Endpoint`] over libssh2.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};

use ssh2::{RenameFlags, Session, Sftp};

use crate::{Endpoint, EndpointError, SessionError, SessionFactory};

impl From<ssh2::Error> for EndpointError {
    fn from(err: ssh2::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}

/// A connected SFTP session.
///
/// One `SftpEndpoint` wraps one SSH session plus its SFTP channel; the
/// session provider pools these per schema. All operations are blocking,
/// which is why the scheduler runs pipeline ticks on blocking workers.
pub struct SftpEndpoint {
    // Held so the transport outlives the SFTP channel.
    _session: Session,
    sftp: Sftp,
}

impl SftpEndpoint {
    /// Connects and authenticates using the given profile.
    pub fn connect(conn: &rules::Connection) -> Result<Self, EndpointError> {
        let stream = TcpStream::connect((conn.host.as_str(), conn.port))?;
        let mut session = Session::new()?;
        session.set_tcp_stream(stream);
        session.handshake()?;
        if let Some(timeout) = conn.io_timeout_ms {
            session.set_timeout(timeout as u32);
        }

        if let Some(key) = &conn.private_key {
            session.userauth_pubkey_file(
                &conn.user,
                None,
                key,
                conn.private_key_passphrase.as_deref(),
            )?;
        } else if let Some(password) = &conn.password {
            session.userauth_password(&conn.user, password)?;
        }
        if !session.authenticated() {
            return Err(EndpointError::Protocol(format!(
                "authentication failed for user '{}'",
                conn.user
            )));
        }

        let sftp = session.sftp()?;
        Ok(Self {
            _session: session,
            sftp,
        })
    }
}

impl Endpoint for SftpEndpoint {
    fn list(&self, dir: &str) -> Result<Vec<String>, EndpointError> {
        let entries = self.sftp.readdir(Path::new(dir))?;
        let mut names = Vec::with_capacity(entries.len());
        for (path, stat) in entries {
            if stat.is_file() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    names.push(name.to_owned());
                }
            }
        }
        Ok(names)
    }

    fn rename(&self, src: &str, dst: &str) -> Result<(), EndpointError> {
        self.sftp.rename(
            Path::new(src),
            Path::new(dst),
            Some(RenameFlags::OVERWRITE | RenameFlags::ATOMIC | RenameFlags::NATIVE),
        )?;
        Ok(())
    }

    fn open_read(&self, path: &str) -> Result<Box<dyn Read + Send>, EndpointError> {
        let file = self.sftp.open(Path::new(path))?;
        Ok(Box::new(file))
    }

    fn open_write(&self, path: &str) -> Result<Box<dyn Write + Send>, EndpointError> {
        let file = self.sftp.create(Path::new(path))?;
        Ok(Box::new(file))
    }

    fn exists(&self, path: &str) -> Result<bool, EndpointError> {
        match self.sftp.stat(Path::new(path)) {
            Ok(_) => Ok(true),
            // 2 is SSH_FX_NO_SUCH_FILE. Anything else is a real failure
            // and must not read as "absent".
            Err(err) if err.code() == ssh2::ErrorCode::SFTP(2) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn mkdirs(&self, dir: &str) -> Result<(), EndpointError> {
        let mut current = PathBuf::new();
        for component in Path::new(dir).components() {
            current.push(component);
            if self.sftp.stat(&current).is_err() {
                // A losing race against another creator is fine; only fail
                // when the directory still does not exist afterwards.
                if self.sftp.mkdir(&current, 0o755).is_err() && self.sftp.stat(&current).is_err() {
                    return Err(EndpointError::Protocol(format!(
                        "cannot create remote directory {}",
                        current.display()
                    )));
                }
            }
        }
        Ok(())
    }

    fn probe(&self) -> Result<(), EndpointError> {
        self.sftp.stat(Path::new("."))?;
        Ok(())
    }
}

/// [`SessionFactory`] opening SFTP sessions from a connection profile.
#[derive(Clone, Debug)]
pub struct SftpSessionFactory {
    schema: String,
    conn: rules::Connection,
}

impl SftpSessionFactory {
    /// Wraps a connection profile for the named schema.
    pub fn new(schema: impl Into<String>, conn: rules::Connection) -> Self {
        Self {
            schema: schema.into(),
            conn,
        }
    }
}

impl SessionFactory for SftpSessionFactory {
    fn connect(&self) -> Result<Box<dyn Endpoint>, SessionError> {
        match SftpEndpoint::connect(&self.conn) {
            Ok(endpoint) => Ok(Box::new(endpoint)),
            Err(source) => Err(SessionError::Connect {
                schema: self.schema.clone(),
                source,
            }),
        }
    }
}
