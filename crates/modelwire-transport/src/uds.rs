use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::packet::PacketConfig;
use crate::stream::StreamTransport;

/// Listening Unix domain socket that hands out packet transports.
///
/// The socket file is removed on drop, unless something else has replaced
/// it in the meantime.
pub struct UnixDomainSocket {
    listener: UnixListener,
    path: PathBuf,
    identity: (u64, u64),
    config: PacketConfig,
}

impl UnixDomainSocket {
    /// Permission mode for created socket paths.
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;
    /// `sockaddr_un.sun_path` is 108 bytes on Linux, 104 elsewhere.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Bind with the default packet configuration.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        Self::bind_with_config(path, PacketConfig::default())
    }

    /// Bind and listen at `path`. A stale socket file at `path` is replaced;
    /// any other existing file is an error.
    pub fn bind_with_config(path: impl AsRef<Path>, config: PacketConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let len = path.as_os_str().len();
        if len >= Self::MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len,
                max: Self::MAX_PATH_LEN,
            });
        }
        let bind_err = |source: std::io::Error| TransportError::Bind {
            path: path.clone(),
            source,
        };

        if let Ok(existing) = std::fs::symlink_metadata(&path) {
            if !existing.file_type().is_socket() {
                return Err(bind_err(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "existing path is not a unix socket",
                )));
            }
            debug!(?path, "removing stale socket");
            std::fs::remove_file(&path).map_err(bind_err)?;
        }

        let listener = UnixListener::bind(&path).map_err(bind_err)?;
        std::fs::set_permissions(
            &path,
            std::fs::Permissions::from_mode(Self::DEFAULT_SOCKET_MODE),
        )
        .map_err(bind_err)?;
        let created = std::fs::symlink_metadata(&path).map_err(bind_err)?;

        info!(?path, "listening on unix domain socket");
        Ok(Self {
            listener,
            identity: (created.dev(), created.ino()),
            path,
            config,
        })
    }

    /// Accept the next connection (blocking).
    pub fn accept(&self) -> Result<StreamTransport<UnixStream>> {
        let (stream, _addr) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(path = ?self.path, "accepted connection");
        StreamTransport::with_config_unix(stream, self.config.clone())
    }

    /// Connect to a listening socket (blocking).
    pub fn connect(path: impl AsRef<Path>, config: PacketConfig) -> Result<StreamTransport<UnixStream>> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path).map_err(|source| TransportError::Connect {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(?path, "connected to unix domain socket");
        StreamTransport::with_config_unix(stream, config)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UnixDomainSocket {
    fn drop(&mut self) {
        let Ok(metadata) = std::fs::symlink_metadata(&self.path) else {
            return;
        };
        if metadata.file_type().is_socket() && (metadata.dev(), metadata.ino()) == self.identity {
            debug!(path = ?self.path, "cleaning up socket file");
            let _ = std::fs::remove_file(&self.path);
        } else {
            debug!(path = ?self.path, "socket path identity changed; skipping cleanup");
        }
    }
}

impl std::fmt::Debug for UnixDomainSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnixDomainSocket")
            .field("path", &self.path)
            .finish()
    }
}
