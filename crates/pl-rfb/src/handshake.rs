//! Connection handshake
//!
//! ```text
//!  client                                server
//!    |  <──────── ProtocolVersion ─────────  |
//!    |  ───────── ProtocolVersion ────────>  |
//!    |  <──────── security types ──────────  |
//!    |  ───────── chosen type ────────────>  |   (3.7+)
//!    |  <──────── SecurityResult ──────────  |   (3.8, or any non-None type)
//!    |  ───────── ClientInit ─────────────>  |
//!    |  <──────── ServerInit ──────────────  |
//! ```
//!
//! Only the `None` security type is supported; the front-panel server on
//! the device does not ask for a password.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::RfbError;
use crate::message::{PixelFormat, ServerInit};

/// Length of the version banner, e.g. `b"RFB 003.008\n"`
pub const VERSION_BANNER_LEN: usize = 12;

/// Longest failure reason or desktop name we will read
const MAX_STRING_LEN: usize = 64 * 1024;

/// Security type identifiers
pub mod security {
    pub const INVALID: u8 = 0;
    pub const NONE: u8 = 1;
    pub const VNC_AUTH: u8 = 2;
}

/// Protocol versions this client can speak
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProtocolVersion {
    V3_3,
    V3_7,
    V3_8,
}

impl ProtocolVersion {
    /// Pick the version to use given the server's banner
    ///
    /// Newer servers are answered with 3.8. Minor versions 4-6 are vendor
    /// variants that behave like 3.3.
    pub fn negotiate(banner: &[u8; VERSION_BANNER_LEN]) -> Result<Self, RfbError> {
        let unsupported =
            || RfbError::UnsupportedVersion(String::from_utf8_lossy(banner).trim().to_string());

        if &banner[..4] != b"RFB " || banner[7] != b'.' || banner[11] != b'\n' {
            return Err(unsupported());
        }
        let field = |range: std::ops::Range<usize>| -> Option<u32> {
            std::str::from_utf8(&banner[range]).ok()?.parse().ok()
        };
        let (major, minor) = match (field(4..7), field(8..11)) {
            (Some(major), Some(minor)) => (major, minor),
            _ => return Err(unsupported()),
        };

        match (major, minor) {
            (3, 0..=2) => Err(unsupported()),
            (3, 3..=6) => Ok(Self::V3_3),
            (3, 7) => Ok(Self::V3_7),
            (3, _) => Ok(Self::V3_8),
            (m, _) if m > 3 => Ok(Self::V3_8),
            _ => Err(unsupported()),
        }
    }

    /// Banner the client sends back
    pub fn banner(&self) -> &'static [u8; VERSION_BANNER_LEN] {
        match self {
            Self::V3_3 => b"RFB 003.003\n",
            Self::V3_7 => b"RFB 003.007\n",
            Self::V3_8 => b"RFB 003.008\n",
        }
    }
}

/// Run the handshake up to and including ServerInit
///
/// `shared` asks the server to leave other viewers connected.
pub async fn handshake<S>(stream: &mut S, shared: bool) -> Result<(ProtocolVersion, ServerInit), RfbError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut banner = [0u8; VERSION_BANNER_LEN];
    stream.read_exact(&mut banner).await?;
    let version = ProtocolVersion::negotiate(&banner)?;
    tracing::debug!(?version, "RFB server banner {:?}", String::from_utf8_lossy(&banner).trim());

    stream.write_all(version.banner()).await?;
    negotiate_security(stream, version).await?;

    stream.write_all(&[shared as u8]).await?;
    stream.flush().await?;

    let init = read_server_init(stream).await?;
    tracing::debug!(
        "RFB session established: {}x{} '{}'",
        init.width,
        init.height,
        init.name
    );
    Ok((version, init))
}

async fn negotiate_security<S>(stream: &mut S, version: ProtocolVersion) -> Result<(), RfbError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if version == ProtocolVersion::V3_3 {
        // 3.3: the server decides, as a u32
        return match stream.read_u32().await? {
            0 => Err(RfbError::SecurityFailure(read_string(stream).await?)),
            1 => Ok(()),
            other => Err(RfbError::UnsupportedSecurity(vec![other.min(u8::MAX as u32) as u8])),
        };
    }

    let count = stream.read_u8().await?;
    if count == 0 {
        return Err(RfbError::SecurityFailure(read_string(stream).await?));
    }
    let mut offered = vec![0u8; count as usize];
    stream.read_exact(&mut offered).await?;

    if !offered.contains(&security::NONE) {
        return Err(RfbError::UnsupportedSecurity(offered));
    }
    stream.write_all(&[security::NONE]).await?;
    stream.flush().await?;

    // 3.7 skips SecurityResult for the None type
    if version == ProtocolVersion::V3_8 {
        let result = stream.read_u32().await?;
        if result != 0 {
            return Err(RfbError::SecurityFailure(read_string(stream).await?));
        }
    }

    Ok(())
}

async fn read_server_init<S>(stream: &mut S) -> Result<ServerInit, RfbError>
where
    S: AsyncRead + Unpin,
{
    let width = stream.read_u16().await?;
    let height = stream.read_u16().await?;
    let mut format = [0u8; PixelFormat::SIZE];
    stream.read_exact(&mut format).await?;
    let name = read_string(stream).await?;

    Ok(ServerInit {
        width,
        height,
        pixel_format: PixelFormat::decode(&format),
        name,
    })
}

/// Read a u32-length-prefixed string
async fn read_string<S>(stream: &mut S) -> Result<String, RfbError>
where
    S: AsyncRead + Unpin,
{
    let len = stream.read_u32().await? as usize;
    if len > MAX_STRING_LEN {
        return Err(RfbError::PayloadTooLarge {
            size: len,
            max: MAX_STRING_LEN,
        });
    }
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
