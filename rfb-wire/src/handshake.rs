//! The three-phase RFB handshake, client side.
//!
//! 1. Protocol version: the server announces `RFB xxx.yyy\n`; we always
//!    answer 3.8 and accept servers from 3.3 up (3.3-3.6 use the older
//!    security negotiation).
//! 2. Security: only type None (1) is spoken. A server that offers
//!    anything else - password auth, VeNCrypt - fails the handshake; this
//!    client exists to photograph servers that require no credentials.
//! 3. Initialisation: ClientInit (shared flag) out, ServerInit back.

use crate::messages::ServerInit;
use crate::stream::{WireReader, WireWriter};
use tokio::io::{AsyncRead, AsyncWrite};

const CLIENT_VERSION: &[u8; 12] = b"RFB 003.008\n";
const SECURITY_NONE: u8 = 1;

/// Protocol version settled during phase one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    V3_3,
    V3_8,
}

/// Run the full handshake and return the server's initial parameters.
///
/// `shared = true` advertises non-exclusive access so the capture does not
/// kick an interactive user off the desktop.
///
/// The connection is left positioned right after ServerInit, ready for
/// SetPixelFormat/SetEncodings. On any error the caller is expected to
/// drop the connection; no recovery is possible mid-handshake.
pub async fn handshake<R: AsyncRead + Unpin, W: AsyncWrite + Unpin>(
    reader: &mut WireReader<R>,
    writer: &mut WireWriter<W>,
    shared: bool,
) -> std::io::Result<ServerInit> {
    let version = exchange_versions(reader, writer).await?;
    negotiate_security(reader, writer, version).await?;

    // ClientInit: a single shared-session flag.
    writer.put_u8(shared as u8);
    writer.flush().await?;

    ServerInit::read_from(reader).await
}

async fn exchange_versions<R: AsyncRead + Unpin, W: AsyncWrite + Unpin>(
    reader: &mut WireReader<R>,
    writer: &mut WireWriter<W>,
) -> std::io::Result<ProtocolVersion> {
    let mut announced = [0u8; 12];
    reader.read_exact(&mut announced).await?;

    let (major, minor) = parse_version(&announced)?;
    if major < 3 || (major == 3 && minor < 3) {
        return Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            format!("server speaks RFB {}.{}, need at least 3.3", major, minor),
        ));
    }

    writer.put_slice(CLIENT_VERSION);
    writer.flush().await?;

    // 3.3 through 3.6 all use the 3.3 security scheme.
    if major == 3 && minor < 7 {
        Ok(ProtocolVersion::V3_3)
    } else {
        Ok(ProtocolVersion::V3_8)
    }
}

fn parse_version(bytes: &[u8; 12]) -> std::io::Result<(u32, u32)> {
    let malformed = || {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "not an RFB version banner: {:?}",
                String::from_utf8_lossy(bytes)
            ),
        )
    };

    if &bytes[0..4] != b"RFB " || bytes[7] != b'.' || bytes[11] != b'\n' {
        return Err(malformed());
    }
    let major = std::str::from_utf8(&bytes[4..7])
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(malformed)?;
    let minor = std::str::from_utf8(&bytes[8..11])
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(malformed)?;
    Ok((major, minor))
}

async fn negotiate_security<R: AsyncRead + Unpin, W: AsyncWrite + Unpin>(
    reader: &mut WireReader<R>,
    writer: &mut WireWriter<W>,
    version: ProtocolVersion,
) -> std::io::Result<()> {
    match version {
        ProtocolVersion::V3_8 => {
            let count = reader.read_u8().await?;
            if count == 0 {
                let reason = read_reason(reader).await?;
                return Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    format!("server refused connection: {}", reason),
                ));
            }

            let offered = reader.read_vec(count as usize).await?;
            if !offered.contains(&SECURITY_NONE) {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    format!("server requires authentication (offered types {:?})", offered),
                ));
            }

            writer.put_u8(SECURITY_NONE);
            writer.flush().await?;

            // SecurityResult follows even for type None in 3.8.
            match reader.read_u32().await? {
                0 => Ok(()),
                1 => {
                    let reason = read_reason(reader).await?;
                    Err(std::io::Error::new(
                        std::io::ErrorKind::PermissionDenied,
                        format!("security handshake failed: {}", reason),
                    ))
                }
                other => Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("bad SecurityResult {}", other),
                )),
            }
        }
        ProtocolVersion::V3_3 => {
            // The server dictates the type; no result message follows.
            match reader.read_u32().await? {
                0 => {
                    let reason = read_reason(reader).await?;
                    Err(std::io::Error::new(
                        std::io::ErrorKind::ConnectionRefused,
                        format!("server refused connection: {}", reason),
                    ))
                }
                t if t == SECURITY_NONE as u32 => Ok(()),
                other => Err(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    format!("server requires authentication (security type {})", other),
                )),
            }
        }
    }
}

/// Length-prefixed failure reason string, sent on refusals.
async fn read_reason<R: AsyncRead + Unpin>(
    reader: &mut WireReader<R>,
) -> std::io::Result<String> {
    let len = reader.read_u32().await? as usize;
    let bytes = reader.read_vec(len).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
