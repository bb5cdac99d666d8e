use std::{error::Error, fmt};

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use freeserf_system_sync::{SavedGameState, SyncError};

const FRAME_DOMAIN: &str = "freeserf";
const FRAME_VERSION: &str = "v1";

/// Identifier prefix emitted before the frame kind.
pub(crate) const FRAME_HEADER: &str = "freeserf:v1";
/// Delimiter separating the prefix, kind, payload and checksum.
const FIELD_DELIMITER: char = ':';

/// Encodes a captured frame into a single printable line.
///
/// The line reads `freeserf:v1:<full|delta>:<base64 payload>:<hex sha256>`.
#[must_use]
pub(crate) fn encode(frame: &SavedGameState) -> String {
    let kind = if frame.is_full() { "full" } else { "delta" };
    let payload = STANDARD_NO_PAD.encode(frame.payload());
    let checksum: String = frame
        .checksum()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect();
    format!("{FRAME_HEADER}:{kind}:{payload}:{checksum}")
}

/// Decodes a line written by [`encode`], verifying its checksum.
pub(crate) fn decode(value: &str) -> Result<SavedGameState, FrameTransferError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(FrameTransferError::EmptyPayload);
    }

    let mut parts = trimmed.split(FIELD_DELIMITER);
    let domain = parts.next().ok_or(FrameTransferError::MissingPrefix)?;
    let version = parts.next().ok_or(FrameTransferError::MissingVersion)?;
    let kind = parts.next().ok_or(FrameTransferError::MissingKind)?;
    let payload = parts.next().ok_or(FrameTransferError::MissingPayload)?;
    let checksum = parts.next().ok_or(FrameTransferError::MissingChecksum)?;

    if domain != FRAME_DOMAIN {
        return Err(FrameTransferError::InvalidPrefix(domain.to_owned()));
    }
    if version != FRAME_VERSION {
        return Err(FrameTransferError::UnsupportedVersion(version.to_owned()));
    }
    let full = match kind {
        "full" => true,
        "delta" => false,
        other => return Err(FrameTransferError::InvalidKind(other.to_owned())),
    };

    let bytes = STANDARD_NO_PAD
        .decode(payload.as_bytes())
        .map_err(FrameTransferError::InvalidEncoding)?;
    let checksum = parse_checksum(checksum)?;
    let frame = SavedGameState::from_parts(bytes, checksum).map_err(FrameTransferError::InvalidFrame)?;
    if frame.is_full() != full {
        return Err(FrameTransferError::KindMismatch);
    }
    Ok(frame)
}

/// Errors that can occur while decoding frame transfer strings.
#[derive(Debug)]
pub(crate) enum FrameTransferError {
    /// The provided string was empty or contained only whitespace.
    EmptyPayload,
    /// The prefix segment was missing.
    MissingPrefix,
    /// The version segment was missing.
    MissingVersion,
    /// The frame kind segment was missing.
    MissingKind,
    /// The payload segment was missing.
    MissingPayload,
    /// The checksum segment was missing.
    MissingChecksum,
    /// The string used an unexpected prefix segment.
    InvalidPrefix(String),
    /// The string used an unsupported version identifier.
    UnsupportedVersion(String),
    /// The kind segment was neither `full` nor `delta`.
    InvalidKind(String),
    /// The checksum was not 64 hex digits.
    InvalidChecksum(String),
    /// The base64 payload could not be decoded.
    InvalidEncoding(base64::DecodeError),
    /// The payload failed its checksum or header checks.
    InvalidFrame(SyncError),
    /// The kind segment disagreed with the frame header.
    KindMismatch,
}

impl fmt::Display for FrameTransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPayload => write!(f, "frame string was empty"),
            Self::MissingPrefix => write!(f, "frame string is missing the prefix"),
            Self::MissingVersion => write!(f, "frame string is missing the version"),
            Self::MissingKind => write!(f, "frame string is missing the frame kind"),
            Self::MissingPayload => write!(f, "frame string is missing the payload"),
            Self::MissingChecksum => write!(f, "frame string is missing the checksum"),
            Self::InvalidPrefix(prefix) => write!(f, "frame prefix '{prefix}' is not supported"),
            Self::UnsupportedVersion(version) => {
                write!(f, "frame version '{version}' is not supported")
            }
            Self::InvalidKind(kind) => write!(f, "frame kind '{kind}' is not supported"),
            Self::InvalidChecksum(checksum) => {
                write!(f, "could not parse frame checksum '{checksum}'")
            }
            Self::InvalidEncoding(error) => write!(f, "could not decode frame payload: {error}"),
            Self::InvalidFrame(error) => write!(f, "frame payload was rejected: {error}"),
            Self::KindMismatch => write!(f, "frame kind does not match its header"),
        }
    }
}

impl Error for FrameTransferError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidEncoding(error) => Some(error),
            Self::InvalidFrame(error) => Some(error),
            _ => None,
        }
    }
}

fn parse_checksum(checksum: &str) -> Result<[u8; 32], FrameTransferError> {
    let invalid = || FrameTransferError::InvalidChecksum(checksum.to_owned());
    if checksum.len() != 64 || !checksum.is_ascii() {
        return Err(invalid());
    }
    let mut out = [0; 32];
    for (byte, pair) in out.iter_mut().zip(checksum.as_bytes().chunks(2)) {
        let digits = std::str::from_utf8(pair).map_err(|_| invalid())?;
        *byte = u8::from_str_radix(digits, 16).map_err(|_| invalid())?;
    }
    Ok(out)
}
