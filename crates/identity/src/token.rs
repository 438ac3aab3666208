use std::fmt;

/// Pre-login connection attribute key under which SQL Server drivers expect
/// the encoded access token (`SQL_COPT_SS_ACCESS_TOKEN` in the ODBC headers).
pub const SQL_COPT_SS_ACCESS_TOKEN: u32 = 1256;

/// An opaque bearer token issued by the identity provider.
///
/// Valid for a bounded lifetime which this crate does not track; consumers
/// re-request a token for every connection attempt instead.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The raw token string, for drivers that take the token directly
    /// (tiberius binds it through its AAD authentication method).
    pub fn secret(&self) -> &str {
        &self.0
    }

    /// Encodes the token into the binary pre-login attribute buffer that
    /// ODBC-family SQL Server drivers require under
    /// [`SQL_COPT_SS_ACCESS_TOKEN`].
    ///
    /// The documented layout: every UTF-8 byte of the token is followed by a
    /// single zero byte (an ASCII-safe widening to UTF-16LE, with no real
    /// multi-byte decoding), and the whole interleaved buffer is prefixed
    /// with its byte length as a 4-byte little-endian integer. The driver
    /// parses the length prefix first, so it must match exactly.
    pub fn to_driver_attribute(&self) -> Vec<u8> {
        let raw = self.0.as_bytes();
        let mut widened = Vec::with_capacity(4 + raw.len() * 2);
        widened.extend_from_slice(&((raw.len() * 2) as u32).to_le_bytes());
        for &byte in raw {
            widened.push(byte);
            widened.push(0);
        }
        widened
    }
}

// Keep the token itself out of debug output.
impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AccessToken").field(&"<redacted>").finish()
    }
}
