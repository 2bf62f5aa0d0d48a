//! Access-token packing for ODBC-style SQL Server drivers.
//!
//! Drivers that take the token through `SQLSetConnectAttr` want it under
//! attribute 1256 as a little-endian `u32` byte length followed by the
//! token's UTF-16LE bytes. The native TDS client used for loading takes the
//! token string as is; this is kept for drivers that need the packed form.

use std::fmt;

/// `SQL_COPT_SS_ACCESS_TOKEN` from `msodbcsql.h`.
pub const SQL_COPT_SS_ACCESS_TOKEN: i32 = 1256;

/// A pre-connection attribute.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectAttribute {
    pub id: i32,
    pub value: Vec<u8>,
}

impl fmt::Debug for ConnectAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectAttribute")
            .field("id", &self.id)
            .field("value", &format_args!("<{} bytes>", self.value.len()))
            .finish()
    }
}

pub fn pack_access_token(token: &str) -> ConnectAttribute {
    let utf16: Vec<u8> = token.encode_utf16().flat_map(u16::to_le_bytes).collect();
    let len = u32::try_from(utf16.len()).unwrap_or(u32::MAX);

    let mut value = Vec::with_capacity(4 + utf16.len());
    value.extend_from_slice(&len.to_le_bytes());
    value.extend_from_slice(&utf16);

    ConnectAttribute {
        id: SQL_COPT_SS_ACCESS_TOKEN,
        value,
    }
}
