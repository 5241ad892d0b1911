//! Lease registry lookups
//!
//! The registry is a line-oriented text file (dnsmasq lease database format):
//!
//! ```text
//! 1718031112 aa:bb:cc:dd:ee:01 192.168.43.17 pixel-7 01:aa:bb:cc:dd:ee:01
//! ```
//!
//! Fields are whitespace separated; field 1 is the MAC address and field 3
//! the device name. Lines with fewer than four fields are skipped.

use std::io::ErrorKind;
use std::path::PathBuf;

use crate::errors::{Result, SessionError};
use crate::types::MacAddress;

const MAC_FIELD: usize = 1;
const NAME_FIELD: usize = 3;
const MIN_FIELDS: usize = 4;

#[derive(Debug, Clone)]
pub struct LeaseRegistry {
    path: PathBuf,
}

impl LeaseRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// One pass over the current file contents.
    ///
    /// A missing file is treated as "no lease yet". Bytes that are not valid
    /// UTF-8 are replaced, so a single odd hostname does not hide other leases.
    pub async fn lookup(&self, mac: &MacAddress) -> Result<Option<String>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Self::find_in(&String::from_utf8_lossy(&bytes), mac)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(SessionError::Lease {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// First name recorded for `mac` in `contents`
    pub fn find_in(contents: &str, mac: &MacAddress) -> Option<String> {
        contents.lines().find_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < MIN_FIELDS {
                return None;
            }
            let lease_mac: MacAddress = fields[MAC_FIELD].parse().ok()?;
            (lease_mac == *mac).then(|| fields[NAME_FIELD].to_string())
        })
    }
}
