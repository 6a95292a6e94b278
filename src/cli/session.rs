//! # Inspector Session
//!
//! Holds what the dot commands operate on: the memory-mapped response body,
//! the tree decoded from it, the format it was decoded as, and the host
//! settings used to build request URLs.
//!
//! Loading is all-or-nothing: a body that fails to decode leaves the
//! previously loaded body and tree in place.

use std::fs::File;
use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr};
use memmap2::Mmap;
use tracing::debug;

use crate::config::{settings_path, HostSettings};
use crate::decoder::{decode, WireFormat};
use crate::tree::ParsedResult;

/// A response body mapped from disk. Empty files are not mapped.
#[derive(Debug)]
pub struct LoadedBody {
    pub path: PathBuf,
    map: Option<Mmap>,
}

impl LoadedBody {
    pub fn open(path: &Path) -> Result<Self> {
        let file =
            File::open(path).wrap_err_with(|| format!("failed to open body file {:?}", path))?;
        let len = file
            .metadata()
            .wrap_err_with(|| format!("failed to stat body file {:?}", path))?
            .len();
        let map = if len == 0 {
            None
        } else {
            // SAFETY: the mapping is read-only and chwire never writes the
            // file; a concurrent external writer is outside our contract.
            Some(
                unsafe { Mmap::map(&file) }
                    .wrap_err_with(|| format!("failed to map body file {:?}", path))?,
            )
        };
        Ok(Self {
            path: path.to_path_buf(),
            map,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        self.map.as_deref().unwrap_or(&[])
    }
}

#[derive(Debug)]
pub struct Session {
    pub format: WireFormat,
    pub settings: HostSettings,
    settings_path: Option<PathBuf>,
    body: Option<LoadedBody>,
    result: Option<ParsedResult>,
}

impl Session {
    pub fn new(format: WireFormat) -> Self {
        let settings_path = settings_path();
        let settings = match &settings_path {
            Some(path) => HostSettings::load(path).unwrap_or_else(|e| {
                debug!(error = %e, "ignoring unreadable settings file");
                HostSettings::default()
            }),
            None => HostSettings::default(),
        };
        Self::with_settings(format, settings, settings_path)
    }

    pub fn with_settings(
        format: WireFormat,
        settings: HostSettings,
        settings_path: Option<PathBuf>,
    ) -> Self {
        Self {
            format,
            settings,
            settings_path,
            body: None,
            result: None,
        }
    }

    /// Maps and decodes `path`; the session only changes when both succeed.
    pub fn load(&mut self, path: &Path, format: WireFormat) -> Result<&ParsedResult> {
        let body = LoadedBody::open(path)?;
        let result = decode(body.bytes(), format)
            .wrap_err_with(|| format!("failed to decode {:?} as {}", path, format))?;
        debug!(path = ?path, format = %format, nodes = result.node_count(), "loaded body");
        self.format = format;
        self.body = Some(body);
        Ok(self.result.insert(result))
    }

    pub fn result(&self) -> Option<&ParsedResult> {
        self.result.as_ref()
    }

    pub fn body(&self) -> Option<&LoadedBody> {
        self.body.as_ref()
    }

    pub fn bytes(&self) -> &[u8] {
        self.body.as_ref().map(LoadedBody::bytes).unwrap_or(&[])
    }

    /// Replaces the host address and persists it when a settings file is known.
    pub fn set_host(&mut self, host: &str) -> Result<()> {
        url::Url::parse(host).wrap_err_with(|| format!("invalid host address '{}'", host))?;
        self.settings.host = host.to_string();
        if let Some(path) = &self.settings_path {
            self.settings.save(path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn session_in(dir: &Path) -> Session {
        Session::with_settings(
            WireFormat::RowBinaryWithNamesAndTypes,
            HostSettings::default(),
            Some(dir.join("chwire.json")),
        )
    }

    const ONE_ROW: [u8; 10] = [0x01, 0x01, b'n', 0x05, b'U', b'I', b'n', b't', b'8', 0x07];

    #[test]
    fn load_maps_and_decodes_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("body.bin");
        fs::write(&path, ONE_ROW).unwrap();

        let mut session = session_in(dir.path());
        let result = session
            .load(&path, WireFormat::RowBinaryWithNamesAndTypes)
            .unwrap();
        assert_eq!(result.rows().len(), 1);
        assert_eq!(session.bytes(), &ONE_ROW);
    }

    #[test]
    fn failed_load_keeps_previous_tree() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.bin");
        let bad = dir.path().join("bad.bin");
        fs::write(&good, ONE_ROW).unwrap();
        fs::write(&bad, &ONE_ROW[..6]).unwrap();

        let mut session = session_in(dir.path());
        session
            .load(&good, WireFormat::RowBinaryWithNamesAndTypes)
            .unwrap();
        assert!(session
            .load(&bad, WireFormat::RowBinaryWithNamesAndTypes)
            .is_err());

        assert_eq!(session.body().unwrap().path, good);
        assert_eq!(session.result().unwrap().rows().len(), 1);
    }

    #[test]
    fn empty_file_loads_as_empty_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.bin");
        fs::write(&path, b"").unwrap();

        let mut session = session_in(dir.path());
        let result = session.load(&path, WireFormat::Native).unwrap();
        assert!(result.blocks().is_empty());
        assert_eq!(session.format, WireFormat::Native);
        assert!(session.bytes().is_empty());
    }

    #[test]
    fn host_is_validated_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(dir.path());

        assert!(session.set_host("not a url").is_err());
        session.set_host("http://ch.example:8123").unwrap();

        let stored = HostSettings::load(&dir.path().join("chwire.json")).unwrap();
        assert_eq!(stored.host, "http://ch.example:8123");
    }
}
