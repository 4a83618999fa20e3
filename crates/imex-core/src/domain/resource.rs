//! Envelope handed to a `TransactionStation` on push.

use std::fmt;
use std::io::Read;

/// A resource to store in a station.
///
/// `data` is moved into `push`; the station reads it to the end (or gives
/// up) and drops it before returning.
pub struct StationResource {
    pub data: Box<dyn Read + Send>,

    /// Display name (for a file, its file name).
    pub name: String,

    /// Language of the caller at submission time.
    pub language: String,
}

impl StationResource {
    pub fn new(
        data: Box<dyn Read + Send>,
        name: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            data,
            name: name.into(),
            language: language.into(),
        }
    }
}

impl fmt::Debug for StationResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StationResource")
            .field("name", &self.name)
            .field("language", &self.language)
            .finish_non_exhaustive()
    }
}
