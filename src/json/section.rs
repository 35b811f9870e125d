use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::marker::PhantomData;
use std::path::Path;

use log::{debug, warn};
use serde::de::{DeserializeOwned, DeserializeSeed, Deserializer, IgnoredAny, MapAccess, Visitor};
use serde_json::Value;

use super::JsonError;

/// Read one top-level section of a JSON document as an untyped value.
///
/// Returns `Ok(None)` (and logs a warning) when the document has no such key.
pub fn read_section<P: AsRef<Path>>(path: P, key: &str) -> Result<Option<Value>, JsonError> {
    read_section_as(path, key)
}

/// Read one top-level section of a JSON document into `T`.
///
/// The document is parsed as a stream: sibling sections are skipped by the
/// parser without being allocated, so pulling the `instrument` section out of a
/// file that also embeds thousands of images stays cheap.
pub fn read_section_as<T, P>(path: P, key: &str) -> Result<Option<T>, JsonError>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    debug!("Reading '{}' section from {}", key, path.display());

    let file = File::open(path)?;
    let section = section_from_reader(BufReader::new(file), key).map_err(|source| {
        JsonError::Malformed {
            path: path.display().to_string(),
            source,
        }
    })?;

    if section.is_none() {
        warn!("No '{}' key found in {}", key, path.display());
    }

    Ok(section)
}

/// Stream a top-level section out of any reader.
pub fn section_from_reader<T, R>(reader: R, key: &str) -> Result<Option<T>, serde_json::Error>
where
    T: DeserializeOwned,
    R: Read,
{
    let mut deserializer = serde_json::Deserializer::from_reader(reader);
    let section = SectionSeed {
        key,
        marker: PhantomData,
    }
    .deserialize(&mut deserializer)?;
    deserializer.end()?;
    Ok(section)
}

/// Visits the top-level object, keeping only the value stored under `key`.
struct SectionSeed<'k, T> {
    key: &'k str,
    marker: PhantomData<T>,
}

impl<'de, T: DeserializeOwned> DeserializeSeed<'de> for SectionSeed<'_, T> {
    type Value = Option<T>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de, T: DeserializeOwned> Visitor<'de> for SectionSeed<'_, T> {
    type Value = Option<T>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a JSON object that may contain a '{}' key", self.key)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut section = None;

        // The whole map must be consumed for the parser to accept the closing brace
        while let Some(name) = map.next_key::<String>()? {
            if section.is_none() && name == self.key {
                section = Some(map.next_value::<T>()?);
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }

        Ok(section)
    }
}
