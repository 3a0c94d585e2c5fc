// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::Error;

/// A type-erased cached value.
///
/// A loader's output is encoded once into a structured document when it is loaded;
/// each read decodes the document into the caller's destination type, matching
/// fields by name. Encoding and decoding are explicit, fallible steps so a value the
/// cache cannot represent and a destination that does not fit the stored shape are
/// both reported as errors rather than silently dropped.
///
/// # Examples
///
/// ```
/// use revalcache_tier::Payload;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize)]
/// struct Stored { id: String, name: String, internal: u32 }
///
/// #[derive(Deserialize, Debug, PartialEq)]
/// struct View { id: String, name: String }
///
/// let payload = Payload::encode(&Stored { id: "1".into(), name: "Named".into(), internal: 7 })?;
/// let view: View = payload.decode()?;
/// assert_eq!(view, View { id: "1".into(), name: "Named".into() });
/// # Ok::<(), revalcache_tier::Error>(())
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(serde_json::Value);

impl Payload {
    /// Encodes a loader value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValueNotSupported`] if the value has no structured form, for
    /// example a map whose keys are not strings.
    pub fn encode<T>(value: &T) -> Result<Self, Error>
    where
        T: Serialize + ?Sized,
    {
        serde_json::to_value(value)
            .map(Self)
            .map_err(|e| Error::ValueNotSupported(Arc::new(e)))
    }

    /// Decodes into the destination shape `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the stored document does not fit `T`.
    pub fn decode<T>(&self) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        T::deserialize(&self.0).map_err(|e| Error::Decode(Arc::new(e)))
    }

    /// Borrows the underlying document.
    #[must_use]
    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct AuthItem {
        #[serde(rename = "ID")]
        id: String,
        #[serde(rename = "Name")]
        name: String,
    }

    #[test]
    fn decode_matches_fields_by_name() {
        let payload = Payload::from(serde_json::json!({ "Name": "Named", "ID": "123", "Extra": true }));
        let item: AuthItem = payload.decode().unwrap();
        assert_eq!(
            item,
            AuthItem {
                id: "123".into(),
                name: "Named".into()
            }
        );
    }

    #[test]
    fn decode_into_wrong_shape_is_a_decode_error() {
        let payload = Payload::encode(&42_u32).unwrap();
        let err = payload.decode::<AuthItem>().unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn encode_rejects_non_string_map_keys() {
        let mut map = HashMap::new();
        map.insert((1, 2), "tuple keys have no document form");
        let err = Payload::encode(&map).unwrap_err();
        assert!(matches!(err, Error::ValueNotSupported(_)));
    }
}
