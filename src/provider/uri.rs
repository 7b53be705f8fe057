use std::fmt;

use super::ProviderError;

// ============================================================================
// Resource URIs
// ============================================================================

/// An opaque, hierarchical resource path.
///
/// `authority/collection` names a whole collection;
/// `authority/collection/<id>` names one item within it. The trailing
/// segment, when present, is the store-assigned integer key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceUri {
    authority: String,
    collection: String,
    id: Option<i64>,
}

impl ResourceUri {
    /// A collection-scoped URI.
    pub fn new(authority: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            collection: collection.into(),
            id: None,
        }
    }

    /// Parse `authority/collection` or `authority/collection/<id>`.
    ///
    /// # Errors
    ///
    /// Malformed shapes (wrong segment count, empty segment, non-numeric
    /// trailing id) are [`ProviderError::InvalidArgument`]. Whether the URI
    /// names a *known* resource is a routing question answered later by
    /// [`UriTable::classify`].
    pub fn parse(raw: &str) -> Result<Self, ProviderError> {
        let segments: Vec<&str> = raw.split('/').collect();
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(malformed(raw));
        }

        match segments.as_slice() {
            [authority, collection] => Ok(Self::new(*authority, *collection)),
            [authority, collection, id] => {
                if !id.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(malformed(raw));
                }
                let id: i64 = id.parse().map_err(|_| malformed(raw))?;
                Ok(Self::new(*authority, *collection).item(id))
            }
            _ => Err(malformed(raw)),
        }
    }

    /// Derive an item URI within the same collection.
    pub fn item(&self, id: i64) -> Self {
        Self {
            authority: self.authority.clone(),
            collection: self.collection.clone(),
            id: Some(id),
        }
    }

    /// The collection an item URI belongs to; `None` for collection URIs.
    pub fn parent(&self) -> Option<Self> {
        self.id.map(|_| Self::new(&self.authority, &self.collection))
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn is_collection(&self) -> bool {
        self.id.is_none()
    }
}

impl fmt::Display for ResourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "{}/{}/{}", self.authority, self.collection, id),
            None => write!(f, "{}/{}", self.authority, self.collection),
        }
    }
}

fn malformed(raw: &str) -> ProviderError {
    ProviderError::InvalidArgument(format!("malformed resource uri: {raw}"))
}

// ============================================================================
// Routing Table
// ============================================================================

/// Scope of a routed URI: whole collection, or one item by identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriMatch {
    Collection,
    Item(i64),
}

/// Static routing table for registered `authority/collection` pairs.
///
/// A URI resolves to exactly one of the two [`UriMatch`] cases, decided once
/// at the entry of each provider operation; anything unregistered is
/// rejected with `NotFound` before the store is touched.
#[derive(Debug, Clone)]
pub struct UriTable {
    authority: String,
    collections: Vec<String>,
}

impl UriTable {
    pub fn new(authority: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            collections: Vec::new(),
        }
    }

    pub fn register(mut self, collection: impl Into<String>) -> Self {
        self.collections.push(collection.into());
        self
    }

    pub fn classify(&self, uri: &ResourceUri) -> Result<UriMatch, ProviderError> {
        let registered = uri.authority() == self.authority
            && self.collections.iter().any(|c| c == uri.collection());
        if !registered {
            return Err(ProviderError::NotFound(uri.to_string()));
        }
        Ok(match uri.id() {
            Some(id) => UriMatch::Item(id),
            None => UriMatch::Collection,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_collection_and_item_shapes() {
        let collection = ResourceUri::parse("tally/constants").unwrap();
        assert!(collection.is_collection());
        assert_eq!(collection.authority(), "tally");
        assert_eq!(collection.collection(), "constants");

        let item = ResourceUri::parse("tally/constants/7").unwrap();
        assert_eq!(item.id(), Some(7));
        assert_eq!(item.parent(), Some(collection));
    }

    #[test]
    fn rejects_malformed_shapes() {
        for raw in [
            "",
            "constants",
            "tally//7",
            "tally/constants/",
            "tally/constants/abc",
            "tally/constants/-3",
            "tally/constants/7/extra",
        ] {
            let err = ResourceUri::parse(raw).unwrap_err();
            assert!(
                matches!(err, ProviderError::InvalidArgument(_)),
                "expected InvalidArgument for {raw:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn classify_is_a_two_way_split() {
        let table = UriTable::new("tally").register("constants");

        let collection = ResourceUri::parse("tally/constants").unwrap();
        assert_eq!(table.classify(&collection).unwrap(), UriMatch::Collection);

        let item = ResourceUri::parse("tally/constants/42").unwrap();
        assert_eq!(table.classify(&item).unwrap(), UriMatch::Item(42));
    }

    #[test]
    fn unregistered_uris_are_not_found() {
        let table = UriTable::new("tally").register("constants");

        for raw in ["tally/widgets", "other/constants", "other/constants/1"] {
            let uri = ResourceUri::parse(raw).unwrap();
            let err = table.classify(&uri).unwrap_err();
            assert!(
                matches!(err, ProviderError::NotFound(_)),
                "expected NotFound for {raw:?}, got {err:?}"
            );
        }
    }

    proptest! {
        #[test]
        fn display_parse_roundtrip(
            authority in "[a-z][a-z0-9.]{0,15}",
            collection in "[a-z][a-z0-9_]{0,15}",
            id in proptest::option::of(0i64..1_000_000),
        ) {
            let uri = match id {
                Some(id) => ResourceUri::new(&authority, &collection).item(id),
                None => ResourceUri::new(&authority, &collection),
            };
            let reparsed = ResourceUri::parse(&uri.to_string()).unwrap();
            prop_assert_eq!(uri, reparsed);
        }
    }
}
