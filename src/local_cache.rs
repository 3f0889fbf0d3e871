//! In-process VAST cache used instead of the remote store.
//!
//! Each bid's VAST is kept as a base64 data URI under `bidder_adId`, and the
//! bid's playback URL is pointed at it so in-page rendering needs no fetch.
//! For ad-server delivery, the ad server's own wrapper is fetched and its
//! placeholder URL for the bidder is swapped for the stored data URI.
//!
//! Entries live until their auction expires. The owner of the auction
//! manager owns this store and forwards expiry notifications.

use crate::error::CacheError;
use crate::translator::vast_content;
use crate::transport::CacheTransport;
use crate::types::{local_key, Bid};
use base64::{engine::general_purpose, Engine as _};
use log::{debug, error, warn};
use parking_lot::RwLock;
use std::collections::HashMap;
use url::Url;

pub const DATA_URI_PREFIX: &str = "data:text/xml;base64,";

/// Query parameter of an ad-server tag URL carrying custom targeting.
pub const CUSTOM_TARGETING_PARAM: &str = "cust_params";

const BIDDER_KEY: &str = "hb_bidder";
const AD_ID_KEY: &str = "hb_adid";

/// Data-URI VAST entries keyed by `bidder_adId`.
pub struct LocalCacheStore {
    entries: RwLock<HashMap<String, String>>,
    placeholder_prefix: String,
}

impl std::fmt::Debug for LocalCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCacheStore")
            .field("entries", &self.entries.read().len())
            .field("placeholder_prefix", &self.placeholder_prefix)
            .finish()
    }
}

impl LocalCacheStore {
    pub fn new(placeholder_prefix: impl Into<String>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            placeholder_prefix: placeholder_prefix.into(),
        }
    }

    /// Keep the bid's VAST in process and point its playback URL at it.
    ///
    /// A later store for the same bidder and ad id replaces the earlier one.
    pub fn store_locally(&self, bid: &mut Bid) -> Result<(), CacheError> {
        let data_uri = to_data_uri(&vast_content(bid)?);
        bid.vast_url = Some(data_uri.clone());
        self.entries.write().insert(bid.local_key(), data_uri);
        Ok(())
    }

    /// Stored data URI for a bidder and ad id.
    pub fn get(&self, bidder: &str, ad_id: &str) -> Option<String> {
        self.entries.read().get(&local_key(bidder, ad_id)).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// URL an ad-server wrapper carries in place of a bidder's local VAST.
    pub fn placeholder_url(&self, bidder: &str) -> String {
        format!("{}?bidder={}", self.placeholder_prefix, bidder)
    }

    /// Fetch the ad server's wrapper and splice in the locally stored VAST.
    ///
    /// Yields `None` if the tag URL lacks targeting or the fetch fails. If no
    /// local entry exists for the targeted bid, the fetched document is
    /// returned unchanged.
    pub async fn resolve_via_ad_server(
        &self,
        transport: &dyn CacheTransport,
        ad_server_tag_url: &str,
    ) -> Option<String> {
        let (bidder, ad_id) = match parse_targeting(ad_server_tag_url) {
            Ok(targeting) => targeting,
            Err(e) => {
                warn!("Cannot resolve local VAST: {}", e);
                return None;
            }
        };

        let wrapper = match transport.get(ad_server_tag_url).await {
            Ok(body) => body,
            Err(e) => {
                error!("Unable to fetch ad server VAST for {}: {}", bidder, e);
                return None;
            }
        };

        match self.get(&bidder, &ad_id) {
            Some(data_uri) => Some(wrapper.replacen(&self.placeholder_url(&bidder), &data_uri, 1)),
            None => {
                debug!("No local VAST for {}_{}, passing wrapper through", bidder, ad_id);
                Some(wrapper)
            }
        }
    }

    /// Drop the entries of every bid belonging to an expired auction.
    pub fn on_auction_expired(&self, bids: &[Bid]) {
        let mut entries = self.entries.write();
        let mut removed = 0;
        for bid in bids {
            if entries.remove(&bid.local_key()).is_some() {
                removed += 1;
            }
        }
        debug!("Auction expired, dropped {} local VAST entries", removed);
    }
}

/// Base64 `data:text/xml` URI for a VAST document.
pub fn to_data_uri(vast: &str) -> String {
    format!("{}{}", DATA_URI_PREFIX, general_purpose::STANDARD.encode(vast))
}

/// Recover `(bidder, ad_id)` from a tag URL's custom targeting.
pub fn parse_targeting(tag_url: &str) -> Result<(String, String), CacheError> {
    let url = Url::parse(tag_url).map_err(|e| CacheError::InvalidTagUrl(e.to_string()))?;

    let cust_params = url
        .query_pairs()
        .find(|(key, _)| key == CUSTOM_TARGETING_PARAM)
        .map(|(_, value)| value.into_owned())
        .ok_or_else(|| {
            CacheError::InvalidTagUrl(format!("no {} in {}", CUSTOM_TARGETING_PARAM, tag_url))
        })?;

    let mut bidder = None;
    let mut ad_id = None;
    for (key, value) in url::form_urlencoded::parse(cust_params.as_bytes()) {
        match &*key {
            BIDDER_KEY => bidder = Some(value.into_owned()),
            AD_ID_KEY => ad_id = Some(value.into_owned()),
            _ => {}
        }
    }

    match (bidder, ad_id) {
        (Some(bidder), Some(ad_id)) => Ok((bidder, ad_id)),
        _ => Err(CacheError::InvalidTagUrl(format!(
            "{} lacks {} or {}",
            CUSTOM_TARGETING_PARAM, BIDDER_KEY, AD_ID_KEY
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bid(bidder: &str, ad_id: &str, auction: &str) -> Bid {
        Bid {
            auction_id: auction.to_string(),
            bidder: bidder.to_string(),
            ad_id: ad_id.to_string(),
            vast_xml: Some(format!("<VAST ad=\"{}\"/>", ad_id)),
            ttl: 30,
            ..Default::default()
        }
    }

    #[test]
    fn test_store_locally_sets_data_uri() {
        let store = LocalCacheStore::new("https://placeholder.example/vast");
        let mut b = bid("nexverse", "ad-1", "A");

        store.store_locally(&mut b).unwrap();

        let expected = to_data_uri("<VAST ad=\"ad-1\"/>");
        assert_eq!(b.vast_url.as_deref(), Some(expected.as_str()));
        assert_eq!(store.get("nexverse", "ad-1"), Some(expected));
    }

    #[test]
    fn test_data_uri_encoding() {
        assert_eq!(to_data_uri("<VAST/>"), "data:text/xml;base64,PFZBU1QvPg==");
    }

    #[test]
    fn test_last_store_wins() {
        let store = LocalCacheStore::new("p");
        let mut first = bid("b", "ad", "A");
        let mut second = bid("b", "ad", "A");
        second.vast_xml = Some("<VAST v=\"2\"/>".to_string());

        store.store_locally(&mut first).unwrap();
        store.store_locally(&mut second).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("b", "ad"), Some(to_data_uri("<VAST v=\"2\"/>")));
    }

    #[test]
    fn test_store_locally_wraps_url_bids() {
        let store = LocalCacheStore::new("p");
        let mut b = Bid {
            bidder: "b".to_string(),
            ad_id: "ad".to_string(),
            vast_url: Some("http://x/vast.xml".to_string()),
            ..Default::default()
        };
        store.store_locally(&mut b).unwrap();
        assert_eq!(
            store.get("b", "ad"),
            Some(to_data_uri(&crate::vast::wrap("http://x/vast.xml", None::<&str>)))
        );
    }

    #[test]
    fn test_expiry_removes_only_that_auctions_entries() {
        let store = LocalCacheStore::new("p");
        let mut a1 = bid("x", "1", "A");
        let mut a2 = bid("y", "2", "A");
        let mut b1 = bid("x", "3", "B");
        for b in [&mut a1, &mut a2, &mut b1] {
            store.store_locally(b).unwrap();
        }

        store.on_auction_expired(&[a1, a2]);

        assert!(store.get("x", "1").is_none());
        assert!(store.get("y", "2").is_none());
        assert!(store.get("x", "3").is_some());
    }

    #[test]
    fn test_parse_targeting() {
        let url = "https://ads.example/gampad/ads?iu=/1/video&cust_params=hb_bidder%3Dnexverse%26hb_adid%3Dad-1%26pos%3Dpre";
        assert_eq!(
            parse_targeting(url).unwrap(),
            ("nexverse".to_string(), "ad-1".to_string())
        );
    }

    #[test]
    fn test_parse_targeting_requires_both_keys() {
        let url = "https://ads.example/gampad/ads?cust_params=hb_bidder%3Dnexverse";
        assert!(matches!(parse_targeting(url), Err(CacheError::InvalidTagUrl(_))));
        assert!(parse_targeting("not a url").is_err());
        assert!(parse_targeting("https://ads.example/gampad/ads?iu=x").is_err());
    }
}
