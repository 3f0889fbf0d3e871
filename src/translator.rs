//! Translate bids into cache-store wire payloads.

use crate::error::CacheError;
use crate::types::{AuctionLookup, Bid};
use crate::vast::{is_cdata_safe, wrap};
use serde::Serialize;

/// Seconds added to a bid's ttl so the cached VAST outlives the bid.
pub const TTL_BUFFER_SECS: u32 = 15;

/// Body of a store call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreRequest {
    pub puts: Vec<StoragePayload>,
}

/// One entry of a store call, computed fresh for every flush.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoragePayload {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub value: String,
    pub ttlseconds: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bidder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bidid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// VAST to store for `bid`: inline XML if present, else a wrapper around its URL.
///
/// Wrapped URLs and trackers containing a CDATA terminator are rejected.
pub fn vast_content(bid: &Bid) -> Result<String, CacheError> {
    if let Some(xml) = bid.vast_xml.as_deref().filter(|x| !x.is_empty()) {
        return Ok(xml.to_string());
    }

    let uri = bid
        .vast_url
        .as_deref()
        .filter(|u| !u.is_empty())
        .ok_or_else(|| {
            CacheError::InvalidBid(format!(
                "bid {} from {} has neither vastXml nor vastUrl",
                bid.request_id, bid.bidder
            ))
        })?;

    if !is_cdata_safe(uri) || !bid.vast_imp_urls.iter().all(|t| is_cdata_safe(t)) {
        return Err(CacheError::InvalidBid(format!(
            "bid {} from {} has a url that cannot be wrapped",
            bid.request_id, bid.bidder
        )));
    }

    Ok(wrap(uri, &bid.vast_imp_urls))
}

/// Build the store payload for one bid.
pub fn to_payload(
    bid: &Bid,
    lookup: &dyn AuctionLookup,
    vast_track: bool,
) -> Result<StoragePayload, CacheError> {
    let mut payload = StoragePayload {
        kind: "xml",
        value: vast_content(bid)?,
        ttlseconds: bid.ttl.saturating_add(TTL_BUFFER_SECS),
        bidder: None,
        bidid: None,
        aid: None,
        timestamp: None,
        key: None,
    };

    if vast_track {
        payload.bidder = Some(bid.bidder.clone());
        payload.bidid = Some(bid.request_id.clone());
        payload.aid = Some(bid.auction_id.clone());
    }

    payload.timestamp = lookup.auction_start(bid);

    if let Some(key) = bid.custom_cache_key.as_deref().filter(|k| !k.is_empty()) {
        payload.key = Some(key.to_string());
    }

    Ok(payload)
}

/// Retrieval URL for a stored identifier.
pub fn cache_url(base: &str, id: &str) -> String {
    format!("{}?uuid={}", base, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NoAuctionLookup;

    struct FixedStart(u64);

    impl AuctionLookup for FixedStart {
        fn auction_start(&self, _bid: &Bid) -> Option<u64> {
            Some(self.0)
        }
    }

    fn url_bid() -> Bid {
        Bid {
            auction_id: "auction-1".to_string(),
            request_id: "req-1".to_string(),
            bidder: "nexverse".to_string(),
            ad_id: "ad-1".to_string(),
            vast_url: Some("http://x/vast.xml".to_string()),
            ttl: 60,
            ..Default::default()
        }
    }

    #[test]
    fn test_url_bid_is_wrapped_with_ttl_buffer() {
        let payload = to_payload(&url_bid(), &NoAuctionLookup, false).unwrap();
        assert_eq!(payload.kind, "xml");
        assert_eq!(payload.value, wrap("http://x/vast.xml", None::<&str>));
        assert_eq!(payload.ttlseconds, 75);
    }

    #[test]
    fn test_vast_xml_takes_precedence() {
        let bid = Bid {
            vast_xml: Some("<VAST/>".to_string()),
            ..url_bid()
        };
        let payload = to_payload(&bid, &NoAuctionLookup, false).unwrap();
        assert_eq!(payload.value, "<VAST/>");
    }

    #[test]
    fn test_empty_vast_xml_falls_back_to_url() {
        let bid = Bid {
            vast_xml: Some(String::new()),
            vast_imp_urls: vec!["http://t/imp".to_string()],
            ..url_bid()
        };
        let payload = to_payload(&bid, &NoAuctionLookup, false).unwrap();
        assert!(payload.value.contains("<Impression><![CDATA[http://t/imp]]></Impression>"));
    }

    #[test]
    fn test_tracking_fields_only_when_enabled() {
        let off = to_payload(&url_bid(), &NoAuctionLookup, false).unwrap();
        assert!(off.bidder.is_none() && off.bidid.is_none() && off.aid.is_none());

        let on = to_payload(&url_bid(), &NoAuctionLookup, true).unwrap();
        assert_eq!(on.bidder.as_deref(), Some("nexverse"));
        assert_eq!(on.bidid.as_deref(), Some("req-1"));
        assert_eq!(on.aid.as_deref(), Some("auction-1"));
    }

    #[test]
    fn test_timestamp_from_lookup() {
        let payload = to_payload(&url_bid(), &FixedStart(1_700_000_000_000), false).unwrap();
        assert_eq!(payload.timestamp, Some(1_700_000_000_000));
    }

    #[test]
    fn test_custom_cache_key() {
        let keyed = Bid {
            custom_cache_key: Some("my-key".to_string()),
            ..url_bid()
        };
        let payload = to_payload(&keyed, &NoAuctionLookup, false).unwrap();
        assert_eq!(payload.key.as_deref(), Some("my-key"));

        let blank = Bid {
            custom_cache_key: Some(String::new()),
            ..url_bid()
        };
        assert!(to_payload(&blank, &NoAuctionLookup, false).unwrap().key.is_none());
    }

    #[test]
    fn test_serialized_shape_omits_absent_fields() {
        let payload = to_payload(&url_bid(), &NoAuctionLookup, false).unwrap();
        let json = serde_json::to_value(StoreRequest {
            puts: vec![payload],
        })
        .unwrap();
        let put = &json["puts"][0];
        assert_eq!(put["type"], "xml");
        assert_eq!(put["ttlseconds"], 75);
        assert!(put.get("bidder").is_none());
        assert!(put.get("key").is_none());
    }

    #[test]
    fn test_bid_without_content_is_invalid() {
        let bid = Bid {
            vast_url: None,
            ..url_bid()
        };
        assert!(matches!(vast_content(&bid), Err(CacheError::InvalidBid(_))));
    }

    #[test]
    fn test_cdata_breaking_tracker_is_invalid() {
        let bid = Bid {
            vast_imp_urls: vec!["http://t/]]>".to_string()],
            ..url_bid()
        };
        assert!(matches!(vast_content(&bid), Err(CacheError::InvalidBid(_))));
    }

    #[test]
    fn test_cache_url() {
        assert_eq!(
            cache_url("https://cache.example/v1/cache", "abc"),
            "https://cache.example/v1/cache?uuid=abc"
        );
    }
}
