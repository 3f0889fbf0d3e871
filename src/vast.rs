//! VAST 3.0 wrapper documents.
//!
//! A wrapper redirects the player to another VAST document through its
//! `VASTAdTagURI`. Inputs are embedded inside CDATA sections verbatim; callers
//! that handle untrusted URLs should check them with [`is_cdata_safe`] first.

const CDATA_END: &str = "]]>";

/// Build a wrapper VAST document around `uri`.
///
/// `impression_trackers` accepts anything iterable, so `None`, `Some(url)` and
/// a list of urls all work. One `<Impression>` is emitted per tracker, in input
/// order. Output is deterministic for identical input.
pub fn wrap<I, S>(uri: &str, impression_trackers: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let impressions: String = impression_trackers
        .into_iter()
        .map(|tracker| format!("<Impression><![CDATA[{}]]></Impression>", tracker.as_ref()))
        .collect();

    format!(
        "<VAST version=\"3.0\">\
         <Ad>\
         <Wrapper>\
         <AdSystem>video-cache wrapper</AdSystem>\
         <VASTAdTagURI><![CDATA[{}]]></VASTAdTagURI>\
         {}\
         <Creatives></Creatives>\
         </Wrapper>\
         </Ad>\
         </VAST>",
        uri, impressions
    )
}

/// True if `value` can sit inside a CDATA section without terminating it.
pub fn is_cdata_safe(value: &str) -> bool {
    !value.contains(CDATA_END)
}
