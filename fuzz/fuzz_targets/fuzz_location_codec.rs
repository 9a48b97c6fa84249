#![no_main]

use arbitrary::Arbitrary;
use fhist_core::location::{
    RawLocation, create_href, decode_location, encode_url, hash_base, normalize_base,
};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    base: Option<&'a str>,
    base_href: Option<&'a str>,
    hosted: bool,
    pathname: &'a str,
    search: &'a str,
    hash: &'a str,
    has_base_element: bool,
}

fuzz_target!(|input: Input<'_>| {
    let origin = if input.hosted { "https://example.com" } else { "" };
    let raw = RawLocation::new(origin, input.pathname, input.search, input.hash);

    // Normalization never panics and always yields a rooted base.
    let base = normalize_base(input.base, input.base_href);
    assert!(
        base.is_empty() || base.starts_with('/') || base.starts_with('#'),
        "unrooted base {base:?}"
    );

    let location = decode_location(&base, &raw);
    if base.contains('#') {
        assert!(location.starts_with('/'), "hash location {location:?} not rooted");
    }
    let _ = encode_url(&base, &location, &raw, input.has_base_element);
    let _ = create_href(&base, &location);

    let hashed = hash_base(input.base, &raw);
    assert!(hashed.contains('#'), "hash base {hashed:?} lacks marker");
    let hashed = normalize_base(Some(&hashed), None);
    assert!(decode_location(&hashed, &raw).starts_with('/'));
});
