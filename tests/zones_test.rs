//! Zone resolution against a paged in-memory Cloud DNS

mod common;

use clouddns_webhook::error::Error;
use clouddns_webhook::zones::find_zone;
use common::{Call, FakeDns};

#[tokio::test]
async fn longest_suffix_wins_across_pages() {
    let fake = FakeDns::new(1);
    fake.add_zone("1", "example.com");
    fake.add_zone("2", "other.org");
    fake.add_zone("3", "sub.example.com");

    let zone = find_zone(fake.as_ref(), "api.sub.example.com.").await.unwrap();
    assert_eq!(zone.id, "3");

    // one page per zone, all drained
    let listings = fake.calls().iter().filter(|c| **c == Call::ListZones).count();
    assert_eq!(listings, 3);
}

#[tokio::test]
async fn label_boundary_is_respected() {
    let fake = FakeDns::new(10);
    fake.add_zone("1", "example.com");

    let err = find_zone(fake.as_ref(), "notexample.com").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert_eq!(err.to_string(), "no matching domain found for notexample.com");
}

#[tokio::test]
async fn apex_matches_its_zone() {
    let fake = FakeDns::new(10);
    fake.add_zone("1", "Example.com.");

    let zone = find_zone(fake.as_ref(), "EXAMPLE.COM").await.unwrap();
    assert_eq!(zone.id, "1");
}

#[tokio::test]
async fn empty_name_fails_without_calls() {
    let fake = FakeDns::new(10);
    fake.add_zone("1", "example.com");

    for name in ["", " ", "."] {
        let err = find_zone(fake.as_ref(), name).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)), "{name:?}");
    }
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn listing_failure_is_a_provider_error() {
    let fake = FakeDns::new(10);
    fake.add_zone("1", "example.com");
    fake.fail_listing();

    let err = find_zone(fake.as_ref(), "www.example.com").await.unwrap_err();
    assert!(matches!(err, Error::Provider { .. }));
    assert!(err.to_string().starts_with("failed to list domains"));
}
