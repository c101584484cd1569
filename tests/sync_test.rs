//! Change-set application against an in-memory Cloud DNS

mod common;

use clouddns_webhook::endpoint::Changes;
use clouddns_webhook::constants::MAX_COMMENT_LEN;
use clouddns_webhook::error::Operation;
use clouddns_webhook::sync::Synchronizer;
use common::{credentials, endpoint, fake_with_zones, Call};

fn create_call(zone_id: &str, name: &str, record_type: &str, data: &str, ttl: u32) -> Call {
    Call::Create {
        zone_id: zone_id.to_string(),
        name: name.to_string(),
        record_type: record_type.to_string(),
        data: data.to_string(),
        ttl: Some(ttl),
        comment: None,
    }
}

fn delete_call(zone_id: &str, record_id: &str) -> Call {
    Call::Delete {
        zone_id: zone_id.to_string(),
        record_id: record_id.to_string(),
    }
}

#[tokio::test]
async fn deletes_then_creates_then_updates() {
    let fake = fake_with_zones();
    let old = fake.add_record("1", "old.example.com", "A", "192.0.2.1");
    let upd = fake.add_record("1", "upd.example.com", "A", "192.0.2.5");
    let sync = Synchronizer::new(credentials(&fake), false);

    let changes = Changes {
        create: vec![endpoint("new.example.com.", "A", &["192.0.2.10"])],
        update_old: vec![endpoint("upd.example.com.", "A", &["192.0.2.5"])],
        update_new: vec![endpoint("upd.example.com.", "A", &["192.0.2.6"]).with_ttl(600)],
        delete: vec![endpoint("old.example.com.", "A", &["192.0.2.1"])],
    };
    sync.apply(&changes).await.unwrap();

    assert_eq!(
        fake.mutations(),
        vec![
            delete_call("1", &old),
            create_call("1", "new.example.com", "A", "192.0.2.10", 300),
            delete_call("1", &upd),
            create_call("1", "upd.example.com", "A", "192.0.2.6", 600),
        ]
    );
}

#[tokio::test]
async fn records_go_to_the_most_specific_zone() {
    let fake = fake_with_zones();
    let sync = Synchronizer::new(credentials(&fake), false);

    let changes = Changes {
        create: vec![endpoint("API.Sub.Example.com.", "cname", &["lb.example.net"]).with_ttl(60)],
        ..Default::default()
    };
    sync.apply(&changes).await.unwrap();

    assert_eq!(
        fake.mutations(),
        vec![create_call("2", "api.sub.example.com", "CNAME", "lb.example.net", 300)]
    );
}

#[tokio::test]
async fn failures_are_collected_without_stopping() {
    let fake = fake_with_zones();
    fake.fail_create_of("192.0.2.1");
    let sync = Synchronizer::new(credentials(&fake), false);

    let changes = Changes {
        create: vec![
            endpoint("a.example.com.", "A", &["192.0.2.1"]),
            endpoint("b.example.com.", "A", &["192.0.2.2"]),
        ],
        delete: vec![endpoint("c.example.org.", "A", &["192.0.2.3"])],
        ..Default::default()
    };
    let err = sync.apply(&changes).await.unwrap_err();

    assert_eq!(err.len(), 2);
    assert_eq!(err.failed_names(), vec!["c.example.org.", "a.example.com."]);
    assert_eq!(err.failures()[0].operation, Operation::Delete);
    assert_eq!(err.failures()[1].operation, Operation::Create);
    assert!(err.to_string().contains("no matching domain found for c.example.org"));

    // b was still created
    assert!(fake
        .records("1")
        .iter()
        .any(|r| r.name == "b.example.com" && r.data == "192.0.2.2"));
}

#[tokio::test]
async fn one_failed_create_is_reported_alone() {
    let fake = fake_with_zones();
    fake.fail_create_of("192.0.2.2");
    let sync = Synchronizer::new(credentials(&fake), false);

    let changes = Changes {
        create: vec![
            endpoint("a.example.com.", "A", &["192.0.2.1"]),
            endpoint("b.example.com.", "A", &["192.0.2.2"]),
            endpoint("c.example.com.", "A", &["192.0.2.3"]),
        ],
        ..Default::default()
    };
    let err = sync.apply(&changes).await.unwrap_err();

    assert_eq!(err.failed_names(), vec!["b.example.com."]);
    assert!(!err.to_string().contains("a.example.com"));
    assert!(!err.to_string().contains("c.example.com"));
    let names: Vec<String> = fake.records("1").into_iter().map(|r| r.name).collect();
    assert_eq!(names, vec!["a.example.com", "c.example.com"]);
}

#[tokio::test]
async fn dry_run_makes_no_provider_calls() {
    let fake = fake_with_zones();
    fake.add_record("1", "old.example.com", "A", "192.0.2.1");
    let sync = Synchronizer::new(credentials(&fake), true);

    let changes = Changes {
        create: vec![endpoint("new.example.com.", "A", &["192.0.2.10"])],
        update_new: vec![endpoint("old.example.com.", "A", &["192.0.2.2"])],
        delete: vec![endpoint("old.example.com.", "A", &["192.0.2.1"])],
        ..Default::default()
    };
    sync.apply(&changes).await.unwrap();
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn update_still_creates_when_delete_fails() {
    let fake = fake_with_zones();
    let existing = fake.add_record("1", "www.example.com", "A", "192.0.2.1");
    fake.fail_delete_of(&existing);
    let sync = Synchronizer::new(credentials(&fake), false);

    let changes = Changes {
        update_new: vec![endpoint("www.example.com.", "A", &["192.0.2.2"])],
        ..Default::default()
    };
    sync.apply(&changes).await.unwrap();

    assert_eq!(
        fake.mutations(),
        vec![
            delete_call("1", &existing),
            create_call("1", "www.example.com", "A", "192.0.2.2", 300),
        ]
    );
}

#[tokio::test]
async fn delete_continues_past_a_failed_record() {
    let fake = fake_with_zones();
    let first = fake.add_record("1", "www.example.com", "A", "192.0.2.1");
    let second = fake.add_record("1", "WWW.example.com.", "a", "192.0.2.2");
    let other_type = fake.add_record("1", "www.example.com", "AAAA", "2001:db8::1");
    fake.fail_delete_of(&first);
    let sync = Synchronizer::new(credentials(&fake), false);

    let changes = Changes {
        delete: vec![endpoint("www.example.com", "A", &["192.0.2.1", "192.0.2.2"])],
        ..Default::default()
    };
    let err = sync.apply(&changes).await.unwrap_err();

    assert_eq!(err.failed_names(), vec!["www.example.com"]);
    assert_eq!(
        fake.mutations(),
        vec![delete_call("1", &first), delete_call("1", &second)]
    );
    let remaining: Vec<String> = fake.records("1").into_iter().map(|r| r.id).collect();
    assert_eq!(remaining, vec![first, other_type]);
}

#[tokio::test]
async fn create_stops_at_first_failing_target() {
    let fake = fake_with_zones();
    fake.fail_create_of("192.0.2.2");
    let sync = Synchronizer::new(credentials(&fake), false);

    let changes = Changes {
        create: vec![endpoint(
            "multi.example.com.",
            "A",
            &["192.0.2.1", "192.0.2.2", "192.0.2.3"],
        )],
        ..Default::default()
    };
    let err = sync.apply(&changes).await.unwrap_err();

    assert_eq!(err.len(), 1);
    let created: Vec<Call> = fake.mutations();
    assert_eq!(created.len(), 2);
    assert!(!created.contains(&create_call("1", "multi.example.com", "A", "192.0.2.3", 300)));
}

#[tokio::test]
async fn txt_records_store_unquoted_data_and_labels() {
    let fake = fake_with_zones();
    let sync = Synchronizer::new(credentials(&fake), false);

    let changes = Changes {
        create: vec![endpoint(
            "_owner.example.com.",
            "TXT",
            &["\"heritage=external-dns,external-dns/owner=default\""],
        )
        .with_label("owner", "default")],
        ..Default::default()
    };
    sync.apply(&changes).await.unwrap();

    match &fake.mutations()[0] {
        Call::Create { data, comment, .. } => {
            assert_eq!(data, "heritage=external-dns,external-dns/owner=default");
            assert_eq!(comment.as_deref(), Some(r#"{"owner":"default"}"#));
        }
        other => panic!("unexpected call {other:?}"),
    }
}

#[tokio::test]
async fn empty_change_set_is_a_no_op() {
    let fake = fake_with_zones();
    let sync = Synchronizer::new(credentials(&fake), false);
    sync.apply(&Changes::default()).await.unwrap();
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn labels_are_stored_for_every_record_type() {
    let fake = fake_with_zones();
    let sync = Synchronizer::new(credentials(&fake), false);

    let changes = Changes {
        create: vec![endpoint("www.example.com.", "A", &["192.0.2.1"]).with_label("owner", "default")],
        ..Default::default()
    };
    sync.apply(&changes).await.unwrap();

    assert_eq!(
        fake.mutations(),
        vec![Call::Create {
            zone_id: "1".to_string(),
            name: "www.example.com".to_string(),
            record_type: "A".to_string(),
            data: "192.0.2.1".to_string(),
            ttl: Some(300),
            comment: Some(r#"{"owner":"default"}"#.to_string()),
        }]
    );
}

#[tokio::test]
async fn long_ownership_labels_fit_the_comment_limit() {
    let fake = fake_with_zones();
    let sync = Synchronizer::new(credentials(&fake), false);
    let name = format!("a-{}.{}.example.com.", "a".repeat(60), "b".repeat(60));

    let changes = Changes {
        create: vec![endpoint(&name, "TXT", &["\"heritage=external-dns,external-dns/owner=default\""])
            .with_label("owner", "default")
            .with_label("ownedRecord", name.clone())
            .with_label("resource", "ingress/default/web")],
        ..Default::default()
    };
    sync.apply(&changes).await.unwrap();

    match &fake.mutations()[0] {
        Call::Create { comment, .. } => {
            let comment = comment.as_deref().unwrap();
            assert!(comment.chars().count() <= MAX_COMMENT_LEN);
            assert!(comment.contains(r#""owner":"default""#));
        }
        other => panic!("unexpected call {other:?}"),
    }
}
