use std::collections::BTreeSet;
use std::net::UdpSocket;
use std::sync::Arc;
use std::time::Duration;

use hostmon_core::Announcement;
use hostmon_services::{Admission, PresenceRegistry, UdpNotifier};

use crate::*;

fn host_a() -> Announcement {
    Announcement {
        id: "hostA".into(),
        address: "10.20.0.1".into(),
        active: true,
        architecture: "x86_64".into(),
        provides: BTreeSet::from(["build".to_string()]),
        operating_system: Some("Linux".into()),
        release: Some("6.8.0".into()),
    }
}

/// Advertise 500 ms, sweep 250 ms, deadline 1000 ms: hostA announces at
/// t=0, goes silent, is evicted by the sweep at t=1001, and comes back at
/// t=1200 as a new peer. The notifier sees online, offline, online.
#[test]
fn test_offline_then_reappear_scenario() {
    let sink = event_sink().unwrap();
    let notifier = UdpNotifier::bind(sink.local_addr().unwrap()).unwrap();
    let registry = PresenceRegistry::new(Arc::new(notifier));

    let wire = host_a().encode().unwrap();
    let ann = Announcement::decode(&wire).unwrap();
    assert_eq!(registry.admit_or_refresh_at(ann, 0).unwrap(), Admission::Added);
    let record = registry.get("hostA").unwrap();
    assert_eq!((record.first_seen, record.last_seen), (0, 0));

    let online = recv_json(&sink).unwrap();
    assert_eq!(online["status"], 1);
    assert_eq!(online["address"], "10.20.0.1");

    for t in [250, 500, 750, 1000] {
        assert!(registry.sweep(t, 1000).is_empty(), "evicted early at t={t}");
    }
    assert_eq!(registry.sweep(1001, 1000), vec!["hostA".to_string()]);
    assert!(registry.snapshot().is_empty());

    let offline = recv_json(&sink).unwrap();
    assert_eq!(offline["status"], 0);
    assert_eq!(offline["address"], "10.20.0.1");
    assert_eq!(offline["provider_architecture"], "x86_64");
    assert_eq!(offline["timestamp"], 1001);

    let ann = Announcement::decode(&wire).unwrap();
    assert_eq!(registry.admit_or_refresh_at(ann, 1200).unwrap(), Admission::Added);
    assert_eq!(registry.get("hostA").unwrap().first_seen, 1200);
    assert_eq!(recv_json(&sink).unwrap()["status"], 1);
}

/// Codec and registry over a real socket: datagrams the decoder rejects
/// never reach the registry, and the good ones collapse into one record.
#[test]
fn test_codec_and_registry_over_socket() {
    let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
    receiver
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
    let target = receiver.local_addr().unwrap();

    let good = host_a().encode().unwrap();
    let datagrams: [&[u8]; 6] = [&good, b"{", &good, br#"{"id":null}"#, br#"["hostA"]"#, &good];
    for d in &datagrams {
        sender.send_to(d, target).unwrap();
    }

    let registry = PresenceRegistry::new(Arc::new(hostmon_services::NullNotifier));
    let mut statuses = Vec::new();
    let mut buf = [0u8; hostmon_core::wire::MAX_DATAGRAM];
    for _ in 0..datagrams.len() {
        let (len, _) = receiver.recv_from(&mut buf).unwrap();
        if let Ok(ann) = Announcement::decode(&buf[..len]) {
            statuses.push(registry.admit_or_refresh(ann).unwrap());
        }
    }

    assert_eq!(
        statuses,
        vec![Admission::Added, Admission::Refreshed, Admission::Refreshed]
    );
    assert_eq!(registry.len(), 1);
}
