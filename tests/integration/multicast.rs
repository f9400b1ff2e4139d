use std::collections::BTreeSet;

use hostmon_core::Announcement;

use crate::*;

/// An announcement multicast to the group is heard by a member socket on
/// the same host and decodes to what was sent.
#[test]
fn test_multicast_announcement_loopback() {
    let Some((receiver, group)) = multicast_receiver() else {
        eprintln!("SKIP: cannot join multicast group on this host");
        return;
    };
    let Some(sender) = multicast_sender() else {
        eprintln!("SKIP: cannot create multicast sender");
        return;
    };

    let ann = Announcement {
        id: "mcast-test".into(),
        address: "127.0.0.1".into(),
        active: true,
        architecture: "test".into(),
        provides: BTreeSet::from(["probe".to_string()]),
        operating_system: None,
        release: None,
    };

    if let Err(e) = sender.send_to(&ann.encode().unwrap(), group) {
        eprintln!("SKIP: multicast send failed: {e}");
        return;
    }

    let mut buf = [0u8; hostmon_core::wire::MAX_DATAGRAM];
    match receiver.recv_from(&mut buf) {
        Ok((len, _)) => assert_eq!(Announcement::decode(&buf[..len]).unwrap(), ann),
        Err(e) => eprintln!("SKIP: multicast loopback not delivered: {e}"),
    }
}
