use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::Arc;

use matches::assert_matches;

use crate::att::{ErrorCode, Handle};
use crate::gap::{ConnInfo, Uuid};
use crate::hci::{ConnHandle, Status};
use crate::host::{
    Access, AccessOp, AttrId, Error, GapEvent, GapHandler, GapReply, HsError, Mbuf, PasskeyAction,
    PasskeyIo, TxStatus,
};
use crate::testing::{addr, conn, uuid, Call, FakeHost};
use crate::{Config, Device};

use super::*;

#[derive(Debug, Default)]
struct Counter {
    reads: AtomicUsize,
    writes: AtomicUsize,
    status: AtomicUsize,
    sub: AtomicU16,
}

impl CharacteristicCallbacks for Counter {
    fn on_read(&self, _: &Characteristic, _: &ConnInfo) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    fn on_write(&self, _: &Characteristic, _: &ConnInfo) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    fn on_status(&self, _: &Characteristic, _: TxStatus) {
        self.status.fetch_add(1, Ordering::Relaxed);
    }

    fn on_subscribe(&self, _: &Characteristic, _: &ConnInfo, sub_value: u16) {
        self.sub.store(sub_value, Ordering::Relaxed);
    }
}

struct Fixture {
    host: Arc<FakeHost>,
    dev: Device,
    srv: Arc<Server>,
}

impl Fixture {
    fn new() -> Self {
        Self::with_config(Config::default())
    }

    fn with_config(cfg: Config) -> Self {
        let host = FakeHost::new();
        let dev = Device::new(Arc::clone(&host) as _, cfg);
        dev.on_sync();
        let srv = dev.create_server();
        Self {
            host,
            dev,
            srv,
        }
    }

    /// Starts advertising and accepts a connection.
    fn connect(&self, peer: u8) -> ConnHandle {
        assert!(self.srv.start_advertising(None));
        self.host.accept(addr(peer))
    }

    /// Creates a started service with one characteristic.
    fn service(&self, props: Props, max_len: usize) -> (Arc<Service>, Arc<Characteristic>, Arc<Counter>) {
        let svc = self.srv.create_service(uuid(0xDEAD));
        let chr = svc.create_characteristic(uuid(0xBEEF), props, max_len);
        let cb = Arc::new(Counter::default());
        chr.set_callbacks(Arc::clone(&cb) as _);
        assert!(self.srv.start().is_ok());
        (svc, chr, cb)
    }

    fn count(&self, f: impl Fn(&Call) -> bool) -> usize {
        self.host.count(f)
    }
}

#[test]
fn start_service() {
    let f = Fixture::new();
    let svc = f.srv.create_service("DEAD".parse().unwrap());
    let chr = svc.create_characteristic("BEEF".parse().unwrap(), Props::READ_WRITE, 20);
    assert!(!svc.is_started());
    assert!(svc.start());
    assert!(svc.is_started());
    assert!(Arc::ptr_eq(&svc.characteristic(uuid(0xBEEF)).unwrap(), &chr));
    assert_eq!(chr.handle(), None);

    assert!(f.srv.start().is_ok());
    assert!(f.srv.is_started());
    assert_eq!(chr.handle(), f.host.chr_handle(uuid(0xDEAD), uuid(0xBEEF)));
    assert!(svc.handle().is_some());
    assert!(Arc::ptr_eq(&f.srv.characteristic_by_handle(chr.handle().unwrap()).unwrap(), &chr));
}

#[test]
fn idempotent_start() {
    let f = Fixture::new();
    let svc = f.srv.create_service(uuid(0xDEAD));
    svc.create_characteristic(uuid(0xBEEF), Props::READ, 4);
    assert!(svc.start());
    assert!(svc.start());
    assert_eq!(f.count(|c| matches!(c, Call::AddSvcs(_))), 1);
    assert!(f.srv.start().is_ok());
    assert!(svc.start());
    assert_eq!(f.count(|c| matches!(c, Call::AddSvcs(_))), 1);
    assert_eq!(f.count(|c| *c == Call::GattsStart), 1);
}

#[test]
fn rebuild_keeps_handles() {
    let f = Fixture::new();
    let svc = f.srv.create_service(uuid(0xDEAD));
    let chr = svc.create_characteristic(uuid(0xBEEF), Props::READ | Props::NOTIFY, 4);
    let d = chr.create_descriptor(uuid(0x2901), Props::READ, 8);
    assert!(f.srv.start().is_ok());
    let (sh, ch, dh) = (svc.handle(), chr.handle(), d.handle());
    assert!(sh.is_some() && ch.is_some() && dh.is_some());

    assert!(f.srv.reset_gatt());
    assert_eq!(f.count(|c| *c == Call::GattsReset), 1);
    assert_eq!((svc.handle(), chr.handle(), d.handle()), (sh, ch, dh));
    let found = f.srv.service(uuid(0xDEAD)).unwrap().characteristic(uuid(0xBEEF));
    assert!(Arc::ptr_eq(&found.unwrap(), &chr));
}

#[test]
fn rebuild_refused_while_connected() {
    let f = Fixture::new();
    let (svc, chr, _) = f.service(Props::READ, 4);
    let cn = f.connect(1);
    svc.remove_characteristic(&chr, true);
    assert!(f.srv.is_changed());

    assert!(!f.srv.reset_gatt());
    assert!(f.srv.is_changed());
    assert_eq!(f.count(|c| *c == Call::GattsReset), 0);
    assert_eq!(f.srv.connected_count(), 1);
    assert_eq!(f.srv.peer_devices(), vec![cn]);
}

#[test]
fn read_once_per_procedure() {
    let f = Fixture::new();
    let (_, chr, cb) = f.service(Props::READ, 64);
    let v: Vec<u8> = (0..50).collect();
    assert!(chr.set_value(&v));
    let cn = f.connect(1);

    // ATT_MTU 23 splits 50 bytes into 22 + 22 + 6
    assert_eq!(f.srv.peer_mtu(cn), 23);
    let h = chr.handle().unwrap();
    assert_eq!(f.host.peer_read(&f.srv, cn, h), Ok(v));
    assert_eq!(cb.reads.load(Ordering::Relaxed), 1);

    f.host.peer_read(&f.srv, cn, h).unwrap();
    assert_eq!(cb.reads.load(Ordering::Relaxed), 2);
}

#[test]
fn write_reassembly() {
    let f = Fixture::new();
    let (_, chr, cb) = f.service(Props::READ_WRITE, 16);
    let cn = f.connect(1);
    let h = chr.handle().unwrap();
    assert_eq!(f.host.peer_write(&f.srv, cn, h, &[b"hello ", b"world"]), Ok(()));
    assert_eq!(chr.value(), *b"hello world");
    assert_eq!(cb.writes.load(Ordering::Relaxed), 1);
}

#[test]
fn oversized_write() {
    let f = Fixture::new();
    let (_, chr, cb) = f.service(Props::READ_WRITE, 8);
    assert!(chr.set_value(b"old"));
    let cn = f.connect(1);
    let h = chr.handle().unwrap();
    assert_eq!(
        f.host.peer_write(&f.srv, cn, h, &[b"12345", b"6789"]),
        Err(ErrorCode::InvalidAttributeValueLength)
    );
    assert_eq!(chr.value(), *b"old");
    assert_eq!(cb.writes.load(Ordering::Relaxed), 0);
    assert!(!chr.set_value(b"123456789"));
    assert_eq!(chr.data_len(), 3);
}

#[test]
fn unknown_attribute() {
    let f = Fixture::new();
    let (_, chr, _) = f.service(Props::READ, 8);
    let mut om = Mbuf::new(8);
    let mut ctxt = Access {
        op: AccessOp::ReadChr,
        offset: 0,
        om: &mut om,
    };
    let h = chr.handle().unwrap();
    assert_eq!(
        f.srv.handle_access(None, h, AttrId::next(), &mut ctxt),
        Err(ErrorCode::InvalidHandle)
    );
}

#[test]
fn notify_current_value() {
    let f = Fixture::new();
    let (_, chr, cb) = f.service(Props::READ | Props::NOTIFY, 8);
    let cn = f.connect(1);
    let h = chr.handle().unwrap();
    f.host.clear_calls();

    assert!(chr.notify());
    assert_eq!(f.host.calls(), vec![Call::ChrUpdated(h)]);
    assert_eq!(cb.status.load(Ordering::Relaxed), 0);

    f.host.deliver(
        cn,
        &GapEvent::NotifyTx {
            conn: cn,
            attr: h,
            status: TxStatus::Sent,
            indication: false,
        },
    );
    assert_eq!(cb.status.load(Ordering::Relaxed), 1);
}

#[test]
fn notify_explicit_value() {
    let f = Fixture::new();
    let (_, chr, cb) = f.service(Props::READ | Props::INDICATE, 8);
    let (c1, c2) = (f.connect(1), f.connect(2));
    let h = chr.handle().unwrap();
    f.host.clear_calls();

    assert!(chr.indicate_value(b"hi", None));
    assert_eq!(
        f.host.calls(),
        vec![
            Call::Indicate(c1, h, Some(b"hi".to_vec())),
            Call::Indicate(c2, h, Some(b"hi".to_vec())),
        ]
    );
    assert!(chr.indicate_value(b"", Some(c2)));
    assert_eq!(f.host.calls().last(), Some(&Call::Indicate(c2, h, None)));

    // Indications report only the final status
    let tx = |status| GapEvent::NotifyTx {
        conn: c1,
        attr: h,
        status,
        indication: true,
    };
    f.host.deliver(c1, &tx(TxStatus::Sent));
    assert_eq!(cb.status.load(Ordering::Relaxed), 0);
    f.host.deliver(c1, &tx(TxStatus::Acked));
    assert_eq!(cb.status.load(Ordering::Relaxed), 1);
}

#[test]
fn unregistered_send() {
    let f = Fixture::new();
    let svc = f.srv.create_service(uuid(0xDEAD));
    let chr = svc.create_characteristic(uuid(0xBEEF), Props::NOTIFY, 8);
    assert!(!chr.notify());
    assert_eq!(f.count(|c| matches!(c, Call::ChrUpdated(_))), 0);
}

#[test]
fn delete_deferred_until_disconnect() {
    let f = Fixture::new();
    let (svc, chr, _) = f.service(Props::READ, 8);
    let keep = svc.create_characteristic(uuid(0xCAFE), Props::READ, 8);
    assert!(f.srv.is_changed());
    // Advertising rebuilds the database while no peers are connected
    let cn = f.connect(1);
    assert_eq!(f.count(|c| *c == Call::GattsReset), 1);
    assert!(!f.srv.is_changed());
    assert!(keep.handle().is_some());
    f.host.clear_calls();

    svc.remove_characteristic(&chr, true);
    assert!(f.srv.is_changed());
    assert_eq!(chr.removal(), Removal::PendingDelete);
    assert!(svc.characteristics().iter().any(|c| Arc::ptr_eq(c, &chr)));

    f.host.drop_conn(cn, Error::Hci(Status::RemoteUserTerminatedConnection));
    assert_eq!(f.count(|c| *c == Call::GattsReset), 1);
    assert_eq!(f.count(|c| *c == Call::SvcChanged), 1);
    assert!(!f.srv.is_changed());
    assert!(f.srv.is_started());
    assert!(!svc.characteristics().iter().any(|c| Arc::ptr_eq(c, &chr)));
    assert_eq!(chr.handle(), None);
    assert!(keep.handle().is_some());
    assert_eq!(svc.characteristic(uuid(0xBEEF)).map(|c| c.uuid()), None);
}

#[test]
fn hide_and_restore() {
    let f = Fixture::new();
    let (svc, chr, _) = f.service(Props::READ, 8);
    let sh = svc.handle().unwrap();
    assert!(f.srv.remove_service(&svc, false));
    assert_eq!(svc.removal(), Removal::Hidden);
    assert_eq!(f.host.calls().last(), Some(&Call::SetVisibility(sh, false)));

    // A hidden service stays registered and hidden after a rebuild
    f.host.clear_calls();
    assert!(f.srv.reset_gatt());
    assert_eq!(f.srv.services().len(), 1);
    assert_eq!(f.count(|c| *c == Call::SetVisibility(sh, false)), 1);
    assert_eq!(svc.handle(), Some(sh));
    assert!(chr.handle().is_some());

    f.srv.add_service(&svc);
    assert_eq!(svc.removal(), Removal::Live);
    assert!(f.srv.is_changed());
}

#[test]
fn duplicate_services() {
    let f = Fixture::new();
    let a = f.srv.create_service(uuid(0x180F));
    let b = f.srv.create_service(uuid(0x180F));
    assert!(Arc::ptr_eq(&f.srv.service_by_uuid(uuid(0x180F), 0).unwrap(), &a));
    assert!(Arc::ptr_eq(&f.srv.service_by_uuid(uuid(0x180F), 1).unwrap(), &b));
    assert!(f.srv.service_by_uuid(uuid(0x180F), 2).is_none());
    assert_eq!(f.srv.services_by_uuid(uuid(0x180F)).len(), 2);

    // Never registered, so deleted immediately
    assert!(f.srv.remove_service(&b, true));
    assert_eq!(f.srv.services().len(), 1);
}

#[test]
fn subscribe() {
    let f = Fixture::new();
    let (_, chr, cb) = f.service(Props::READ | Props::NOTIFY | Props::INDICATE, 8);
    let cn = f.connect(1);
    let h = chr.handle().unwrap();
    let sub = |n, i| GapEvent::Subscribe {
        conn: cn,
        attr: h,
        prev_notify: false,
        cur_notify: n,
        prev_indicate: false,
        cur_indicate: i,
    };
    f.host.deliver(cn, &sub(true, true));
    assert_eq!(cb.sub.load(Ordering::Relaxed), 3);
    assert_eq!(chr.subscribers(), vec![(cn, 3)]);
    assert_eq!(f.count(|c| matches!(c, Call::SecurityInitiate(_))), 0);

    f.host.deliver(cn, &sub(false, false));
    assert_eq!(cb.sub.load(Ordering::Relaxed), 0);
    assert!(chr.subscribers().is_empty());

    f.host.deliver(cn, &sub(true, false));
    f.host.drop_conn(cn, Error::Hci(Status::RemoteUserTerminatedConnection));
    assert!(chr.subscribers().is_empty());
}

#[test]
fn subscribe_secured() {
    let f = Fixture::new();
    let (_, chr, _) = f.service(Props::READ_ENC | Props::NOTIFY, 8);
    let cn = f.connect(1);
    f.host.deliver(
        cn,
        &GapEvent::Subscribe {
            conn: cn,
            attr: chr.handle().unwrap(),
            prev_notify: false,
            cur_notify: true,
            prev_indicate: false,
            cur_indicate: false,
        },
    );
    assert_eq!(f.count(|c| *c == Call::SecurityInitiate(cn)), 1);
    assert_eq!(chr.subscribers(), vec![(cn, 1)]);
}

#[test]
fn peer_table_full() {
    let f = Fixture::with_config(Config {
        max_connections: 1,
        ..Config::default()
    });
    f.service(Props::READ, 8);
    let c1 = f.connect(1);
    let c2 = f.connect(2);
    assert_eq!(
        f.count(|c| *c == Call::Terminate(c2, Status::RemoteDeviceTerminatedConnectionDueToLowResources)),
        1
    );
    assert_eq!(f.srv.peer_devices(), vec![c1]);
    assert_eq!(f.srv.peer_info(0).map(|i| i.handle), Some(c1));
    assert!(f.srv.peer_info(1).is_none());
}

#[test]
fn advertise_on_disconnect() {
    let f = Fixture::new();
    f.service(Props::READ, 8);
    let cn = f.connect(1);
    assert!(!f.srv.is_advertising());
    f.host.drop_conn(cn, Error::Hci(Status::RemoteUserTerminatedConnection));
    assert!(f.srv.is_advertising());

    f.srv.advertise_on_disconnect(false);
    let cn = f.host.accept(addr(2));
    f.host.drop_conn(cn, Error::Hci(Status::RemoteUserTerminatedConnection));
    assert!(!f.srv.is_advertising());
}

#[test]
fn host_reset_on_disconnect() {
    let f = Fixture::new();
    let resets = Arc::new(AtomicUsize::new(0));
    let r = Arc::clone(&resets);
    f.dev.set_reset_callback(move |_| {
        r.fetch_add(1, Ordering::Relaxed);
    });
    f.service(Props::READ, 8);
    let cn = f.connect(1);
    f.host.drop_conn(cn, Error::Host(HsError::Controller));
    assert_eq!(resets.load(Ordering::Relaxed), 1);
    assert!(!f.dev.is_synced());
    assert!(!f.srv.is_advertising());
}

#[test]
fn passkey() {
    struct Pin;
    impl ServerCallbacks for Pin {
        fn on_passkey_display(&self) -> u32 {
            654_321
        }

        fn on_confirm_passkey(&self, _: &ConnInfo, pin: u32) -> bool {
            pin == 42
        }
    }
    let f = Fixture::new();
    f.srv.set_callbacks(Arc::new(Pin));
    f.service(Props::READ, 8);
    let cn = f.connect(1);
    let act = |action| GapEvent::PasskeyAction { conn: cn, action };
    f.host.deliver(cn, &act(PasskeyAction::Display));
    f.host.deliver(cn, &act(PasskeyAction::NumericComparison(42)));
    f.host.deliver(cn, &act(PasskeyAction::NumericComparison(7)));
    f.host.deliver(cn, &act(PasskeyAction::Oob));
    let io: Vec<_> = (f.host.calls().into_iter())
        .filter_map(|c| match c {
            Call::InjectIo(_, io) => Some(io),
            _ => None,
        })
        .collect();
    assert_eq!(
        io,
        vec![
            PasskeyIo::Display(654_321),
            PasskeyIo::NumericComparison(true),
            PasskeyIo::NumericComparison(false),
        ]
    );
}

#[test]
fn static_passkey() {
    let f = Fixture::with_config(Config {
        passkey: 111_111,
        ..Config::default()
    });
    f.service(Props::READ, 8);
    let cn = f.connect(1);
    f.host.deliver(
        cn,
        &GapEvent::PasskeyAction {
            conn: cn,
            action: PasskeyAction::Display,
        },
    );
    assert_eq!(f.count(|c| *c == Call::InjectIo(cn, PasskeyIo::Display(111_111))), 1);
}

#[test]
fn repeat_pairing() {
    let f = Fixture::new();
    f.service(Props::READ, 8);
    let cn = f.connect(1);
    let r = f.host.deliver(cn, &GapEvent::RepeatPairing { conn: cn });
    assert_matches!(r, GapReply::RetryPairing);
    assert_eq!(f.count(|c| *c == Call::DeletePeer(addr(1))), 1);
    assert_matches!(f.srv.handle_gap_event(&GapEvent::RepeatPairing { conn: conn(99) }), GapReply::IgnorePairing);
}

#[test]
fn descriptor_access() {
    struct Dsc(AtomicUsize);
    impl DescriptorCallbacks for Dsc {
        fn on_write(&self, _: &Descriptor, _: &ConnInfo) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }
    let f = Fixture::new();
    let svc = f.srv.create_service(uuid(0xDEAD));
    let chr = svc.create_characteristic(uuid(0xBEEF), Props::READ, 8);
    let d = chr.create_descriptor(uuid(0x2901), Props::READ_WRITE, 16);
    let cb = Arc::new(Dsc(AtomicUsize::new(0)));
    d.set_callbacks(Arc::clone(&cb) as _);
    assert!(d.set_value(b"desc"));
    assert!(f.srv.start().is_ok());
    let cn = f.connect(1);

    let h: Handle = d.handle().unwrap();
    assert!(Arc::ptr_eq(&chr.descriptor_by_handle(h).unwrap(), &d));
    assert_eq!(f.host.peer_read(&f.srv, cn, h), Ok(b"desc".to_vec()));
    assert_eq!(f.host.peer_write(&f.srv, cn, h, &[b"new"]), Ok(()));
    assert_eq!(d.value(), *b"new");
    assert_eq!(cb.0.load(Ordering::Relaxed), 1);
}

#[test]
fn parse_uuid() {
    let u: Uuid = "0000dead-0000-1000-8000-00805f9b34fb".parse().unwrap();
    assert_eq!(u, uuid(0xDEAD));
}
