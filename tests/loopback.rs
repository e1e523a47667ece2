//! End-to-end exercises against a scripted fake gateway on UDP loopback:
//! ack/nack handling, solicited replies, sequence numbering, supervision
//! and node-list reconciliation.

use smol::net::UdpSocket;
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::Duration;
use zipcrab::command_class::basic::BasicReport;
use zipcrab::command_class::network_management_proxy::{NodeInfoCachedReport, NodeListReport};
use zipcrab::command_class::supervision::{SupervisionGet, SupervisionReport};
use zipcrab::command_class::switch_binary::SwitchBinaryReport;
use zipcrab::command_class::zip::{ZipKeepAlive, ZipPacket};
use zipcrab::command_class::zip_gateway::{GatewayMode, GatewayModeReport};
use zipcrab::command_class::zip_nd::ZipNodeAdvertisement;
use zipcrab::{
    Application, ApplicationListener, Command, Error, Node, ZipConnection, ZipGateway,
};

/// Tests touching the fixed Z/IP port must not overlap.
fn zip_port_guard() -> MutexGuard<'static, ()> {
    static GUARD: OnceLock<Mutex<()>> = OnceLock::new();

    GUARD
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|e| e.into_inner())
}

async fn bind_local() -> UdpSocket {
    UdpSocket::bind(SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 0))
        .await
        .expect("bind loopback")
}

async fn recv_command(socket: &UdpSocket) -> (Command, SocketAddr) {
    let mut buf = [0u8; 1500];
    let (len, from) = socket.recv_from(&mut buf).await.expect("recv");

    (Command::decode(&buf[..len]).expect("decode"), from)
}

/// An ack frame paired to `packet`.
fn ack_bytes(packet: &ZipPacket) -> Vec<u8> {
    Command::from(ZipPacket::response(true, packet))
        .compose()
        .expect("compose ack")
}

/// A solicited reply carrying `command`.
fn reply_bytes(seq_no: u8, command: Command) -> Vec<u8> {
    let packet = ZipPacket {
        secure_origin: true,
        seq_no,
        command: Some(Box::new(command)),
        ..ZipPacket::default()
    };

    Command::from(packet).compose().expect("compose reply")
}

#[test]
fn solicited_round_trip_and_sequence_numbers() {
    smol::block_on(async {
        let gateway_socket = bind_local().await;
        let gateway_addr = gateway_socket.local_addr().unwrap();

        let fake = smol::spawn(async move {
            let mut seen_seqs = Vec::new();

            for reply_seq in 0..3u8 {
                let (command, from) = recv_command(&gateway_socket).await;

                let Command::ZipPacket(packet) = command else {
                    panic!("expected ZIP_PACKET, got {}", command.name());
                };

                assert!(packet.ack_request);
                seen_seqs.push(packet.seq_no);

                gateway_socket
                    .send_to(&ack_bytes(&packet), from)
                    .await
                    .unwrap();

                let Some(inner) = packet.command else {
                    panic!("expected an embedded command");
                };

                let Command::NodeListGet(get) = *inner else {
                    panic!("expected NODE_LIST_GET");
                };

                let report = NodeListReport {
                    seq_no: get.seq_no,
                    status: 0,
                    node_list_controller_id: 1,
                    nodes: [1u8, 6].into_iter().collect(),
                };

                gateway_socket
                    .send_to(&reply_bytes(reply_seq, report.into()), from)
                    .await
                    .unwrap();
            }

            seen_seqs
        });

        let conn = ZipConnection::connect(gateway_addr, None).await.unwrap();

        for nm_seq in 1..=3u8 {
            let report: NodeListReport = conn
                .send_and_receive(
                    zipcrab::command_class::network_management_proxy::NodeListGet {
                        seq_no: nm_seq,
                    }
                    .into(),
                    Duration::from_secs(2),
                )
                .await
                .unwrap();

            assert_eq!(report.node_list_controller_id, 1);
            assert_eq!(report.nodes, [1u8, 6].into_iter().collect());
        }

        // Three sends with no interleaving: strictly monotone wire seqNos.
        assert_eq!(fake.await, vec![1, 2, 3]);

        conn.stop();
    });
}

#[test]
fn nack_waiting_extends_the_deadline() {
    smol::block_on(async {
        let gateway_socket = bind_local().await;
        let gateway_addr = gateway_socket.local_addr().unwrap();

        let fake = smol::spawn(async move {
            let (command, from) = recv_command(&gateway_socket).await;

            let Command::ZipPacket(packet) = command else {
                panic!("expected ZIP_PACKET");
            };

            // Nack-waiting well before the 300 ms deadline...
            let mut waiting = ZipPacket::response(false, &packet);

            waiting.nack_waiting = true;
            waiting.header_extension =
                zipcrab::command_class::zip::HeaderExtension::with_expected_delay(1);

            gateway_socket
                .send_to(&Command::from(waiting).compose().unwrap(), from)
                .await
                .unwrap();

            // ...and the ack only after it would have expired.
            smol::Timer::after(Duration::from_millis(600)).await;
            gateway_socket
                .send_to(&ack_bytes(&packet), from)
                .await
                .unwrap();
        });

        let conn = ZipConnection::connect(gateway_addr, None).await.unwrap();

        conn.send_with(
            zipcrab::command_class::basic::BasicGet.into(),
            0,
            0,
            Duration::from_millis(300),
        )
        .await
        .expect("queued send must resolve after the late ack");

        fake.await;

        conn.stop();
    });
}

#[test]
fn silent_peer_times_out() {
    smol::block_on(async {
        let gateway_socket = bind_local().await;
        let gateway_addr = gateway_socket.local_addr().unwrap();
        let conn = ZipConnection::connect(gateway_addr, None).await.unwrap();

        let outcome = conn
            .send_with(
                zipcrab::command_class::basic::BasicGet.into(),
                0,
                0,
                Duration::from_millis(100),
            )
            .await;

        assert_eq!(outcome, Err(Error::Timeout));

        conn.stop();
    });
}

#[test]
fn keep_alive_ping_is_answered() {
    smol::block_on(async {
        let gateway_socket = bind_local().await;
        let gateway_addr = gateway_socket.local_addr().unwrap();

        let fake = smol::spawn(async move {
            // Learn the client address from its first send, ack it.
            let (command, from) = recv_command(&gateway_socket).await;

            let Command::ZipPacket(packet) = command else {
                panic!("expected ZIP_PACKET");
            };

            gateway_socket
                .send_to(&ack_bytes(&packet), from)
                .await
                .unwrap();

            // Ping the client; expect the pong.
            gateway_socket
                .send_to(
                    &Command::from(ZipKeepAlive::ping()).compose().unwrap(),
                    from,
                )
                .await
                .unwrap();

            let (command, _) = recv_command(&gateway_socket).await;

            let Command::ZipKeepAlive(pong) = command else {
                panic!("expected ZIP_KEEP_ALIVE, got {}", command.name());
            };

            assert_eq!(pong, ZipKeepAlive::pong());
        });

        let conn = ZipConnection::connect(gateway_addr, None).await.unwrap();

        conn.send(zipcrab::command_class::basic::BasicGet.into())
            .await
            .unwrap();

        fake.await;

        conn.stop();
    });
}

/// Scripted gateway answering the handful of RPCs the supervision and
/// reconciliation flows need.
async fn run_fake_gateway(
    socket: UdpSocket,
    node_addresses: Vec<(u8, Ipv6Addr)>,
    node_list: Vec<u8>,
    unsolicited_port: Arc<Mutex<Option<u16>>>,
) {
    let mut seq = 0u8;

    loop {
        let (command, from) = recv_command(&socket).await;

        let Command::ZipPacket(packet) = command else {
            continue;
        };

        if packet.ack_request {
            let _ = socket.send_to(&ack_bytes(&packet), from).await;
        }

        let Some(inner) = packet.command else {
            continue;
        };

        seq = seq.wrapping_add(1);

        match *inner {
            Command::GatewayModeGet(_) => {
                let report = GatewayModeReport {
                    mode: GatewayMode::Standalone,
                };

                let _ = socket.send_to(&reply_bytes(seq, report.into()), from).await;
            }
            Command::NodeListGet(get) => {
                let report = NodeListReport {
                    seq_no: get.seq_no,
                    status: 0,
                    node_list_controller_id: 1,
                    nodes: node_list.iter().copied().collect(),
                };

                let _ = socket.send_to(&reply_bytes(seq, report.into()), from).await;
            }
            Command::UnsolicitedDestinationSet(set) => {
                *unsolicited_port.lock().unwrap() = Some(set.port);
            }
            Command::ZipInvNodeSolicitation(solicitation) => {
                let ipv6 = node_addresses
                    .iter()
                    .find(|(id, _)| *id == solicitation.node_id)
                    .map(|(_, addr)| *addr)
                    .unwrap_or(Ipv6Addr::LOCALHOST);
                let advertisement = ZipNodeAdvertisement {
                    local: false,
                    validity: 0,
                    node_id: solicitation.node_id,
                    ipv6,
                    home_id: zipcrab::wire::HomeId(0xc0febabe),
                };

                // Advertisements travel as bare frames.
                let _ = socket
                    .send_to(&Command::from(advertisement).compose().unwrap(), from)
                    .await;
            }
            Command::NodeInfoCachedGet(get) => {
                let report = NodeInfoCachedReport {
                    seq_no: get.seq_no,
                    listening: true,
                    ..NodeInfoCachedReport::default()
                };

                let _ = socket.send_to(&reply_bytes(seq, report.into()), from).await;
            }
            _ => {}
        }
    }
}

#[test]
fn supervision_wrap_over_the_wire() {
    let _port = zip_port_guard();

    smol::block_on(async {
        let gateway_socket = bind_local().await;
        let gateway_addr = gateway_socket.local_addr().unwrap();

        // The "node" lives on the fixed Z/IP port.
        let node_socket = UdpSocket::bind(SocketAddr::new(
            IpAddr::V6(Ipv6Addr::LOCALHOST),
            zipcrab::ZIP_PORT,
        ))
        .await
        .expect("bind 4123; is another stack running?");

        let fake = smol::spawn(run_fake_gateway(
            gateway_socket,
            vec![(6, Ipv6Addr::LOCALHOST)],
            vec![1, 6],
            Arc::new(Mutex::new(None)),
        ));

        let gateway = ZipGateway::connect(gateway_addr, None).await.unwrap();
        let node = Node::new(&gateway, 6, &[0x20]);

        // Handled inner command: BASIC_REPORT against a node supporting
        // BASIC.
        let get = SupervisionGet {
            status_updates: false,
            session_id: 3,
            command: Box::new(Command::from(BasicReport { value: 0xff })),
        };
        let dispatch = {
            let node = node.clone();

            smol::spawn(async move { node.handle_message(get.into()).await })
        };

        let (command, from) = recv_command(&node_socket).await;

        let Command::ZipPacket(packet) = command else {
            panic!("expected ZIP_PACKET at the node");
        };

        node_socket
            .send_to(&ack_bytes(&packet), from)
            .await
            .unwrap();

        let Some(report) = packet.command else {
            panic!("expected SUPERVISION_REPORT");
        };
        let report = SupervisionReport::try_from(*report).unwrap();

        assert_eq!(report.session_id, 3);
        assert_eq!(report.status, 0xff);
        assert_eq!(report.duration, 0);
        assert_eq!(dispatch.await, Ok(true));

        // The wrapped report also updated the class state.
        let value = node.with_class(0x20, |cc| match cc.state() {
            zipcrab::ClassState::Basic(state) => state.value,
            _ => None,
        });

        assert_eq!(value, Some(Some(0xff)));

        // Unhandled inner command: the node does not support
        // SWITCH_BINARY.
        let get = SupervisionGet {
            status_updates: false,
            session_id: 5,
            command: Box::new(Command::from(SwitchBinaryReport { value: 0x00 })),
        };
        let dispatch = {
            let node = node.clone();

            smol::spawn(async move { node.handle_message(get.into()).await })
        };

        let (command, from) = recv_command(&node_socket).await;

        let Command::ZipPacket(packet) = command else {
            panic!("expected ZIP_PACKET at the node");
        };

        node_socket
            .send_to(&ack_bytes(&packet), from)
            .await
            .unwrap();

        let report = SupervisionReport::try_from(*packet.command.unwrap()).unwrap();

        assert_eq!(report.session_id, 5);
        assert_eq!(report.status, 0x00);
        assert_eq!(dispatch.await, Err(Error::Unhandled));

        // Mailbox dedup: two pushes of the same payload, one queued entry,
        // one WAITING frame on the wire.
        let mailbox = Arc::new(zipcrab::MailboxService::new(&gateway));
        let payload = vec![0x20, 0x01, 0xff];
        let first = {
            let mailbox = Arc::clone(&mailbox);
            let payload = payload.clone();

            smol::spawn(async move { mailbox.push(6, 3, payload).await })
        };

        let (command, from) = recv_command(&node_socket).await;

        let Command::ZipPacket(packet) = command else {
            panic!("expected ZIP_PACKET at the node");
        };

        let queued = zipcrab::command_class::mailbox::MailboxQueue::try_from(
            *packet.command.clone().unwrap(),
        )
        .unwrap();

        assert_eq!(
            queued.operation,
            zipcrab::command_class::mailbox::QueueOperation::Waiting
        );
        assert_eq!(queued.queue_handle, 3);
        assert_eq!(queued.mailbox_entry, payload);

        node_socket
            .send_to(&ack_bytes(&packet), from)
            .await
            .unwrap();

        assert!(first.await);
        assert_eq!(mailbox.queue_len(3), 1);

        // The duplicate is rejected before anything hits the wire.
        assert!(!mailbox.push(6, 3, payload).await);
        assert_eq!(mailbox.queue_len(3), 1);

        mailbox.stop();
        drop(fake);
        gateway.stop();
    });
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl ApplicationListener for Recorder {
    async fn node_added(&self, _sender: Application, node: Node) {
        self.events
            .lock()
            .unwrap()
            .push(format!("node_added {:?}", node.id()));
    }

    async fn nodes_added(&self, _sender: Application, nodes: Vec<Node>) {
        let ids: Vec<(u8, u8)> = nodes.iter().map(Node::id).collect();

        self.events
            .lock()
            .unwrap()
            .push(format!("nodes_added {:?}", ids));
    }

    async fn node_removed(&self, _sender: Application, node_id: (u8, u8)) {
        self.events
            .lock()
            .unwrap()
            .push(format!("node_removed {:?}", node_id));
    }

    async fn nodes_removed(&self, _sender: Application, node_ids: Vec<(u8, u8)>) {
        self.events
            .lock()
            .unwrap()
            .push(format!("nodes_removed {:?}", node_ids));
    }
}

#[test]
fn unsolicited_node_list_reconciliation() {
    let _port = zip_port_guard();

    smol::block_on(async {
        let gateway_socket = bind_local().await;
        let gateway_addr = gateway_socket.local_addr().unwrap();
        let announced_port = Arc::new(Mutex::new(None));

        // Node 1 is the controller (that's us, as far as sender mapping
        // goes); node 3 sits at an address nobody will dial.
        let fake = smol::spawn(run_fake_gateway(
            gateway_socket,
            vec![
                (1, Ipv6Addr::LOCALHOST),
                (2, "fd00::2".parse().unwrap()),
                (3, "fd00::3".parse().unwrap()),
            ],
            vec![1, 3],
            Arc::clone(&announced_port),
        ));

        let gateway = ZipGateway::connect(gateway_addr, None).await.unwrap();
        let app = Application::new(gateway.clone());
        let recorder = Arc::new(Recorder::default());

        app.add_listener(&(Arc::clone(&recorder) as Arc<dyn ApplicationListener>));
        app.startup().await.expect("startup");

        // Startup built node 3 (node 1 is ourselves).
        assert_eq!(
            recorder.events.lock().unwrap().clone(),
            vec![
                "nodes_added [(3, 0)]".to_owned(),
                "node_added (3, 0)".to_owned()
            ]
        );
        assert!(app.node(3, 0).is_some());

        recorder.events.lock().unwrap().clear();

        // An unsolicited NODE_LIST_REPORT now claims {1, 2}: node 3 left,
        // node 2 joined.
        let port = announced_port
            .lock()
            .unwrap()
            .expect("startup announced the unsolicited destination");
        let report = NodeListReport {
            seq_no: 9,
            status: 0,
            node_list_controller_id: 1,
            nodes: [1u8, 2].into_iter().collect(),
        };
        let push = reply_bytes(0x42, report.into());
        let pusher = bind_local().await;

        pusher
            .send_to(
                &push,
                SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), port),
            )
            .await
            .unwrap();

        // Reconciliation churns through UDP round trips; poll for the
        // final event.
        for _ in 0..200 {
            if recorder.events.lock().unwrap().len() >= 4 {
                break;
            }

            smol::Timer::after(Duration::from_millis(25)).await;
        }

        assert_eq!(
            recorder.events.lock().unwrap().clone(),
            vec![
                "node_removed (3, 0)".to_owned(),
                "nodes_removed [(3, 0)]".to_owned(),
                "nodes_added [(2, 0)]".to_owned(),
                "node_added (2, 0)".to_owned()
            ]
        );
        assert!(app.node(3, 0).is_none());
        assert!(app.node(2, 0).is_some());

        drop(fake);
        app.shutdown().await;
    });
}
