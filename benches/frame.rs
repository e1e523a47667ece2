use criterion::{criterion_group, criterion_main, Criterion};
use zipcrab::command_class::network_management_proxy::NodeListGet;
use zipcrab::command_class::zip::ZipPacket;
use zipcrab::Command;

const NODE_LIST_REPORT: &[u8] = &[
    0x52, 0x02, 0x02, 0x00, 0x01, 0x21, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00,
];

pub fn decode_node_list(c: &mut Criterion) {
    c.bench_function("decode node list report", |b| {
        b.iter(|| Command::decode(NODE_LIST_REPORT).unwrap())
    });
}

pub fn compose_zip_packet(c: &mut Criterion) {
    let packet = ZipPacket::request(2, 0, 0, Command::from(NodeListGet { seq_no: 2 }));
    let command = Command::from(packet);

    c.bench_function("compose zip packet", |b| {
        b.iter(|| command.compose().unwrap())
    });
}

criterion_group!(frame, decode_node_list, compose_zip_packet);
criterion_main!(frame);
