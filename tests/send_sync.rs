//! Send/Sync guarantees for core types.

use kafka_log_shipper::{
    kafka_transport::DeliveryReporter, test_utils::MemoryBroker, KafkaTransport, LogRecord,
    OutboundMessage, Serialiser, SharedValue, TransportBuilder, TransportConfig,
};
use rstest::rstest;
use static_assertions::assert_impl_all;

#[rstest]
fn builders_are_send_sync() {
    assert_impl_all!(TransportBuilder: Send, Sync);
    assert_impl_all!(TransportConfig: Send, Sync);
}

#[rstest]
fn components_are_send_sync() {
    assert_impl_all!(KafkaTransport: Send, Sync);
    assert_impl_all!(DeliveryReporter: Send, Sync);
    assert_impl_all!(Serialiser: Send, Sync);
    assert_impl_all!(MemoryBroker: Send, Sync);
}

#[rstest]
fn records_cross_threads() {
    assert_impl_all!(LogRecord: Send, Sync);
    assert_impl_all!(SharedValue: Send, Sync);
    assert_impl_all!(OutboundMessage: Send, Sync);
}
