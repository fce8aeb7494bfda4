//! `channel_policy` 集成测试：验证通道已满策略、池耗尽与读取错误的可观测性。
//!
//! # 测试目标（Why）
//! - `Block` 策略下满通道形成背压而非丢包，`Drop` 策略下丢包被计数且槽位立即归还；
//! - 漏调 `data_recd` 不会报错，只会表现为泵循环饥饿，需要通过统计观测；
//! - 超长报文与外来缓冲都被计数，且不影响后续报文。

use std::time::Duration;

use spanport_server::{
    FullChannelPolicy, PooledServer, QueueHandle, QueueSource, ReadBuf, Server, ServerConfig,
};
use tokio::time::{sleep, timeout};

const WAIT: Duration = Duration::from_secs(2);

fn server_with(config: ServerConfig) -> (QueueHandle, PooledServer<QueueSource>) {
    let (handle, source) = QueueSource::unbounded();
    let server = PooledServer::new(config, source).expect("合法配置");
    (handle, server)
}

async fn eventually(mut condition: impl FnMut() -> bool, what: &str) {
    timeout(WAIT, async {
        while !condition() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("超时仍未满足：{what}"));
}

/// `Block` 策略：通道填满后泵循环等待，消费者腾出空间后继续推送，全程不丢包。
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn block_policy_applies_backpressure() {
    let (handle, server) = server_with(
        ServerConfig::default()
            .with_queue_size(2)
            .with_max_packet_size(16),
    );
    server.serve();
    for i in 0..5u8 {
        assert!(handle.submit(vec![i]).await);
    }

    let chan = server.data_chan();
    eventually(|| chan.len() == 2, "通道被填满").await;
    sleep(Duration::from_millis(30)).await;
    let stats = server.stats();
    assert_eq!(stats.packets_processed, 2);
    assert_eq!(stats.packets_dropped, 0);

    let mut order = Vec::new();
    for _ in 0..5 {
        let buf = timeout(WAIT, chan.recv())
            .await
            .expect("背压解除后应继续送达")
            .expect("通道打开");
        order.push(buf.get_bytes()[0]);
        server.data_recd(buf);
    }
    assert_eq!(order, vec![0, 1, 2, 3, 4], "单个泵循环保持注入顺序");
    assert_eq!(server.stats().packets_processed, 5);
    server.stop();
}

/// `Drop` 策略：通道已满时报文被丢弃并计数，槽位立即回到池中。
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn drop_policy_discards_when_full() {
    let (handle, server) = server_with(
        ServerConfig::default()
            .with_queue_size(1)
            .with_max_packet_size(16)
            .with_full_channel_policy(FullChannelPolicy::Drop),
    );
    server.serve();
    for i in 0..4u8 {
        assert!(handle.submit(vec![i]).await);
    }

    eventually(
        || {
            let stats = server.stats();
            stats.packets_processed + stats.packets_dropped == 4
        },
        "全部报文被处理或丢弃",
    )
    .await;
    let stats = server.stats();
    assert_eq!(stats.packets_processed, 1);
    assert_eq!(stats.packets_dropped, 3);

    let chan = server.data_chan();
    let kept = chan.try_recv().expect("首个报文保留在通道中");
    assert_eq!(kept.get_bytes(), &[0]);
    server.data_recd(kept);

    server.stop();
    timeout(WAIT, server.wait_stopped())
        .await
        .expect("泵循环应退出");
    assert_eq!(server.stats().pool.outstanding, 0, "丢弃路径不得泄漏槽位");
}

/// 消费者收下缓冲却不确认：池耗尽后泵循环停止产出，确认后恢复。
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn withheld_acknowledgements_starve_the_pump() {
    let (handle, server) = server_with(
        ServerConfig::default()
            .with_queue_size(8)
            .with_max_packet_size(16)
            .with_pool_size(2),
    );
    server.serve();
    for i in 0..5u8 {
        assert!(handle.submit(vec![i]).await);
    }

    let chan = server.data_chan();
    let mut held = Vec::new();
    for _ in 0..2 {
        held.push(
            timeout(WAIT, chan.recv())
                .await
                .expect("池内两个槽位应被送达")
                .expect("通道打开"),
        );
    }
    sleep(Duration::from_millis(50)).await;
    assert!(chan.try_recv().is_none(), "池耗尽时不应再有缓冲送达");
    let stats = server.stats();
    assert_eq!(stats.pool.outstanding, 2);
    assert!(stats.pool.acquire_waits >= 1);
    assert_eq!(handle.backlog(), 3);

    for buf in held.drain(..) {
        server.data_recd(buf);
    }
    for _ in 0..3 {
        let buf = timeout(WAIT, chan.recv())
            .await
            .expect("确认后泵循环应恢复")
            .expect("通道打开");
        server.data_recd(buf);
    }
    assert_eq!(server.stats().packets_processed, 5);
    server.stop();
}

/// 超长报文计为读取错误，后续报文不受影响。
#[tokio::test]
async fn oversized_packets_count_as_read_errors() {
    let (handle, server) = server_with(
        ServerConfig::default()
            .with_queue_size(4)
            .with_max_packet_size(4),
    );
    server.serve();
    assert!(handle.submit(vec![0u8; 8]).await);
    assert!(handle.submit(&b"ok"[..]).await);

    let chan = server.data_chan();
    let buf = timeout(WAIT, chan.recv())
        .await
        .expect("合法报文应送达")
        .expect("通道打开");
    assert_eq!(buf.get_bytes(), b"ok");
    server.data_recd(buf);

    let stats = server.stats();
    assert_eq!(stats.read_errors, 1);
    assert_eq!(stats.packets_processed, 1);
    server.stop();
}

/// 外来缓冲交给 `data_recd` 会被拒绝，池状态不变。
#[test]
fn foreign_buffer_is_rejected_by_data_recd() {
    let (_handle, server) = server_with(
        ServerConfig::default()
            .with_queue_size(1)
            .with_max_packet_size(4),
    );
    let before = server.stats().pool;
    server.data_recd(ReadBuf::with_capacity(4));

    let after = server.stats().pool;
    assert_eq!(after.rejected, 1);
    assert_eq!(after.free_slots, before.free_slots);
}
