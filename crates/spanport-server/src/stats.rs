use core::sync::atomic::{AtomicU64, Ordering};

use spanport_buffer::PoolStats;

/// 池化服务的统计快照。
///
/// - `packets_processed`：成功送入数据通道的报文数；
/// - `packets_dropped`：因通道已满被 `Drop` 策略丢弃的报文数；
/// - `read_errors`：来源返回 I/O 错误或超长报文的次数；
/// - `queue_len`：快照时刻通道内等待消费的缓冲数；
/// - `pool`：缓冲池快照，`pool.outstanding` 持续偏高意味着消费者漏调了 `data_recd`。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ServerStats {
    pub packets_processed: u64,
    pub packets_dropped: u64,
    pub read_errors: u64,
    pub queue_len: usize,
    pub pool: PoolStats,
}

#[derive(Debug, Default)]
pub(crate) struct ServerCounters {
    processed: AtomicU64,
    dropped: AtomicU64,
    read_errors: AtomicU64,
}

impl ServerCounters {
    pub(crate) fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_read_error(&self) {
        self.read_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, queue_len: usize, pool: PoolStats) -> ServerStats {
        ServerStats {
            packets_processed: self.processed.load(Ordering::Relaxed),
            packets_dropped: self.dropped.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            queue_len,
            pool,
        }
    }
}
