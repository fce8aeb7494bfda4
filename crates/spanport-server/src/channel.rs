use std::sync::Arc;

use flume::{Receiver, Sender, TrySendError};
use spanport_buffer::ReadBuf;
use tokio::sync::Notify;

/// 把已填充的 [`ReadBuf`] 交给消费者的共享通道。
///
/// # 教案式注释
///
/// ## 意图（Why）
/// - 服务只暴露一条数据通道，任意数量的消费者可以并发排空，但每个缓冲只会送达一个消费者；
/// - 消费者可能是异步任务，也可能是独立线程，因此同时提供 `recv` 与 `recv_blocking`。
///
/// ## 逻辑（How）
/// - 底层为 `flume` 有界多生产多消费通道；
/// - 每取出一个缓冲就通过 `space` 通知泵循环“通道腾出了空间”，
///   让采用背压策略的泵循环无需持有发送端阻塞即可等待，从而保证停机不依赖消费者排空通道。
///
/// ## 契约（What）
/// - 接收返回 `None` 表示泵循环已经退出且通道内缓冲已全部取完；
/// - 取出的每个缓冲都必须交回服务的 `data_recd`，否则对应槽位离开池。
#[derive(Clone, Debug)]
pub struct DataChannel {
    rx: Receiver<ReadBuf>,
    space: Arc<Notify>,
}

impl DataChannel {
    /// 异步等待下一个缓冲。
    pub async fn recv(&self) -> Option<ReadBuf> {
        let buf = self.rx.recv_async().await.ok()?;
        self.space.notify_one();
        Some(buf)
    }

    /// 在当前线程阻塞等待下一个缓冲，不可在异步运行时的工作线程上调用。
    pub fn recv_blocking(&self) -> Option<ReadBuf> {
        let buf = self.rx.recv().ok()?;
        self.space.notify_one();
        Some(buf)
    }

    /// 非阻塞地取出一个缓冲。
    pub fn try_recv(&self) -> Option<ReadBuf> {
        let buf = self.rx.try_recv().ok()?;
        self.space.notify_one();
        Some(buf)
    }

    /// 通道中等待消费的缓冲数量。
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// 通道的有界容量。
    pub fn capacity(&self) -> Option<usize> {
        self.rx.capacity()
    }

    /// 泵循环是否已经释放发送端。
    pub fn is_disconnected(&self) -> bool {
        self.rx.is_disconnected()
    }
}

/// 泵循环持有的发送端。
#[derive(Debug)]
pub(crate) struct DataSender {
    tx: Sender<ReadBuf>,
    space: Arc<Notify>,
}

impl DataSender {
    pub(crate) fn try_send(&self, buf: ReadBuf) -> Result<(), TrySendError<ReadBuf>> {
        self.tx.try_send(buf)
    }

    pub(crate) fn space(&self) -> &Notify {
        &self.space
    }
}

/// 构造一对有界的发送端与数据通道。
pub(crate) fn data_channel(capacity: usize) -> (DataSender, DataChannel) {
    let (tx, rx) = flume::bounded(capacity);
    let space = Arc::new(Notify::new());
    (
        DataSender {
            tx,
            space: Arc::clone(&space),
        },
        DataChannel { rx, space },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_buffer_is_delivered_once() {
        let (tx, rx) = data_channel(4);
        let other = rx.clone();
        for len in 1..=4 {
            let mut buf = ReadBuf::with_capacity(8);
            buf.fill_from(&vec![0u8; len]).expect("填充");
            tx.try_send(buf).expect("通道未满");
        }
        assert_eq!(rx.len(), 4);

        let mut lens = Vec::new();
        while let Some(buf) = rx.try_recv().or_else(|| other.try_recv()) {
            lens.push(buf.len());
        }
        lens.sort_unstable();
        assert_eq!(lens, vec![1, 2, 3, 4]);
    }

    #[test]
    fn full_channel_hands_buffer_back() {
        let (tx, rx) = data_channel(1);
        tx.try_send(ReadBuf::with_capacity(1)).expect("首个缓冲");
        match tx.try_send(ReadBuf::with_capacity(2)) {
            Err(TrySendError::Full(buf)) => assert_eq!(buf.capacity(), 2),
            other => panic!("通道已满时应返回缓冲，实际为 {other:?}"),
        }
        assert_eq!(rx.capacity(), Some(1));
    }

    #[test]
    fn dropping_sender_disconnects_after_drain() {
        let (tx, rx) = data_channel(2);
        tx.try_send(ReadBuf::with_capacity(1)).expect("发送");
        drop(tx);
        assert!(rx.recv_blocking().is_some(), "断开前已入队的缓冲仍可取出");
        assert!(rx.recv_blocking().is_none());
        assert!(rx.is_disconnected());
    }
}
