use core::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};
use std::sync::Arc;

use spin::Mutex;
use tokio::sync::Notify;

use crate::{
    error::BufferError,
    read_buf::{PoolId, ReadBuf, SlotId},
};

/// `ReadBufPool` 是按槽位索引的定长缓冲池，负责在生产者与消费者之间循环发放 [`ReadBuf`]。
///
/// # 模块角色（Why）
/// - 入站路径需要“稳态零分配”：所有槽位在构造时一次性分配，之后只在自由链表与调用方之间搬运所有权；
/// - 生产者（监听任务）与确认归还（消费者调用 `release`）发生在不同的执行单元上，池必须可以并发访问。
///
/// # 核心机制（How）
/// - 内部维护 `spin::Mutex<Vec<ReadBuf>>` 作为自由链表，临界区只包含一次 `push`/`pop`；
/// - 归还时调用 `Notify::notify_one` 唤醒一个等待空槽的 [`ReadBufPool::acquire`]；
/// - `PoolMetrics` 以原子计数记录租借、回收、拒绝与等待次数，供 [`ReadBufPool::stats`] 生成快照。
///
/// # 契约说明（What）
/// - **线程安全**：实例可自由克隆，所有克隆共享同一组槽位；
/// - **前置条件**：槽位数量与槽位容量均需大于 0；
/// - **后置条件**：任何时刻 `free_slots + outstanding == slots`，自由链表长度不会超过槽位总数；
/// - **归还责任**：租出的缓冲必须通过 [`ReadBufPool::release`] 归还，直接丢弃会使该槽位永久流失。
///
/// # 设计权衡（Trade-offs）
/// - 选择自旋锁而非阻塞锁：临界区极短，且 `release` 常在异步任务中调用，不应陷入内核等待；
/// - 槽位数量固定，不做按需扩容：池耗尽即形成背压，把“漏确认”的问题暴露为可观测的饥饿，而不是内存增长。
#[derive(Clone)]
pub struct ReadBufPool {
    inner: Arc<PoolInner>,
}

impl ReadBufPool {
    /// 创建包含 `slots` 个槽位、每个槽位容量为 `slot_capacity` 字节的池。
    ///
    /// # 错误
    /// - 任一参数为 0 时返回 [`BufferError::EmptyPool`]。
    pub fn new(slots: usize, slot_capacity: usize) -> Result<Self, BufferError> {
        if slots == 0 || slot_capacity == 0 {
            return Err(BufferError::EmptyPool {
                slots,
                slot_capacity,
            });
        }
        let id = PoolId::next();
        let free_list = (0..slots)
            .rev()
            .map(|index| {
                ReadBuf::new(
                    vec![0u8; slot_capacity].into_boxed_slice(),
                    SlotId::new(index),
                    id,
                )
            })
            .collect();
        Ok(Self {
            inner: Arc::new(PoolInner {
                id,
                slots,
                slot_capacity,
                free_list: Mutex::new(free_list),
                released: Notify::new(),
                metrics: PoolMetrics::default(),
            }),
        })
    }

    /// 池的唯一标识。
    pub fn id(&self) -> PoolId {
        self.inner.id
    }

    /// 槽位总数。
    pub fn slots(&self) -> usize {
        self.inner.slots
    }

    /// 单个槽位的容量（字节）。
    pub fn slot_capacity(&self) -> usize {
        self.inner.slot_capacity
    }

    /// 非阻塞地租借一个空缓冲；池已耗尽时返回 `None`。
    pub fn try_acquire(&self) -> Option<ReadBuf> {
        let buf = self.inner.free_list.lock().pop();
        if buf.is_some() {
            self.inner.metrics.leased.fetch_add(1, Ordering::Relaxed);
        }
        buf
    }

    /// 租借一个空缓冲，池耗尽时等待其他调用方归还。
    ///
    /// # 实现策略
    /// 1. 先登记 `Notify` 等待者，再尝试弹出自由链表，避免“检查后、等待前”被归还的唤醒丢失；
    /// 2. 弹出失败则挂起，被唤醒后重新检查；
    /// 3. 该 Future 可以被安全取消（例如与停机信号竞争），取消不会占用任何槽位。
    pub async fn acquire(&self) -> ReadBuf {
        loop {
            let released = self.inner.released.notified();
            tokio::pin!(released);
            released.as_mut().enable();
            if let Some(buf) = self.try_acquire() {
                return buf;
            }
            self.inner
                .metrics
                .acquire_waits
                .fetch_add(1, Ordering::Relaxed);
            released.await;
        }
    }

    /// 确认归还缓冲，使其槽位重新进入自由链表。
    ///
    /// # 契约说明（What）
    /// - 归还前会清空读取游标，下一次填充之前不存在任何可读字节；
    /// - 不属于本池的缓冲（包括 [`ReadBuf::with_capacity`] 创建的独立缓冲）会被拒绝并丢弃，
    ///   返回 [`BufferError::ForeignBuffer`]，自由链表不受影响。
    pub fn release(&self, mut buf: ReadBuf) -> Result<(), BufferError> {
        if buf.pool_id() != self.inner.id {
            self.inner.metrics.rejected.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                pool = %self.inner.id,
                foreign_pool = %buf.pool_id(),
                slot = %buf.slot(),
                "拒绝归还不属于本池的缓冲"
            );
            return Err(BufferError::ForeignBuffer {
                expected: self.inner.id,
                found: buf.pool_id(),
            });
        }
        buf.reset();
        self.inner.free_list.lock().push(buf);
        self.inner.metrics.recycled.fetch_add(1, Ordering::Relaxed);
        self.inner.released.notify_one();
        Ok(())
    }

    /// 生成当前统计快照。
    pub fn stats(&self) -> PoolStats {
        let free_slots = self.inner.free_list.lock().len();
        PoolStats {
            slots: self.inner.slots,
            slot_capacity: self.inner.slot_capacity,
            free_slots,
            outstanding: self.inner.slots - free_slots,
            leased: self.inner.metrics.leased.load(Ordering::Relaxed),
            recycled: self.inner.metrics.recycled.load(Ordering::Relaxed),
            rejected: self.inner.metrics.rejected.load(Ordering::Relaxed),
            acquire_waits: self.inner.metrics.acquire_waits.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for ReadBufPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadBufPool")
            .field("id", &format_args!("{}", self.inner.id))
            .field("slots", &self.inner.slots)
            .field("slot_capacity", &self.inner.slot_capacity)
            .finish()
    }
}

/// 缓冲池的统计快照。
///
/// - `outstanding`：已租出、尚未归还的槽位数；在没有消费者持有缓冲时仍大于 0，说明存在漏确认；
/// - `leased`/`recycled`：累计租借与归还次数；
/// - `rejected`：被拒绝的外来缓冲次数；
/// - `acquire_waits`：租借时因池耗尽而进入等待的次数。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub slots: usize,
    pub slot_capacity: usize,
    pub free_slots: usize,
    pub outstanding: usize,
    pub leased: u64,
    pub recycled: u64,
    pub rejected: u64,
    pub acquire_waits: u64,
}

struct PoolInner {
    id: PoolId,
    slots: usize,
    slot_capacity: usize,
    free_list: Mutex<Vec<ReadBuf>>,
    released: Notify,
    metrics: PoolMetrics,
}

#[derive(Default)]
struct PoolMetrics {
    leased: AtomicU64,
    recycled: AtomicU64,
    rejected: AtomicU64,
    acquire_waits: AtomicU64,
}
