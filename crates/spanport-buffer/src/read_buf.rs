use core::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};
use std::io;

use bytes::Buf;

use crate::error::BufferError;

/// 池内槽位的索引。
///
/// - 每个 [`ReadBuf`] 在整个生命周期内固定绑定一个槽位；
/// - 槽位编号从 0 开始，小于所属池的 `slots()`。
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId(usize);

impl SlotId {
    pub(crate) const fn new(index: usize) -> Self {
        Self(index)
    }

    /// 返回槽位在池内的下标。
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot#{}", self.0)
    }
}

/// 缓冲池的进程内唯一标识。
///
/// # 契约说明（What）
/// - 每次构造 [`ReadBufPool`](crate::ReadBufPool) 都会分配新的编号，编号单调递增且从 1 开始；
/// - 编号 0 保留给 [`ReadBuf::with_capacity`] 创建的独立缓冲，它们不属于任何池，归还时一律被拒绝。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PoolId(u64);

impl PoolId {
    pub(crate) const DETACHED: PoolId = PoolId(0);

    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// 是否为不隶属于任何池的独立缓冲标识。
    pub const fn is_detached(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_detached() {
            f.write_str("pool#detached")
        } else {
            write!(f, "pool#{}", self.0)
        }
    }
}

/// `ReadBuf` 承载一次入站报文：定长的底层存储加上当前有效的字节数。
///
/// # 教案式注释
///
/// ## 意图（Why）
/// - 底层存储按最大报文长度一次性分配，随后在多次接收之间反复复用，避免每个报文一次堆分配；
/// - 生产者（监听任务）写入并设置有效长度，消费者通过读取视图把字节排空，最后确认归还。
///
/// ## 逻辑（How）
/// - `storage`：定长存储，容量在构造后不再变化；
/// - `offset`：已被读取视图消费的前缀长度；
/// - `n`：尚未读取的有效字节数，可读区域恒为 `storage[offset..offset + n]`；
/// - 每次读取把 `offset` 前移、`n` 递减；`n == 0` 即为耗尽。
///
/// ## 契约（What）
/// - **不变量**：`offset + n <= capacity`；刚完成填充时 `offset == 0`，可读区域即前 `n` 字节；
/// - **所有权**：`ReadBuf` 不可克隆，归还需按值交给池，因此同一缓冲不可能被确认两次；
/// - **可见性**：[`ReadBuf::get_bytes`] 返回的切片借用自缓冲本身，借用检查保证其无法在归还后继续被访问。
///
/// ## 注意事项（Trade-offs）
/// - 读取会改变缓冲状态；若消费者既需要完整视图又需要流式读取，应先调用 `get_bytes` 再读取；
/// - 丢弃缓冲而不归还会让对应槽位永久离开池，池统计中的 `outstanding` 会持续偏高。
pub struct ReadBuf {
    storage: Box<[u8]>,
    offset: usize,
    n: usize,
    slot: SlotId,
    pool: PoolId,
}

impl ReadBuf {
    pub(crate) fn new(storage: Box<[u8]>, slot: SlotId, pool: PoolId) -> Self {
        Self {
            storage,
            offset: 0,
            n: 0,
            slot,
            pool,
        }
    }

    /// 创建不隶属于任何池的独立缓冲。
    ///
    /// - 适用于测试或一次性解析场景；
    /// - 该缓冲交给任何池的 `release` 都会被拒绝。
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(
            vec![0u8; capacity].into_boxed_slice(),
            SlotId::new(0),
            PoolId::DETACHED,
        )
    }

    /// 底层存储的固定容量。
    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// 尚未读取的有效字节数。
    #[inline]
    pub fn len(&self) -> usize {
        self.n
    }

    /// 有效字节是否已经全部被读取（或从未填充）。
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// 缓冲绑定的槽位。
    #[inline]
    pub fn slot(&self) -> SlotId {
        self.slot
    }

    /// 发放该缓冲的池。
    #[inline]
    pub fn pool_id(&self) -> PoolId {
        self.pool
    }

    /// 返回当前有效区域。
    ///
    /// 填充完成且尚未读取时，结果恰为底层存储的前 `n` 字节，与容量无关。
    #[inline]
    pub fn get_bytes(&self) -> &[u8] {
        &self.storage[self.offset..self.offset + self.n]
    }

    /// 开始一次新的填充，返回整块底层存储供生产者写入。
    ///
    /// 调用后缓冲被视为空：在 [`ReadBuf::set_filled`] 之前可读区域长度为 0，
    /// 因此接收失败时不会把上一轮的残留字节暴露给消费者。
    pub fn spare_mut(&mut self) -> &mut [u8] {
        self.offset = 0;
        self.n = 0;
        &mut self.storage
    }

    /// 声明本次填充写入了 `n` 个有效字节。
    ///
    /// # 错误
    /// - `n` 超过容量时返回 [`BufferError::LengthOverflow`]，缓冲保持为空。
    pub fn set_filled(&mut self, n: usize) -> Result<(), BufferError> {
        self.offset = 0;
        if n > self.storage.len() {
            self.n = 0;
            return Err(BufferError::LengthOverflow {
                requested: n,
                capacity: self.storage.len(),
            });
        }
        self.n = n;
        Ok(())
    }

    /// 以切片内容完成一次填充，返回写入的字节数。
    pub fn fill_from(&mut self, src: &[u8]) -> Result<usize, BufferError> {
        if src.len() > self.storage.len() {
            self.offset = 0;
            self.n = 0;
            return Err(BufferError::LengthOverflow {
                requested: src.len(),
                capacity: self.storage.len(),
            });
        }
        self.spare_mut()[..src.len()].copy_from_slice(src);
        self.set_filled(src.len())?;
        Ok(src.len())
    }

    /// 归还前清空游标，下一次填充前不残留任何可读字节。
    pub(crate) fn reset(&mut self) {
        self.offset = 0;
        self.n = 0;
    }

    fn consume(&mut self, cnt: usize) {
        self.offset += cnt;
        self.n -= cnt;
    }
}

impl io::Read for ReadBuf {
    /// 把至多 `dst.len()` 个剩余字节复制到 `dst`。
    ///
    /// - 返回实际复制的字节数，并同步减少剩余有效字节；
    /// - 缓冲已耗尽时立即返回 `Ok(0)`，不复制任何字节；
    /// - 允许分多次读取，拼接结果与一次性读取完全一致。
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        if self.n == 0 {
            return Ok(0);
        }
        let copied = dst.len().min(self.n);
        dst[..copied].copy_from_slice(&self.storage[self.offset..self.offset + copied]);
        self.consume(copied);
        Ok(copied)
    }
}

impl Buf for ReadBuf {
    fn remaining(&self) -> usize {
        self.n
    }

    fn chunk(&self) -> &[u8] {
        self.get_bytes()
    }

    fn advance(&mut self, cnt: usize) {
        assert!(
            cnt <= self.n,
            "cannot advance past remaining: {:?} <= {:?}",
            cnt,
            self.n
        );
        self.consume(cnt);
    }
}

impl AsRef<[u8]> for ReadBuf {
    fn as_ref(&self) -> &[u8] {
        self.get_bytes()
    }
}

impl fmt::Debug for ReadBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadBuf")
            .field("pool", &format_args!("{}", self.pool))
            .field("slot", &format_args!("{}", self.slot))
            .field("len", &self.n)
            .field("capacity", &self.storage.len())
            .finish()
    }
}
