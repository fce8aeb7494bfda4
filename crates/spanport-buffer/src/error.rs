use thiserror::Error;

use crate::read_buf::PoolId;

/// 缓冲层可能出现的契约违背。
///
/// # 设计说明
/// - 读取耗尽不属于错误：[`std::io::Read::read`] 以 `Ok(0)` 表达终止；
/// - 这里只收录“调用方把不变量打破”的情形，例如填充长度越界、把缓冲归还给错误的池。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BufferError {
    /// 声明的有效长度超过槽位容量。
    #[error("填充长度 {requested} 超出缓冲容量 {capacity}")]
    LengthOverflow { requested: usize, capacity: usize },
    /// 缓冲并非由当前池发放。
    #[error("缓冲属于池 {found}，无法归还到池 {expected}")]
    ForeignBuffer { expected: PoolId, found: PoolId },
    /// 构造池时槽位数量或槽位容量为 0。
    #[error("缓冲池至少需要 1 个槽位且槽位容量大于 0（slots={slots}, slot_capacity={slot_capacity}）")]
    EmptyPool { slots: usize, slot_capacity: usize },
}
