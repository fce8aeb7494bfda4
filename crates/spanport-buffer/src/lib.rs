//! `spanport-buffer` 提供入站报文在“读取任务 → 消费者 → 缓冲池”之间流转所用的定长缓冲。
//!
//! # 模块定位（Why）
//! - Agent 在高报文速率下接收 Span 提交，若每个报文都重新分配堆内存，分配器抖动会直接反映到尾延迟；
//! - 本 crate 在启动时一次性分配所有槽位，稳态下只在自由链表与消费者之间搬运所有权，不产生新分配。
//!
//! # 设计概要（How）
//! - `read_buf` 模块实现 [`ReadBuf`]：定长存储 + 有效字节计数 + 读取游标，
//!   同时实现 [`std::io::Read`] 与 [`bytes::Buf`] 两种读取视图；
//! - `pool` 模块实现 [`ReadBufPool`]：按槽位索引的自由链表，借助 `spin::Mutex` 保护，
//!   通过 `tokio::sync::Notify` 唤醒等待空闲槽位的生产者；
//! - 所有权按值转移：池 → 生产者（填充）→ 通道 → 消费者 → 池（确认归还），
//!   重复归还在编译期即被移动语义排除。
//!
//! # 命名约定（Consistency）
//! - “槽位”（slot）指池内一个可复用的定长存储单元，以 [`SlotId`] 标识；
//! - “确认归还”（acknowledge）指消费者读完后把缓冲交还给池，对应 [`ReadBufPool::release`]。

mod error;
mod pool;
mod read_buf;

pub use error::BufferError;
pub use pool::{PoolStats, ReadBufPool};
pub use read_buf::{PoolId, ReadBuf, SlotId};
