use core::future::Future;

use bytes::Bytes;
use flume::{Receiver, Sender};

use crate::error::SourceError;

/// 报文来源：传输实现向池化服务提供入站字节的唯一接缝。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 服务层只关心“把一个报文写进给定的缓冲区”，不关心报文来自 UDP、TCP 帧还是 HTTP 请求体；
/// - 把监听/接受循环留给各传输实现，服务层统一负责池、通道与生命周期。
///
/// ## 契约说明（What）
/// - `recv_into` 把恰好一个报文写入 `buf` 开头，返回写入长度；
/// - 返回值不得超过 `buf.len()`，报文放不下时应返回 [`SourceError::Oversized`] 而非截断；
/// - 返回的 Future 必须可以被安全取消：停机时泵循环会直接丢弃它。
pub trait PacketSource: Send + 'static {
    fn recv_into<'a>(
        &'a mut self,
        buf: &'a mut [u8],
    ) -> impl Future<Output = Result<usize, SourceError>> + Send + 'a;
}

/// 进程内报文来源，由 [`QueueHandle`] 注入负载。
///
/// 典型用途是已经在别处读完完整负载的上游（例如 HTTP 层拿到的请求体），
/// 以及测试中按需驱动服务。所有 [`QueueHandle`] 释放后，来源返回 [`SourceError::Closed`]。
#[derive(Debug)]
pub struct QueueSource {
    rx: Receiver<Bytes>,
}

/// 向 [`QueueSource`] 注入负载的句柄，可克隆。
#[derive(Clone, Debug)]
pub struct QueueHandle {
    tx: Sender<Bytes>,
}

impl QueueSource {
    /// 创建最多缓存 `backlog` 个待注入负载的来源。
    pub fn bounded(backlog: usize) -> (QueueHandle, QueueSource) {
        let (tx, rx) = flume::bounded(backlog);
        (QueueHandle { tx }, QueueSource { rx })
    }

    /// 创建不限制待注入数量的来源。
    pub fn unbounded() -> (QueueHandle, QueueSource) {
        let (tx, rx) = flume::unbounded();
        (QueueHandle { tx }, QueueSource { rx })
    }
}

impl PacketSource for QueueSource {
    async fn recv_into<'a>(&'a mut self, buf: &'a mut [u8]) -> Result<usize, SourceError> {
        let payload = self
            .rx
            .recv_async()
            .await
            .map_err(|_| SourceError::Closed)?;
        if payload.len() > buf.len() {
            return Err(SourceError::Oversized {
                len: payload.len(),
                capacity: buf.len(),
            });
        }
        buf[..payload.len()].copy_from_slice(&payload);
        Ok(payload.len())
    }
}

impl QueueHandle {
    /// 注入一个负载，来源积压已满时等待。
    ///
    /// 来源已被丢弃时返回 `false`。
    pub async fn submit(&self, payload: impl Into<Bytes>) -> bool {
        self.tx.send_async(payload.into()).await.is_ok()
    }

    /// 非阻塞地注入一个负载；积压已满或来源已被丢弃时返回 `false`。
    pub fn try_submit(&self, payload: impl Into<Bytes>) -> bool {
        self.tx.try_send(payload.into()).is_ok()
    }

    /// 尚未被服务读取的负载数量。
    pub fn backlog(&self) -> usize {
        self.tx.len()
    }
}
