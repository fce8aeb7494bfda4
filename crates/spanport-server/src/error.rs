use spanport_buffer::BufferError;
use thiserror::Error;

/// 报文来源在接收时可能给出的结果。
///
/// # 契约说明（What）
/// - `Closed`：来源已永久结束（对端关闭、注入句柄全部释放等），泵循环随之退出并把服务置为停止；
/// - `Oversized`：单个报文超过槽位容量，计入 `read_errors` 后继续接收；
/// - `Io`：底层接收失败，同样计入 `read_errors` 并继续，是否重试由传输实现自身决定。
#[derive(Debug, Error)]
pub enum SourceError {
    /// 来源已关闭，不会再产生报文。
    #[error("报文来源已关闭")]
    Closed,
    /// 报文超出槽位容量。
    #[error("报文长度 {len} 超出缓冲容量 {capacity}")]
    Oversized { len: usize, capacity: usize },
    /// 底层接收失败。
    #[error("接收报文失败: {0}")]
    Io(#[from] std::io::Error),
}

/// 服务配置在解析或校验阶段的错误。
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 数据通道容量为 0。
    #[error("queue_size 必须大于 0")]
    ZeroQueueSize,
    /// 最大报文长度为 0。
    #[error("max_packet_size 必须大于 0")]
    ZeroPacketSize,
    /// 缓冲池槽位数为 0。
    #[error("pool_size 必须大于 0")]
    ZeroPoolSize,
    /// 缓冲池构造失败。
    #[error("无法构造读缓冲池: {0}")]
    Pool(#[from] BufferError),
    /// TOML 文本无法解析。
    #[error("无法解析服务配置: {0}")]
    Parse(#[from] toml::de::Error),
}
