#![doc = r#"
# spanport-server

## 模块使命（Why）
- **统一交接契约**：Agent 通过多种传输接收客户端的 Span 提交，下游处理流水线只依赖 [`Server`] 这一抽象：
  生命周期控制（`serve`/`stop`/`is_serving`）加上一条交付 [`ReadBuf`] 的共享通道；
- **零分配交接**：原始字节写入预分配的池化缓冲，经通道交给消费者，消费者读完后通过 `data_recd` 确认归还，
  稳态下不产生逐报文的堆分配。

## 核心契约（What）
- [`Server`]：五个操作的对象安全 trait，消费者以 `Arc<dyn Server>` 使用任意实现；
- [`DataChannel`]：有界多消费者通道，每个缓冲只送达一个消费者；
- [`PooledServer`]：基于 [`PacketSource`] 的通用实现，负责池、通道、背压与停机；
- [`QueueSource`]：进程内报文来源，用于注入已在别处读完的负载；
- [`ServerConfig`]：容量参数与通道已满策略（[`FullChannelPolicy`]），支持 TOML 解析。

## 实现策略（How）
- 生命周期以单个原子字节（[`ServeState`]）记录，`stop` 与推送路径共享一把闸门，保证停机后不再推送；
- 泵循环的所有等待点都与停机信号竞争，停机不依赖消费者排空通道；
- 读取耗尽以 `Ok(0)` 表达，契约操作不返回可恢复错误；故障表现为池耗尽（漏确认）或丢包（`Drop` 策略），
  可通过 [`ServerStats`] 观测。

## 非目标
- 协议解析、编码格式、重试/退避策略，以及任何具体传输的监听/接受循环。
"#]

mod channel;
mod config;
mod error;
mod pooled;
mod server;
mod source;
mod state;
mod stats;

pub use channel::DataChannel;
pub use config::{FullChannelPolicy, ServerConfig};
pub use error::{ConfigError, SourceError};
pub use pooled::PooledServer;
pub use server::Server;
pub use source::{PacketSource, QueueHandle, QueueSource};
pub use spanport_buffer::{BufferError, PoolId, PoolStats, ReadBuf, ReadBufPool, SlotId};
pub use state::{ServeState, ServeStatus};
pub use stats::ServerStats;
