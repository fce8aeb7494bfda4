use serde::Deserialize;

use crate::error::ConfigError;

/// 数据通道已满时，泵循环对新报文的处置策略。
///
/// - `Block`（默认）：形成背压，泵循环等待消费者腾出空间或停机信号；
/// - `Drop`：立即把缓冲还给池并累加 `packets_dropped`，适合宁可丢包也不能拖慢接收的过载保护场景。
///
/// 两种策略下缓冲都不会泄漏：被丢弃的报文所占槽位立即归还。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FullChannelPolicy {
    #[default]
    Block,
    Drop,
}

/// `ServerConfig` 描述一个池化服务的容量参数。
///
/// # 教案式注释
///
/// ## 意图（Why）
/// - 通道容量、最大报文长度与槽位数量共同决定内存上限（`pool_size × max_packet_size`）与背压时机，
///   需要集中建模并在构造前校验；
/// - 默认值沿用 Agent 缓冲服务的惯例：通道容量 1000，最大报文 65000 字节。
///
/// ## 契约（What）
/// - `queue_size`：数据通道的有界容量；
/// - `max_packet_size`：单个槽位的字节容量，超过该长度的报文会被计为读取错误；
/// - `pool_size`：槽位数量；缺省时为 `queue_size + 2`，保证通道填满时泵循环与一个消费者仍各有一个槽位；
/// - `full_channel_policy`：见 [`FullChannelPolicy`]。
///
/// ## 注意事项（Trade-offs）
/// - `pool_size` 小于 `queue_size` 是合法的：此时通道永远不会被填满，背压改由池耗尽提供。
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub queue_size: usize,
    pub max_packet_size: usize,
    pub pool_size: Option<usize>,
    pub full_channel_policy: FullChannelPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            queue_size: Self::DEFAULT_QUEUE_SIZE,
            max_packet_size: Self::DEFAULT_MAX_PACKET_SIZE,
            pool_size: None,
            full_channel_policy: FullChannelPolicy::Block,
        }
    }
}

impl ServerConfig {
    pub const DEFAULT_QUEUE_SIZE: usize = 1000;
    pub const DEFAULT_MAX_PACKET_SIZE: usize = 65_000;

    /// 从 TOML 文本解析并校验配置。
    ///
    /// ```
    /// use spanport_server::{FullChannelPolicy, ServerConfig};
    ///
    /// let config = ServerConfig::from_toml_str(
    ///     "queue_size = 8\nmax_packet_size = 512\nfull_channel_policy = \"drop\"\n",
    /// )
    /// .expect("合法配置");
    /// assert_eq!(config.effective_pool_size(), 10);
    /// assert_eq!(config.full_channel_policy, FullChannelPolicy::Drop);
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = queue_size;
        self
    }

    pub fn with_max_packet_size(mut self, max_packet_size: usize) -> Self {
        self.max_packet_size = max_packet_size;
        self
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = Some(pool_size);
        self
    }

    pub fn with_full_channel_policy(mut self, policy: FullChannelPolicy) -> Self {
        self.full_channel_policy = policy;
        self
    }

    /// 实际使用的槽位数量。
    pub fn effective_pool_size(&self) -> usize {
        self.pool_size
            .unwrap_or_else(|| self.queue_size.saturating_add(2))
    }

    /// 校验容量参数均为正数。
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_size == 0 {
            return Err(ConfigError::ZeroQueueSize);
        }
        if self.max_packet_size == 0 {
            return Err(ConfigError::ZeroPacketSize);
        }
        if self.effective_pool_size() == 0 {
            return Err(ConfigError::ZeroPoolSize);
        }
        Ok(())
    }
}
