use core::{
    fmt,
    sync::atomic::{AtomicBool, Ordering},
};
use std::sync::Arc;

use flume::TrySendError;
use spanport_buffer::{ReadBuf, ReadBufPool};
use spin::Mutex;
use tokio::{runtime::Handle, sync::Notify};
use tracing::{debug, error, trace, warn};

use crate::{
    channel::{DataChannel, DataSender, data_channel},
    config::{FullChannelPolicy, ServerConfig},
    error::{ConfigError, SourceError},
    server::Server,
    source::PacketSource,
    state::{ServeState, ServeStatus},
    stats::{ServerCounters, ServerStats},
};

/// `PooledServer` 是 [`Server`] 契约的通用实现：从任意 [`PacketSource`] 读取报文，
/// 写入池化缓冲后交给数据通道。
///
/// # 教案式注释
///
/// ## 意图（Why）
/// - 各传输实现只需提供“把一个报文写进缓冲区”的来源，池、通道、背压与停机语义统一在此实现，
///   避免每种协议各写一遍容易出错的并发收尾逻辑；
/// - 稳态下不做任何分配：槽位在构造时一次性分配，随后在池、通道与消费者之间循环。
///
/// ## 逻辑（How）
/// - `serve` 把泵循环派生为后台 Tokio 任务：租借缓冲 → 读取报文 → 推入通道，循环往复；
/// - 泵循环的每个等待点（租借、读取、等待通道空间）都与停机信号竞争，`stop` 因而能被及时感知；
/// - 推入通道只使用非阻塞的 `try_send`，并与 `stop` 共享一把推送闸门：
///   `stop` 返回后闸门内看到的一定是停止状态，不会再有缓冲进入通道；
/// - 通道已满时按 [`FullChannelPolicy`] 等待消费者腾出空间或丢弃报文。
///
/// ## 契约（What）
/// - **前置条件**：`serve` 需在 Tokio 运行时上下文中调用，或改用 [`PooledServer::serve_on`] 显式指定运行时；
/// - **后置条件**：泵循环退出后释放发送端，消费者排空剩余缓冲后 `recv` 返回 `None`；
/// - **资源保证**：泵循环手中的缓冲在任何退出路径上都会归还池，不会因停机或丢包而泄漏。
///
/// ## 注意事项（Trade-offs）
/// - `stop` 为终态，停止后的服务不可再次 `serve`；需要重启时应构造新实例；
/// - 报文来源在停机时被直接丢弃，尚未读取的报文随之丢失。
pub struct PooledServer<S> {
    shared: Arc<Shared>,
    pool: ReadBufPool,
    channel: DataChannel,
    policy: FullChannelPolicy,
    pending: Mutex<Option<PumpParts<S>>>,
}

struct PumpParts<S> {
    source: S,
    sender: DataSender,
}

impl<S: PacketSource> PooledServer<S> {
    /// 按配置构造服务，此时尚未开始接收。
    ///
    /// # 错误
    /// - 配置校验失败时返回对应的 [`ConfigError`]。
    pub fn new(config: ServerConfig, source: S) -> Result<Self, ConfigError> {
        config.validate()?;
        let pool = ReadBufPool::new(config.effective_pool_size(), config.max_packet_size)?;
        let (sender, channel) = data_channel(config.queue_size);
        debug!(
            pool = %pool.id(),
            slots = pool.slots(),
            slot_capacity = pool.slot_capacity(),
            queue_size = config.queue_size,
            policy = ?config.full_channel_policy,
            "构造池化服务"
        );
        Ok(Self {
            shared: Arc::new(Shared::default()),
            pool,
            channel,
            policy: config.full_channel_policy,
            pending: Mutex::new(Some(PumpParts { source, sender })),
        })
    }

    /// 在指定运行时上派生泵循环。
    ///
    /// 已经启动或已经停止时为空操作。
    pub fn serve_on(&self, handle: &Handle) {
        if !self.shared.state.try_start() {
            debug!(status = ?self.shared.state.status(), "服务已启动或已停止，忽略 serve");
            return;
        }
        let Some(parts) = self.pending.lock().take() else {
            return;
        };
        let pump = Pump {
            shared: Arc::clone(&self.shared),
            pool: self.pool.clone(),
            sender: parts.sender,
            policy: self.policy,
        };
        handle.spawn(pump.run(parts.source));
    }
}

impl<S> PooledServer<S> {
    /// 当前生命周期阶段。
    pub fn status(&self) -> ServeStatus {
        self.shared.state.status()
    }

    /// 服务使用的缓冲池。
    pub fn pool(&self) -> &ReadBufPool {
        &self.pool
    }

    /// 生成统计快照。
    pub fn stats(&self) -> ServerStats {
        self.shared
            .counters
            .snapshot(self.channel.len(), self.pool.stats())
    }

    /// 等待泵循环完全退出并释放发送端。
    ///
    /// 只有在 `stop` 被调用、或报文来源关闭之后才会返回；从未启动且从未停止的服务会一直等待。
    pub async fn wait_stopped(&self) {
        self.shared.wait_finished().await;
    }

    fn request_stop(&self) {
        let previous = {
            let _gate = self.shared.push_gate.lock();
            self.shared.state.stop()
        };
        self.shared.shutdown.notify_waiters();
        match previous {
            ServeStatus::Idle => {
                drop(self.pending.lock().take());
                self.shared.mark_finished();
                debug!(pool = %self.pool.id(), "服务未启动即停止");
            }
            ServeStatus::Serving => debug!(pool = %self.pool.id(), "已请求停机"),
            ServeStatus::Stopped => {}
        }
    }
}

impl<S: PacketSource> Server for PooledServer<S> {
    fn serve(&self) {
        match Handle::try_current() {
            Ok(handle) => self.serve_on(&handle),
            Err(err) => error!(error = %err, "serve 需在 Tokio 运行时内调用"),
        }
    }

    fn is_serving(&self) -> bool {
        self.shared.state.is_serving()
    }

    fn stop(&self) {
        self.request_stop();
    }

    fn data_chan(&self) -> DataChannel {
        self.channel.clone()
    }

    fn data_recd(&self, buf: ReadBuf) {
        // 外来缓冲的拒绝原因已由池记录。
        let _ = self.pool.release(buf);
    }
}

impl<S> Drop for PooledServer<S> {
    fn drop(&mut self) {
        self.request_stop();
    }
}

impl<S> fmt::Debug for PooledServer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledServer")
            .field("status", &self.shared.state.status())
            .field("pool", &self.pool)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// 服务实例与后台泵循环共享的状态。
#[derive(Default)]
struct Shared {
    state: ServeState,
    push_gate: Mutex<()>,
    shutdown: Notify,
    finished: AtomicBool,
    finished_signal: Notify,
    counters: ServerCounters,
}

impl Shared {
    /// 停机信号。先登记等待者再检查状态，`stop` 先写状态再广播，二者之间不会丢失唤醒。
    async fn stop_requested(&self) {
        let notified = self.shutdown.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.state.is_stopped() {
            return;
        }
        notified.await;
    }

    fn mark_finished(&self) {
        self.finished.store(true, Ordering::SeqCst);
        self.finished_signal.notify_waiters();
    }

    async fn wait_finished(&self) {
        let notified = self.finished_signal.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.finished.load(Ordering::SeqCst) {
            return;
        }
        notified.await;
    }
}

enum Push {
    Delivered,
    Dropped(ReadBuf),
    Shutdown(ReadBuf),
}

/// 后台泵循环：来源 → 缓冲 → 通道。
struct Pump {
    shared: Arc<Shared>,
    pool: ReadBufPool,
    sender: DataSender,
    policy: FullChannelPolicy,
}

impl Pump {
    async fn run<S: PacketSource>(self, mut source: S) {
        debug!(pool = %self.pool.id(), "泵循环启动");
        loop {
            let acquired = tokio::select! {
                biased;
                () = self.shared.stop_requested() => None,
                buf = self.pool.acquire() => Some(buf),
            };
            let Some(mut buf) = acquired else {
                break;
            };

            let received = tokio::select! {
                biased;
                () = self.shared.stop_requested() => None,
                res = source.recv_into(buf.spare_mut()) => Some(res),
            };
            let Some(received) = received else {
                self.recycle(buf);
                break;
            };

            match received {
                Ok(len) => {
                    if let Err(err) = buf.set_filled(len) {
                        self.shared.counters.record_read_error();
                        warn!(error = %err, "报文来源声明的长度超出缓冲容量");
                        self.recycle(buf);
                        continue;
                    }
                }
                Err(SourceError::Closed) => {
                    debug!(pool = %self.pool.id(), "报文来源已关闭");
                    self.recycle(buf);
                    break;
                }
                Err(err) => {
                    self.shared.counters.record_read_error();
                    warn!(error = %err, "接收报文失败");
                    self.recycle(buf);
                    continue;
                }
            }

            match self.push(buf).await {
                Push::Delivered => self.shared.counters.record_processed(),
                Push::Dropped(buf) => {
                    self.shared.counters.record_dropped();
                    trace!(len = buf.len(), "数据通道已满，丢弃报文");
                    self.recycle(buf);
                }
                Push::Shutdown(buf) => {
                    self.recycle(buf);
                    break;
                }
            }
        }

        self.shared.state.stop();
        drop(self.sender);
        self.shared.mark_finished();
        debug!(pool = %self.pool.id(), "泵循环退出");
    }

    /// 把已填充的缓冲推入通道。
    ///
    /// 闸门内只执行非阻塞的 `try_send`；通道已满时先登记“空间”唤醒再释放闸门等待，
    /// 因此 `stop` 永远不会被一个卡在满通道上的推送阻塞。
    async fn push(&self, mut buf: ReadBuf) -> Push {
        loop {
            let space = self.sender.space().notified();
            tokio::pin!(space);
            space.as_mut().enable();
            {
                let _gate = self.shared.push_gate.lock();
                if self.shared.state.is_stopped() {
                    return Push::Shutdown(buf);
                }
                match self.sender.try_send(buf) {
                    Ok(()) => return Push::Delivered,
                    Err(TrySendError::Full(back)) => buf = back,
                    Err(TrySendError::Disconnected(back)) => return Push::Shutdown(back),
                }
            }
            if self.policy == FullChannelPolicy::Drop {
                return Push::Dropped(buf);
            }
            tokio::select! {
                biased;
                () = self.shared.stop_requested() => return Push::Shutdown(buf),
                () = &mut space => {}
            }
        }
    }

    fn recycle(&self, buf: ReadBuf) {
        // 泵循环只持有本池发放的缓冲，归还不会被拒绝。
        let _ = self.pool.release(buf);
    }
}
