use core::sync::atomic::{AtomicU8, Ordering};

/// 服务的生命周期阶段。
///
/// 迁移路径只有两条：`Idle → Serving → Stopped` 与 `Idle → Stopped`；`Stopped` 为终态。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ServeStatus {
    Idle = 0,
    Serving = 1,
    Stopped = 2,
}

impl ServeStatus {
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => ServeStatus::Idle,
            1 => ServeStatus::Serving,
            _ => ServeStatus::Stopped,
        }
    }
}

/// 以单个原子字节记录生命周期，供 `serve`/`stop`/`is_serving` 在任意线程并发调用。
///
/// # 契约说明（What）
/// - `try_start` 仅在 `Idle` 时成功，保证后台泵循环最多启动一次；
/// - `stop` 无条件迁移到 `Stopped` 并返回迁移前的阶段，重复调用是幂等的；
/// - 所有读写使用 `SeqCst`，停机标记与唤醒通知之间的先后关系依赖这一全序。
#[derive(Debug)]
pub struct ServeState {
    status: AtomicU8,
}

impl Default for ServeState {
    fn default() -> Self {
        Self::new()
    }
}

impl ServeState {
    pub const fn new() -> Self {
        Self {
            status: AtomicU8::new(ServeStatus::Idle as u8),
        }
    }

    pub fn status(&self) -> ServeStatus {
        ServeStatus::from_raw(self.status.load(Ordering::SeqCst))
    }

    pub fn is_serving(&self) -> bool {
        self.status() == ServeStatus::Serving
    }

    pub fn is_stopped(&self) -> bool {
        self.status() == ServeStatus::Stopped
    }

    /// `Idle → Serving`；其余阶段返回 `false`。
    pub fn try_start(&self) -> bool {
        self.status
            .compare_exchange(
                ServeStatus::Idle as u8,
                ServeStatus::Serving as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    /// 迁移到 `Stopped`，返回之前的阶段。
    pub fn stop(&self) -> ServeStatus {
        ServeStatus::from_raw(
            self.status
                .swap(ServeStatus::Stopped as u8, Ordering::SeqCst),
        )
    }
}
