use spanport_buffer::ReadBuf;

use crate::channel::DataChannel;

/// 接收客户端入站 Span 提交的服务契约。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - Agent 需要同时支持多种传输（不同协议、不同端口），而下游处理流水线只应依赖一个抽象；
/// - 该 trait 把“生命周期控制”与“数据交接”收拢为五个操作，消费者通过 `Arc<dyn Server>` 使用任意实现。
///
/// ## 契约说明（What）
/// - `serve`：开始接收并填充数据通道。实现必须把接收循环放到后台任务中并立即返回，
///   使其他线程随时可以调用 `stop`；
/// - `is_serving`：调用时刻是否正在接收，无副作用；
/// - `stop`：请求停机。可与 `serve` 并发调用、可重复调用；返回后不会再有新的缓冲进入通道，
///   且停机过程不依赖任何消费者排空通道；
/// - `data_chan`：返回唯一的共享数据通道，多个消费者可并发排空，每个缓冲只送达一个消费者；
/// - `data_recd`：消费者读完缓冲后**必须**恰好调用一次，把缓冲交还给池；
///   缓冲按值传入，重复确认在编译期即不可能发生，遗漏确认则会让槽位永久流失。
///
/// ## 风险提示（Trade-offs）
/// - 契约操作不返回可恢复错误：故障只会表现为池耗尽（漏确认）或丢包（`Drop` 策略），
///   套接字与解码错误由具体传输实现自行处理并记录。
pub trait Server: Send + Sync {
    /// 开始接收入站数据。
    fn serve(&self);

    /// 当前是否正在接收。
    fn is_serving(&self) -> bool;

    /// 请求停机。
    fn stop(&self);

    /// 返回交付已填充缓冲的共享通道。
    fn data_chan(&self) -> DataChannel;

    /// 确认缓冲已读完，使其回到池中复用。
    fn data_recd(&self, buf: ReadBuf);
}
