//! `pool_contract` 集成测试：验证 `ReadBufPool` 的循环复用、跨线程归还与漏确认场景。
//!
//! # 测试目标（Why）
//! - 池是稳态零分配的基础：归还后的槽位必须可被再次租借，且不能把旧数据泄露给下一次填充；
//! - 漏确认不会报错，只能通过池耗尽观测，因此需要专门的饥饿场景。

use std::{io::Read, thread, time::Duration};

use spanport_buffer::ReadBufPool;

/// 验证归还后重新填充更短的负载时，旧字节不会出现在有效区域内。
///
/// # 步骤说明（How）
/// 1. 单槽位池，写入 8 字节并完整读取后归还；
/// 2. 再次租借同一槽位，仅写入 2 字节；
/// 3. 断言 `get_bytes` 与读取结果都只包含新的 2 字节。
#[test]
fn refill_after_release_does_not_leak_stale_bytes() {
    let pool = ReadBufPool::new(1, 16).expect("构造池");

    let mut first = pool.try_acquire().expect("首次租借");
    first.fill_from(b"ABCDEFGH").expect("首次填充");
    let mut sink = Vec::new();
    first.read_to_end(&mut sink).expect("排空");
    let slot = first.slot();
    pool.release(first).expect("确认归还");

    let mut second = pool.try_acquire().expect("再次租借");
    assert_eq!(second.slot(), slot, "单槽位池必须复用同一槽位");
    assert!(second.get_bytes().is_empty(), "归还后未填充前不可读");
    second.fill_from(b"xy").expect("二次填充");
    assert_eq!(second.get_bytes(), b"xy");

    let mut out = Vec::new();
    second.read_to_end(&mut out).expect("读取二次填充");
    assert_eq!(out, b"xy");
    pool.release(second).expect("确认归还");
}

/// 验证未读完即归还的缓冲同样会被清空。
#[test]
fn release_resets_partially_read_buffer() {
    let pool = ReadBufPool::new(1, 8).expect("构造池");
    let mut buf = pool.try_acquire().expect("租借");
    buf.fill_from(&[1, 2, 3, 4]).expect("填充");
    let mut head = [0u8; 1];
    buf.read_exact(&mut head).expect("读取一个字节");
    pool.release(buf).expect("归还");

    let again = pool.try_acquire().expect("再次租借");
    assert_eq!(again.len(), 0);
    pool.release(again).expect("归还");
}

/// 漏确认场景：持有全部槽位且不归还时，池保持耗尽，统计暴露 `outstanding`。
#[test]
fn withheld_acknowledgements_starve_the_pool() {
    let pool = ReadBufPool::new(3, 4).expect("构造池");
    let held: Vec<_> = (0..3)
        .map(|_| pool.try_acquire().expect("租借"))
        .collect();

    assert!(pool.try_acquire().is_none(), "槽位全部被占用");
    let stats = pool.stats();
    assert_eq!(stats.outstanding, 3);
    assert_eq!(stats.free_slots, 0);

    // 丢弃而不归还：槽位永久离开池。
    drop(held);
    assert!(pool.try_acquire().is_none(), "丢弃不会把槽位还给池");
    assert_eq!(pool.stats().outstanding, 3);
}

/// 跨线程归还：生产线程租借并填充，消费线程读取并确认归还。
///
/// # 契约校验（What）
/// - 多轮循环后所有槽位都回到自由链表；
/// - 租借与归还次数相等。
#[test]
fn buffers_cycle_between_threads() {
    let pool = ReadBufPool::new(2, 32).expect("构造池");
    let (tx, rx) = std::sync::mpsc::sync_channel(1);
    let rounds = 200u32;

    let producer = {
        let pool = pool.clone();
        thread::spawn(move || {
            for round in 0..rounds {
                let mut buf = loop {
                    if let Some(buf) = pool.try_acquire() {
                        break buf;
                    }
                    thread::yield_now();
                };
                buf.fill_from(&round.to_be_bytes()).expect("填充");
                tx.send(buf).expect("发送到消费线程");
            }
        })
    };

    let consumer = {
        let pool = pool.clone();
        thread::spawn(move || {
            let mut seen = 0u32;
            while let Ok(mut buf) = rx.recv_timeout(Duration::from_secs(5)) {
                let mut word = [0u8; 4];
                buf.read_exact(&mut word).expect("读取轮次");
                assert_eq!(u32::from_be_bytes(word), seen);
                seen += 1;
                pool.release(buf).expect("确认归还");
                if seen == rounds {
                    break;
                }
            }
            seen
        })
    };

    producer.join().expect("生产线程不应 panic");
    assert_eq!(consumer.join().expect("消费线程不应 panic"), rounds);

    let stats = pool.stats();
    assert_eq!(stats.free_slots, 2);
    assert_eq!(stats.leased, u64::from(rounds));
    assert_eq!(stats.recycled, u64::from(rounds));
}
