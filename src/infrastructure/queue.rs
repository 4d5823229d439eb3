//! 基于 Redis 列表的消息队列
//!
//! 生产者 `LPUSH`，消费者 `BRPOPLPUSH` 把消息移入处理中列表，处理成功后确认删除。
//! 处理失败的消息进入延迟集合，按指数退避重新投递，超过次数后移入死信列表。
//! 消费者启动时把处理中列表遗留的消息放回队列，投递语义为至少一次。

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::core::error::CoreResult;
use crate::infrastructure::config::{QueueConfig, RedisConfig};

/// 消息处理
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &[u8]) -> CoreResult<()>;
}

/// 单条消息的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Done,
    Requeue,
}

/// 执行处理函数，失败时记录日志并要求重新入队
pub async fn dispatch(handler: &dyn MessageHandler, topic: &str, message: &[u8]) -> Delivery {
    match handler.handle(message).await {
        Ok(()) => Delivery::Done,
        Err(err) => {
            warn!("[Queue]消息处理失败 topic={} err={}", topic, err);
            Delivery::Requeue
        }
    }
}

/// 队列中存储的消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMessage {
    pub id: String,
    /// 已失败的次数
    pub attempts: u32,
    #[serde(with = "base64_body")]
    pub body: Vec<u8>,
}

mod base64_body {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}

impl QueueMessage {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            attempts: 0,
            body: body.into(),
        }
    }

    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// 非本队列格式的消息按原始内容处理
    pub fn decode(raw: &[u8]) -> Self {
        serde_json::from_slice(raw).unwrap_or_else(|_| Self {
            id: String::new(),
            attempts: 0,
            body: raw.to_vec(),
        })
    }

    pub fn retried(&self) -> Self {
        Self {
            id: self.id.clone(),
            attempts: self.attempts.saturating_add(1),
            body: self.body.clone(),
        }
    }
}

/// 重新投递策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// 0 表示不限制
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn from_config(config: &QueueConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.requeue_delay_ms),
            max_delay: Duration::from_millis(config.max_requeue_delay_ms),
            max_attempts: config.max_attempts,
        }
    }

    /// 第 `attempts` 次失败后的等待时间
    pub fn delay(&self, attempts: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempts.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    pub fn exhausted(&self, attempts: u32) -> bool {
        self.max_attempts > 0 && attempts >= self.max_attempts
    }
}

/// 一个主题使用的全部 key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicKeys {
    pub ready: String,
    pub processing: String,
    pub delayed: String,
    pub dead: String,
}

impl TopicKeys {
    pub fn new(prefix: &str, topic: &str) -> Self {
        let ready = format!("{}{}", prefix, topic);
        Self {
            processing: format!("{}:processing", ready),
            delayed: format!("{}:delayed", ready),
            dead: format!("{}:dead", ready),
            ready,
        }
    }
}

/// 消费者使用的存储操作
#[async_trait]
pub trait QueueStore: Send {
    /// 阻塞取出一条消息并放入处理中列表，超时返回 None
    async fn reserve(&mut self, keys: &TopicKeys, timeout: Duration) -> CoreResult<Option<Vec<u8>>>;

    /// 处理完成，从处理中列表删除
    async fn ack(&mut self, keys: &TopicKeys, raw: &[u8]) -> CoreResult<()>;

    /// 放入延迟集合并从处理中列表删除
    async fn retry_later(
        &mut self,
        keys: &TopicKeys,
        raw: &[u8],
        retry: &[u8],
        ready_at_ms: i64,
    ) -> CoreResult<()>;

    /// 放入死信列表并从处理中列表删除
    async fn bury(&mut self, keys: &TopicKeys, raw: &[u8], dead: &[u8]) -> CoreResult<()>;

    /// 把到期的延迟消息移回队列，返回移动数量
    async fn promote_due(&mut self, keys: &TopicKeys, now_ms: i64) -> CoreResult<usize>;

    /// 把处理中列表的消息全部放回队列
    async fn recover(&mut self, keys: &TopicKeys) -> CoreResult<usize>;
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// 消费循环，直到 `shutdown` 变为 true
///
/// 阻塞读取不与关闭信号竞争，退出延迟最多为一次 `poll_timeout`。
pub async fn run_consumer<S: QueueStore + ?Sized>(
    store: &mut S,
    keys: &TopicKeys,
    topic: &str,
    handler: &dyn MessageHandler,
    policy: &RetryPolicy,
    poll_timeout: Duration,
    shutdown: &watch::Receiver<bool>,
) -> CoreResult<()> {
    let recovered = store.recover(keys).await?;
    if recovered > 0 {
        warn!("[Queue]回收未确认消息 topic={} count={}", topic, recovered);
    }

    while !*shutdown.borrow() {
        store.promote_due(keys, now_ms()).await?;
        let Some(raw) = store.reserve(keys, poll_timeout).await? else {
            continue;
        };

        let message = QueueMessage::decode(&raw);
        match dispatch(handler, topic, &message.body).await {
            Delivery::Done => store.ack(keys, &raw).await?,
            Delivery::Requeue => {
                let next = message.retried();
                if policy.exhausted(next.attempts) {
                    error!(
                        "[Queue]消息超过最大处理次数，移入死信 topic={} id={} attempts={}",
                        topic, next.id, next.attempts
                    );
                    store.bury(keys, &raw, &next.encode()?).await?;
                } else {
                    let delay = policy.delay(next.attempts);
                    let ready_at = now_ms().saturating_add(delay.as_millis() as i64);
                    store.retry_later(keys, &raw, &next.encode()?, ready_at).await?;
                }
            }
        }
    }
    Ok(())
}

/// 原子地把到期消息从延迟集合移回队列
const PROMOTE_SCRIPT: &str = r#"
local items = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1], 'LIMIT', 0, 100)
for _, item in ipairs(items) do
    redis.call('ZREM', KEYS[1], item)
    redis.call('LPUSH', KEYS[2], item)
end
return #items
"#;

/// 消费者独占的 Redis 连接
pub struct RedisConsumer {
    conn: redis::aio::Connection,
}

#[async_trait]
impl QueueStore for RedisConsumer {
    async fn reserve(&mut self, keys: &TopicKeys, timeout: Duration) -> CoreResult<Option<Vec<u8>>> {
        let timeout = timeout.as_secs().max(1) as usize;
        Ok(self
            .conn
            .brpoplpush(&keys.ready, &keys.processing, timeout as f64)
            .await?)
    }

    async fn ack(&mut self, keys: &TopicKeys, raw: &[u8]) -> CoreResult<()> {
        self.conn.lrem::<_, _, ()>(&keys.processing, 1, raw).await?;
        Ok(())
    }

    async fn retry_later(
        &mut self,
        keys: &TopicKeys,
        raw: &[u8],
        retry: &[u8],
        ready_at_ms: i64,
    ) -> CoreResult<()> {
        redis::pipe()
            .atomic()
            .zadd(&keys.delayed, retry, ready_at_ms)
            .ignore()
            .lrem(&keys.processing, 1, raw)
            .ignore()
            .query_async::<_, ()>(&mut self.conn)
            .await?;
        Ok(())
    }

    async fn bury(&mut self, keys: &TopicKeys, raw: &[u8], dead: &[u8]) -> CoreResult<()> {
        redis::pipe()
            .atomic()
            .lpush(&keys.dead, dead)
            .ignore()
            .lrem(&keys.processing, 1, raw)
            .ignore()
            .query_async::<_, ()>(&mut self.conn)
            .await?;
        Ok(())
    }

    async fn promote_due(&mut self, keys: &TopicKeys, now_ms: i64) -> CoreResult<usize> {
        let moved: usize = redis::Script::new(PROMOTE_SCRIPT)
            .key(&keys.delayed)
            .key(&keys.ready)
            .arg(now_ms)
            .invoke_async(&mut self.conn)
            .await?;
        Ok(moved)
    }

    async fn recover(&mut self, keys: &TopicKeys) -> CoreResult<usize> {
        let mut count = 0;
        loop {
            let moved: Option<Vec<u8>> = self
                .conn
                .rpoplpush(&keys.processing, &keys.ready)
                .await?;
            if moved.is_none() {
                return Ok(count);
            }
            count += 1;
        }
    }
}

#[derive(Clone)]
pub struct RedisQueue {
    client: Client,
    producer: ConnectionManager,
    key_prefix: String,
    poll_timeout: Duration,
    policy: RetryPolicy,
}

impl RedisQueue {
    pub async fn connect(redis: &RedisConfig, config: &QueueConfig) -> CoreResult<Self> {
        let mut redis = redis.clone();
        redis.apply_defaults();

        let client = Client::open(redis.url())?;
        let producer = ConnectionManager::new(client.clone()).await?;
        info!("[Queue]创建生产者成功: {}", redis.display_addr());
        Ok(Self {
            client,
            producer,
            key_prefix: config.key_prefix.clone(),
            poll_timeout: Duration::from_secs(config.poll_timeout_seconds.max(1)),
            policy: RetryPolicy::from_config(config),
        })
    }

    pub fn topic_key(&self, topic: &str) -> String {
        format!("{}{}", self.key_prefix, topic)
    }

    pub fn topic_keys(&self, topic: &str) -> TopicKeys {
        TopicKeys::new(&self.key_prefix, topic)
    }

    /// 生产消息
    pub async fn produce(&self, topic: &str, message: &[u8]) -> CoreResult<()> {
        let payload = QueueMessage::new(message).encode()?;
        let mut conn = self.producer.clone();
        conn.lpush::<_, _, ()>(self.topic_key(topic), payload).await?;
        Ok(())
    }

    /// 生产消息（异步），失败只记录日志
    pub fn produce_async(&self, topic: impl Into<String>, message: Vec<u8>) -> JoinHandle<()> {
        let queue = self.clone();
        let topic = topic.into();
        tokio::spawn(async move {
            if let Err(err) = queue.produce(&topic, &message).await {
                error!("[Queue]生产消息失败 topic={} err={}", topic, err);
            }
        })
    }

    /// 消费消息，直到 `shutdown` 变为 true
    ///
    /// 阻塞读取使用独立连接，不占用生产者的共享连接。
    pub async fn consume(
        &self,
        topic: &str,
        handler: Arc<dyn MessageHandler>,
        shutdown: watch::Receiver<bool>,
    ) -> CoreResult<()> {
        let keys = self.topic_keys(topic);
        let mut consumer = RedisConsumer {
            conn: self.client.get_async_connection().await?,
        };
        info!("[Queue]创建消费者成功 topic={}", topic);

        run_consumer(
            &mut consumer,
            &keys,
            topic,
            handler.as_ref(),
            &self.policy,
            self.poll_timeout,
            &shutdown,
        )
        .await?;

        info!("[Queue]消费者退出 topic={}", topic);
        Ok(())
    }

    /// 消费消息（异步）
    pub fn consume_async(
        &self,
        topic: impl Into<String>,
        handler: Arc<dyn MessageHandler>,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let queue = self.clone();
        let topic = topic.into();
        tokio::spawn(async move {
            if let Err(err) = queue.consume(&topic, handler, shutdown).await {
                error!("[Queue]消费者异常退出 topic={} err={}", topic, err);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::CoreError;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct Counter {
        seen: AtomicUsize,
    }

    #[async_trait]
    impl MessageHandler for Counter {
        async fn handle(&self, message: &[u8]) -> CoreResult<()> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            if message == b"bad" {
                return Err(CoreError::business("无法处理"));
            }
            Ok(())
        }
    }

    /// 记录处理顺序，`bad` 总是失败
    #[derive(Default)]
    struct Recorder {
        order: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MessageHandler for Recorder {
        async fn handle(&self, message: &[u8]) -> CoreResult<()> {
            let text = String::from_utf8_lossy(message).into_owned();
            self.order.lock().unwrap().push(text);
            if message == b"bad" {
                return Err(CoreError::business("无法处理"));
            }
            Ok(())
        }
    }

    /// 列表语义与 Redis 一致：头部写入，尾部取出；队列空闲时发出关闭信号
    struct MemoryStore {
        ready: VecDeque<Vec<u8>>,
        processing: Vec<Vec<u8>>,
        delayed: Vec<(i64, Vec<u8>)>,
        dead: Vec<Vec<u8>>,
        stop: watch::Sender<bool>,
    }

    impl MemoryStore {
        fn new(stop: watch::Sender<bool>) -> Self {
            Self {
                ready: VecDeque::new(),
                processing: Vec::new(),
                delayed: Vec::new(),
                dead: Vec::new(),
                stop,
            }
        }

        fn produce(&mut self, body: &[u8]) {
            let raw = QueueMessage::new(body).encode().unwrap();
            self.ready.push_front(raw);
        }

        fn remove_processing(&mut self, raw: &[u8]) {
            if let Some(pos) = self.processing.iter().position(|m| m == raw) {
                self.processing.remove(pos);
            }
        }
    }

    #[async_trait]
    impl QueueStore for MemoryStore {
        async fn reserve(&mut self, _: &TopicKeys, _: Duration) -> CoreResult<Option<Vec<u8>>> {
            match self.ready.pop_back() {
                Some(raw) => {
                    self.processing.push(raw.clone());
                    Ok(Some(raw))
                }
                None => {
                    if self.delayed.is_empty() {
                        let _ = self.stop.send(true);
                    }
                    Ok(None)
                }
            }
        }

        async fn ack(&mut self, _: &TopicKeys, raw: &[u8]) -> CoreResult<()> {
            self.remove_processing(raw);
            Ok(())
        }

        async fn retry_later(
            &mut self,
            _: &TopicKeys,
            raw: &[u8],
            retry: &[u8],
            ready_at_ms: i64,
        ) -> CoreResult<()> {
            self.delayed.push((ready_at_ms, retry.to_vec()));
            self.remove_processing(raw);
            Ok(())
        }

        async fn bury(&mut self, _: &TopicKeys, raw: &[u8], dead: &[u8]) -> CoreResult<()> {
            self.dead.push(dead.to_vec());
            self.remove_processing(raw);
            Ok(())
        }

        async fn promote_due(&mut self, _: &TopicKeys, now_ms: i64) -> CoreResult<usize> {
            let (due, pending): (Vec<_>, Vec<_>) =
                self.delayed.drain(..).partition(|(at, _)| *at <= now_ms);
            self.delayed = pending;
            let count = due.len();
            for (_, raw) in due {
                self.ready.push_front(raw);
            }
            Ok(count)
        }

        async fn recover(&mut self, _: &TopicKeys) -> CoreResult<usize> {
            let count = self.processing.len();
            for raw in self.processing.drain(..) {
                self.ready.push_back(raw);
            }
            Ok(count)
        }
    }

    fn immediate_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_attempts,
        }
    }

    #[tokio::test]
    async fn test_dispatch_requeues_on_error() {
        let handler = Counter {
            seen: AtomicUsize::new(0),
        };
        assert_eq!(dispatch(&handler, "t", b"ok").await, Delivery::Done);
        assert_eq!(dispatch(&handler, "t", b"bad").await, Delivery::Requeue);
        assert_eq!(handler.seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_consumer_retries_then_dead_letters() {
        let (stop, shutdown) = watch::channel(false);
        let mut store = MemoryStore::new(stop);
        store.produce(b"bad");
        store.produce(b"ok");

        let keys = TopicKeys::new("queue:", "order");
        let handler = Recorder::default();
        run_consumer(
            &mut store,
            &keys,
            "order",
            &handler,
            &immediate_retry(3),
            Duration::from_secs(1),
            &shutdown,
        )
        .await
        .unwrap();

        // 失败消息重新排到队尾，不阻塞其它消息
        let order = handler.order.lock().unwrap().clone();
        assert_eq!(order, vec!["bad", "ok", "bad", "bad"]);

        assert!(store.ready.is_empty());
        assert!(store.processing.is_empty());
        assert!(store.delayed.is_empty());
        assert_eq!(store.dead.len(), 1);
        let dead = QueueMessage::decode(&store.dead[0]);
        assert_eq!(dead.body, b"bad");
        assert_eq!(dead.attempts, 3);
    }

    #[tokio::test]
    async fn test_consumer_recovers_unacked_messages() {
        let (stop, shutdown) = watch::channel(false);
        let mut store = MemoryStore::new(stop);
        store
            .processing
            .push(QueueMessage::new(&b"left"[..]).encode().unwrap());

        let handler = Recorder::default();
        run_consumer(
            &mut store,
            &TopicKeys::new("queue:", "order"),
            "order",
            &handler,
            &immediate_retry(0),
            Duration::from_secs(1),
            &shutdown,
        )
        .await
        .unwrap();

        assert_eq!(*handler.order.lock().unwrap(), vec!["left"]);
        assert!(store.processing.is_empty());
    }

    #[tokio::test]
    async fn test_consumer_stops_when_shutdown_set() {
        let (stop, shutdown) = watch::channel(true);
        let mut store = MemoryStore::new(stop);
        store.produce(b"ok");

        let handler = Recorder::default();
        run_consumer(
            &mut store,
            &TopicKeys::new("queue:", "t"),
            "t",
            &handler,
            &immediate_retry(0),
            Duration::from_secs(1),
            &shutdown,
        )
        .await
        .unwrap();
        assert!(handler.order.lock().unwrap().is_empty());
        assert_eq!(store.ready.len(), 1);
    }

    #[test]
    fn test_retry_policy_backoff() {
        let policy = RetryPolicy::from_config(&QueueConfig::default());
        assert_eq!(policy.delay(1), Duration::from_secs(1));
        assert_eq!(policy.delay(2), Duration::from_secs(2));
        assert_eq!(policy.delay(3), Duration::from_secs(4));
        assert_eq!(policy.delay(10), Duration::from_secs(60));
        assert_eq!(policy.delay(64), Duration::from_secs(60));
        assert!(!policy.exhausted(9));
        assert!(policy.exhausted(10));
        assert!(!immediate_retry(0).exhausted(u32::MAX));
    }

    #[test]
    fn test_message_envelope() {
        let message = QueueMessage::new(&b"hello"[..]);
        let raw = message.encode().unwrap();
        assert_eq!(QueueMessage::decode(&raw), message);
        assert_eq!(message.retried().attempts, 1);
        assert_eq!(message.retried().id, message.id);

        let plain = QueueMessage::decode(b"not json");
        assert_eq!(plain.body, b"not json");
        assert_eq!(plain.attempts, 0);
    }

    #[test]
    fn test_topic_keys() {
        let keys = TopicKeys::new("queue:", "order");
        assert_eq!(keys.ready, "queue:order");
        assert_eq!(keys.processing, "queue:order:processing");
        assert_eq!(keys.delayed, "queue:order:delayed");
        assert_eq!(keys.dead, "queue:order:dead");
    }
}
