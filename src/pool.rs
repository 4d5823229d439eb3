//! 协程池
//!
//! 固定数量的 worker 从有界任务通道中取任务执行，结果统一收集，
//! `close_and_wait` 等待所有已提交任务完成后返回全部结果。

use async_channel::{bounded, unbounded, Receiver, Sender};
use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::core::error::{CoreError, CoreResult};

pub const RESULT_SUCCESS: &str = "success";
pub const RESULT_FAIL: &str = "fail";

/// 单个任务的执行结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskResult {
    pub data: Value,
    pub result: String,
    pub error: Option<String>,
}

impl TaskResult {
    pub fn success(data: Value) -> Self {
        Self {
            data,
            result: RESULT_SUCCESS.to_string(),
            error: None,
        }
    }

    pub fn fail(data: Value, error: impl Into<String>) -> Self {
        Self {
            data,
            result: RESULT_FAIL.to_string(),
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result == RESULT_SUCCESS
    }
}

/// 任务运行时可读取的上下文
#[derive(Debug, Clone)]
pub struct PoolContext {
    cancel: watch::Receiver<bool>,
}

impl PoolContext {
    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// 等待取消信号
    pub async fn cancelled(&mut self) {
        while !*self.cancel.borrow() {
            if self.cancel.changed().await.is_err() {
                return;
            }
        }
    }
}

type TaskFn = Box<dyn FnOnce(PoolContext) -> BoxFuture<'static, TaskResult> + Send>;

pub struct WorkerPool {
    max_workers: usize,
    task_tx: Sender<TaskFn>,
    task_rx: Receiver<TaskFn>,
    result_tx: Sender<TaskResult>,
    result_rx: Receiver<TaskResult>,
    cancel_tx: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// `task_num` 为任务通道容量
    pub fn new(max_workers: usize, task_num: usize) -> Self {
        let (task_tx, task_rx) = bounded(task_num.max(1));
        let (result_tx, result_rx) = unbounded();
        let (cancel_tx, _) = watch::channel(false);
        Self {
            max_workers: max_workers.max(1),
            task_tx,
            task_rx,
            result_tx,
            result_rx,
            cancel_tx,
            workers: Vec::new(),
        }
    }

    /// 启动 worker
    pub fn run(&mut self) {
        for i in 0..self.max_workers {
            let task_rx = self.task_rx.clone();
            let result_tx = self.result_tx.clone();
            let mut cancel_rx = self.cancel_tx.subscribe();

            self.workers.push(tokio::spawn(async move {
                loop {
                    if *cancel_rx.borrow() {
                        break;
                    }
                    let task = tokio::select! {
                        _ = cancel_rx.changed() => continue,
                        task = task_rx.recv() => match task {
                            Ok(task) => task,
                            Err(_) => break,
                        },
                    };

                    let ctx = PoolContext {
                        cancel: cancel_rx.clone(),
                    };
                    // 单独 spawn 以捕获任务中的 panic
                    let result = match tokio::spawn(task(ctx)).await {
                        Ok(result) => result,
                        Err(e) => {
                            error!("协程池任务异常: {}", e);
                            TaskResult::fail(Value::Null, e.to_string())
                        }
                    };
                    if result_tx.send(result).await.is_err() {
                        break;
                    }
                }
                info!("协程池 worker {} 退出", i);
            }));
        }
    }

    /// 提交任务，任务通道已满时等待
    pub async fn submit<F, Fut>(&self, task: F) -> CoreResult<()>
    where
        F: FnOnce(PoolContext) -> Fut + Send + 'static,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        let task: TaskFn = Box::new(move |ctx| Box::pin(task(ctx)));
        self.task_tx
            .send(task)
            .await
            .map_err(|_| CoreError::internal("协程池已关闭"))
    }

    /// 取消所有任务，未开始的任务不再执行
    pub fn cancel(&self) {
        self.cancel_tx.send_replace(true);
    }

    /// 等待所有任务完成并返回全部结果
    pub async fn close_and_wait(self) -> Vec<TaskResult> {
        self.task_tx.close();
        for worker in self.workers {
            if let Err(e) = worker.await {
                error!("协程池 worker 异常退出: {}", e);
            }
        }
        self.result_tx.close();

        let mut results = Vec::new();
        while let Ok(result) = self.result_rx.try_recv() {
            results.push(result);
        }
        results
    }
}

/// 执行业务处理并转换为任务结果
///
/// 处理函数返回 `Some` 时以其作为结果数据，否则使用原始数据；
/// 返回错误时结果为 fail。
pub fn business_handle<T, R, F>(data: T, handle: F) -> TaskResult
where
    T: Serialize,
    R: Serialize,
    F: FnOnce(&T) -> CoreResult<Option<R>>,
{
    match handle(&data) {
        Ok(Some(output)) => TaskResult::success(to_value(&output)),
        Ok(None) => TaskResult::success(to_value(&data)),
        Err(err) => {
            error!("协程池中业务处理错误：{}", err);
            TaskResult::fail(to_value(&data), err.to_string())
        }
    }
}

fn to_value<V: Serialize>(value: &V) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
