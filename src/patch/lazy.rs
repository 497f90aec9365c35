//! 首次请求时安装
//!
//! [`LazyRoutes`] 在第一次处理请求时执行安装；并发的首批请求只会安装一次。

use crate::error::Result;
use crate::patch::engine::{PatchEngine, PatchReport};
use crate::patch::{read, write};
use crate::view::{Request, Response, RouteTable};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

/// 延迟安装的路由表
#[derive(Debug)]
pub struct LazyRoutes {
    engine: PatchEngine,
    routes: RwLock<RouteTable>,
    barrier: Mutex<Option<PatchReport>>,
    patched: AtomicBool,
}

impl LazyRoutes {
    /// 包装路由表
    pub fn new(routes: RouteTable, engine: PatchEngine) -> Self {
        Self {
            engine,
            routes: RwLock::new(routes),
            barrier: Mutex::new(None),
            patched: AtomicBool::new(false),
        }
    }

    /// 安装引擎
    pub fn engine(&self) -> &PatchEngine {
        &self.engine
    }

    /// 是否已完成安装
    pub fn is_patched(&self) -> bool {
        self.patched.load(Ordering::Acquire)
    }

    /// 安装结果（尚未安装时为 `None`）
    pub fn report(&self) -> Option<PatchReport> {
        self.barrier
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 确保已安装，返回首次安装的结果
    pub fn ensure_patched(&self) -> Result<PatchReport> {
        let mut done = self.barrier.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(report) = done.as_ref() {
            return Ok(report.clone());
        }

        let report = self.engine.patch(&mut write(&self.routes))?;
        *done = Some(report.clone());
        self.patched.store(true, Ordering::Release);
        Ok(report)
    }

    /// 处理请求，首次调用时先安装
    pub fn handle(&self, request: &Request) -> Response {
        if !self.is_patched() {
            if let Err(error) = self.ensure_patched() {
                tracing::error!(error = %error, "failed to install permission guards");
                return Response::new(500, "Internal Server Error");
            }
        }
        read(&self.routes).handle(request)
    }

    /// 取回路由表
    pub fn into_inner(self) -> RouteTable {
        self.routes
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
