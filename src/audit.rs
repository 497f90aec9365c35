//! 审计日志模块
//!
//! 记录守卫产生的安全事件：
//!
//! - **访问决策**: 允许、拒绝、规则求值失败
//! - **安装事件**: 视图被包装、插入点安装、重复包装
//! - **配置告警**: 启动阶段发现但不致命的问题
//!
//! ## 使用示例
//!
//! ```rust
//! use rolegate::audit::{AuditLogger, EventSeverity, EventType, InMemoryAuditLogger, SecurityEvent};
//!
//! let logger = InMemoryAuditLogger::new();
//!
//! logger.log(SecurityEvent::permission_granted("alice", "app.views.list_users", "admin"));
//! logger.log(SecurityEvent::permission_denied(Some("bob"), "app.views.list_users", "no rule"));
//!
//! assert_eq!(logger.event_count(), 2);
//! assert_eq!(logger.get_events_by_principal("bob").len(), 1);
//! assert_eq!(logger.get_events_by_type(&EventType::PermissionDenied).len(), 1);
//! assert_eq!(logger.get_events_by_severity(EventSeverity::Warning).len(), 1);
//! ```

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};

/// 事件严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EventSeverity {
    /// 调试信息
    Debug,
    /// 一般信息
    #[default]
    Info,
    /// 警告
    Warning,
    /// 错误
    Error,
    /// 严重
    Critical,
}

impl std::fmt::Display for EventSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventSeverity::Debug => write!(f, "DEBUG"),
            EventSeverity::Info => write!(f, "INFO"),
            EventSeverity::Warning => write!(f, "WARNING"),
            EventSeverity::Error => write!(f, "ERROR"),
            EventSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// 安全事件类型
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// 允许访问
    PermissionGranted,
    /// 拒绝访问
    PermissionDenied,
    /// 规则或角色成员测试求值失败
    PredicateFailed,
    /// 视图被包装
    HandlerPatched,
    /// 插入点安装
    InsertionPointInstalled,
    /// 检测到重复包装
    DoublePatchDetected,
    /// 配置告警
    ConfigWarning,
    /// 自定义事件
    Custom(String),
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::PermissionGranted => write!(f, "permission_granted"),
            EventType::PermissionDenied => write!(f, "permission_denied"),
            EventType::PredicateFailed => write!(f, "predicate_failed"),
            EventType::HandlerPatched => write!(f, "handler_patched"),
            EventType::InsertionPointInstalled => write!(f, "insertion_point_installed"),
            EventType::DoublePatchDetected => write!(f, "double_patch_detected"),
            EventType::ConfigWarning => write!(f, "config_warning"),
            EventType::Custom(name) => write!(f, "custom:{}", name),
        }
    }
}

/// 安全事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    /// 事件 ID
    pub id: String,
    /// 事件类型
    pub event_type: EventType,
    /// 严重程度
    pub severity: EventSeverity,
    /// 主体 ID（匿名请求为空）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<String>,
    /// 视图或类方法的完整路径
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,
    /// 相关角色
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// 事件消息
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// 额外详情
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub details: HashMap<String, String>,
    /// 事件时间
    pub timestamp: DateTime<Utc>,
}

impl SecurityEvent {
    /// 创建新的安全事件
    pub fn new(event_type: EventType, severity: EventSeverity) -> Self {
        Self {
            id: generate_event_id(),
            event_type,
            severity,
            principal_id: None,
            handler: None,
            role: None,
            message: None,
            details: HashMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// 创建自定义事件
    pub fn custom(name: impl Into<String>, severity: EventSeverity) -> Self {
        Self::new(EventType::Custom(name.into()), severity)
    }

    // ========================================================================
    // 便捷构造方法
    // ========================================================================

    /// 允许访问
    pub fn permission_granted(
        principal_id: impl Into<String>,
        handler: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        Self::new(EventType::PermissionGranted, EventSeverity::Info)
            .with_principal_id(principal_id)
            .with_handler(handler)
            .with_role(role)
    }

    /// 拒绝访问
    pub fn permission_denied(
        principal_id: Option<impl Into<String>>,
        handler: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        let event = Self::new(EventType::PermissionDenied, EventSeverity::Warning)
            .with_handler(handler)
            .with_message(reason);
        match principal_id {
            Some(id) => event.with_principal_id(id),
            None => event,
        }
    }

    /// 规则求值失败
    pub fn predicate_failed(
        handler: impl Into<String>,
        subject: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self::new(EventType::PredicateFailed, EventSeverity::Error)
            .with_handler(handler)
            .with_detail("subject", subject)
            .with_message(error)
    }

    /// 视图被包装
    pub fn handler_patched(handler: impl Into<String>) -> Self {
        Self::new(EventType::HandlerPatched, EventSeverity::Debug).with_handler(handler)
    }

    /// 插入点安装
    pub fn insertion_point_installed(handler: impl Into<String>) -> Self {
        Self::new(EventType::InsertionPointInstalled, EventSeverity::Debug)
            .with_handler(handler)
    }

    /// 检测到重复包装
    pub fn double_patch_detected(handler: impl Into<String>) -> Self {
        Self::new(EventType::DoublePatchDetected, EventSeverity::Error)
            .with_handler(handler)
            .with_message("handler already carries a foreign permission guard")
    }

    /// 配置告警
    pub fn config_warning(message: impl Into<String>) -> Self {
        Self::new(EventType::ConfigWarning, EventSeverity::Warning).with_message(message)
    }

    // ========================================================================
    // Builder 方法
    // ========================================================================

    /// 设置主体 ID
    pub fn with_principal_id(mut self, principal_id: impl Into<String>) -> Self {
        self.principal_id = Some(principal_id.into());
        self
    }

    /// 设置视图路径
    pub fn with_handler(mut self, handler: impl Into<String>) -> Self {
        self.handler = Some(handler.into());
        self
    }

    /// 设置角色
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// 设置消息
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// 添加详情
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// 设置严重程度
    pub fn with_severity(mut self, severity: EventSeverity) -> Self {
        self.severity = severity;
        self
    }

    // ========================================================================
    // 查询方法
    // ========================================================================

    /// 事件类型名称
    pub fn event_name(&self) -> String {
        self.event_type.to_string()
    }

    /// 是否是高严重程度事件
    pub fn is_high_severity(&self) -> bool {
        matches!(
            self.severity,
            EventSeverity::Error | EventSeverity::Critical
        )
    }

    /// 是否是访问决策事件
    pub fn is_access_event(&self) -> bool {
        matches!(
            self.event_type,
            EventType::PermissionGranted | EventType::PermissionDenied
        )
    }
}

/// 生成事件 ID
fn generate_event_id() -> String {
    let mut rng = rand::rng();
    format!("evt_{:016x}{:016x}", rng.random::<u64>(), rng.random::<u64>())
}

// ============================================================================
// AuditLogger Trait
// ============================================================================

/// 审计日志记录器 trait
pub trait AuditLogger: Send + Sync {
    /// 记录安全事件
    fn log(&self, event: SecurityEvent);

    /// 批量记录事件
    fn log_batch(&self, events: Vec<SecurityEvent>) {
        for event in events {
            self.log(event);
        }
    }
}

// ============================================================================
// InMemoryAuditLogger
// ============================================================================

/// 内存审计日志记录器
///
/// 用于测试和开发环境；克隆共享同一份事件存储
#[derive(Debug, Default, Clone)]
pub struct InMemoryAuditLogger {
    events: Arc<RwLock<VecDeque<SecurityEvent>>>,
    max_events: Option<usize>,
}

impl InMemoryAuditLogger {
    /// 创建新的内存日志记录器
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建带有最大事件数限制的日志记录器
    ///
    /// 上限为 0 时不保留任何事件
    pub fn with_max_events(max: usize) -> Self {
        Self {
            events: Arc::new(RwLock::new(VecDeque::new())),
            max_events: Some(max),
        }
    }

    fn filtered(&self, predicate: impl Fn(&SecurityEvent) -> bool) -> Vec<SecurityEvent> {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| predicate(e))
            .cloned()
            .collect()
    }

    /// 获取所有事件
    pub fn get_events(&self) -> Vec<SecurityEvent> {
        self.filtered(|_| true)
    }

    /// 事件数量
    pub fn event_count(&self) -> usize {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// 按主体 ID 获取事件
    pub fn get_events_by_principal(&self, principal_id: &str) -> Vec<SecurityEvent> {
        self.filtered(|e| e.principal_id.as_deref() == Some(principal_id))
    }

    /// 按视图路径获取事件
    pub fn get_events_by_handler(&self, handler: &str) -> Vec<SecurityEvent> {
        self.filtered(|e| e.handler.as_deref() == Some(handler))
    }

    /// 按事件类型获取事件
    pub fn get_events_by_type(&self, event_type: &EventType) -> Vec<SecurityEvent> {
        self.filtered(|e| &e.event_type == event_type)
    }

    /// 按严重程度获取事件
    pub fn get_events_by_severity(&self, severity: EventSeverity) -> Vec<SecurityEvent> {
        self.filtered(|e| e.severity == severity)
    }

    /// 获取时间范围内的事件
    pub fn get_events_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<SecurityEvent> {
        self.filtered(|e| e.timestamp >= start && e.timestamp <= end)
    }

    /// 获取最近 N 个事件（新的在前）
    pub fn get_recent_events(&self, count: usize) -> Vec<SecurityEvent> {
        let events = self.events.read().unwrap_or_else(PoisonError::into_inner);
        events.iter().rev().take(count).cloned().collect()
    }

    /// 清空所有事件
    pub fn clear(&self) {
        self.events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// 获取统计信息
    pub fn get_stats(&self) -> AuditStats {
        let events = self.events.read().unwrap_or_else(PoisonError::into_inner);
        let mut stats = AuditStats {
            total_events: events.len(),
            ..Default::default()
        };

        for event in events.iter() {
            match event.severity {
                EventSeverity::Debug => stats.debug_count += 1,
                EventSeverity::Info => stats.info_count += 1,
                EventSeverity::Warning => stats.warning_count += 1,
                EventSeverity::Error => stats.error_count += 1,
                EventSeverity::Critical => stats.critical_count += 1,
            }

            *stats.events_by_type.entry(event.event_name()).or_insert(0) += 1;
        }

        stats
    }
}

impl AuditLogger for InMemoryAuditLogger {
    fn log(&self, event: SecurityEvent) {
        if self.max_events == Some(0) {
            return;
        }
        let mut events = self.events.write().unwrap_or_else(PoisonError::into_inner);

        // 超过上限时丢弃最旧的事件
        if let Some(max) = self.max_events {
            while events.len() >= max {
                events.pop_front();
            }
        }

        events.push_back(event);
    }
}

/// 审计统计信息
#[derive(Debug, Default, Clone)]
pub struct AuditStats {
    /// 总事件数
    pub total_events: usize,
    /// Debug 级别事件数
    pub debug_count: usize,
    /// Info 级别事件数
    pub info_count: usize,
    /// Warning 级别事件数
    pub warning_count: usize,
    /// Error 级别事件数
    pub error_count: usize,
    /// Critical 级别事件数
    pub critical_count: usize,
    /// 按类型统计
    pub events_by_type: HashMap<String, usize>,
}

// ============================================================================
// TracingAuditLogger
// ============================================================================

/// 将事件写入 `tracing` 的日志记录器
///
/// 严重程度映射到对应的日志级别，目标为 `rolegate::audit`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditLogger;

impl TracingAuditLogger {
    /// 创建新的记录器
    pub fn new() -> Self {
        Self
    }
}

impl AuditLogger for TracingAuditLogger {
    fn log(&self, event: SecurityEvent) {
        let principal = event.principal_id.as_deref().unwrap_or("-");
        let handler = event.handler.as_deref().unwrap_or("-");
        let message = event.message.as_deref().unwrap_or("");
        match event.severity {
            EventSeverity::Debug => tracing::debug!(
                target: "rolegate::audit",
                event = %event.event_type, principal, handler, message
            ),
            EventSeverity::Info => tracing::info!(
                target: "rolegate::audit",
                event = %event.event_type, principal, handler, message
            ),
            EventSeverity::Warning => tracing::warn!(
                target: "rolegate::audit",
                event = %event.event_type, principal, handler, message
            ),
            EventSeverity::Error | EventSeverity::Critical => tracing::error!(
                target: "rolegate::audit",
                event = %event.event_type, principal, handler, message
            ),
        }
    }
}

// ============================================================================
// NoOpAuditLogger
// ============================================================================

/// 空操作日志记录器
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpAuditLogger;

impl NoOpAuditLogger {
    /// 创建新的空操作日志记录器
    pub fn new() -> Self {
        Self
    }
}

impl AuditLogger for NoOpAuditLogger {
    fn log(&self, _event: SecurityEvent) {}
}
