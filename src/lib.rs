//! # rolegate
//!
//! 面向 Web 视图的基于角色的访问控制（RBAC）拦截层。
//!
//! ## 功能特性
//!
//! - **声明式权限**: 在视图、类属性或集中注册表上声明 `角色 → 规则`
//! - **动态规则**: 规则可以是在请求上下文上求值的谓词，求值失败按未满足处理
//! - **路由表安装**: 遍历路由表，包装函数视图，为类视图的每个视图方法安装唯一的插入点
//! - **幂等安装**: 重复安装不会叠加守卫，继承自同一祖先的方法只检查一次
//! - **元数据保持**: 包装后的视图保留名称、限定名、模块与签名，URL 反解照常工作
//! - **审计日志**: 记录允许、拒绝、规则求值失败与安装事件
//!
//! ## 快速开始
//!
//! ```rust
//! use std::sync::Arc;
//! use rolegate::{PatchEngine, PolicyRegistry, Principal, RoleRules};
//! use rolegate::view::{FunctionView, Request, Response, RouteTable, ViewClass};
//!
//! // 启动时构建一次注册表
//! let registry = PolicyRegistry::builder()
//!     .default_roles()
//!     .permission("app.views.dashboard", RoleRules::allowed(["staff", "admin"]))
//!     .build()
//!     .unwrap();
//!
//! let users = ViewClass::builder("app.views", "UserView")
//!     .method("get", |_| Ok(Response::ok("users")))
//!     .view_permissions("get", RoleRules::allowed(["admin"]))
//!     .build()
//!     .unwrap();
//!
//! let mut routes = RouteTable::new()
//!     .route("dashboard/", FunctionView::new("app.views", "dashboard", |_| Ok(Response::ok("dashboard"))))
//!     .named_route("users/", "user-list", users.as_view());
//!
//! let engine = PatchEngine::new(Arc::new(registry));
//! engine.patch(&mut routes).unwrap();
//!
//! let staff = Principal::new("sam").staff();
//! assert_eq!(routes.handle(&Request::get("/dashboard/").with_principal(staff.clone())).status, 200);
//! assert_eq!(routes.handle(&Request::get("/users/").with_principal(staff)).status, 403);
//!
//! // 反解不受包装影响
//! assert_eq!(routes.reverse("UserView", &Default::default()).as_deref(), Some("/users/"));
//! ```
//!
//! ## 日志
//!
//! 库通过 `tracing` 输出日志，不安装任何 subscriber；
//! 审计事件默认写入 `rolegate::audit` 目标。

pub mod audit;
pub mod config;
pub mod error;
pub mod patch;
pub mod rbac;
pub mod view;

pub use error::{ConfigError, Error, PredicateError, Result, ViewError, ViewResult};

// ============================================================================
// 配置导出
// ============================================================================

pub use config::{ConfigSeverity, GuardConfig, UndeclaredPolicy};

// ============================================================================
// RBAC 导出
// ============================================================================

pub use rbac::{
    PermissionChecker, PermissionDecision, PolicyRegistry, PolicyRegistryBuilder, Predicate,
    Principal, PrincipalProvider, RoleDefinition, RoleRules, RoleSet, Rule, RuleContext,
    RuleOutcome, Selector,
};

// ============================================================================
// 安装导出
// ============================================================================

pub use patch::{LazyRoutes, PatchEngine, PatchReport};

// ============================================================================
// 审计导出
// ============================================================================

pub use audit::{
    AuditLogger, AuditStats, EventSeverity, EventType, InMemoryAuditLogger, NoOpAuditLogger,
    SecurityEvent, TracingAuditLogger,
};
