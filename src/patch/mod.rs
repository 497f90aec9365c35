//! # 守卫安装模块
//!
//! 把权限检查安装到路由表中的视图上：
//!
//! - **分类**: 函数视图、类视图分发入口、非视图
//! - **分发树遍历**: 为类的每个视图方法找到唯一的插入点
//! - **安装引擎**: 幂等地包装函数视图、挂载分发拦截器
//! - **延迟安装**: 第一次请求时安装
//!
//! ## 使用示例
//!
//! ```rust
//! use std::sync::Arc;
//! use rolegate::patch::PatchEngine;
//! use rolegate::rbac::{PolicyRegistry, Principal, RoleRules};
//! use rolegate::view::{Request, Response, RouteTable, ViewClass};
//!
//! let registry = Arc::new(PolicyRegistry::builder().default_roles().build().unwrap());
//!
//! let base = ViewClass::builder("app.views", "BaseView")
//!     .method("get", |_| Ok(Response::ok("listing")))
//!     .view_permissions("get", RoleRules::allowed(["user"]))
//!     .build()
//!     .unwrap();
//! let admin_only = ViewClass::builder("app.views", "AdminView")
//!     .base(&base)
//!     .view_permissions("get", RoleRules::allowed(["admin"]))
//!     .build()
//!     .unwrap();
//!
//! let mut routes = RouteTable::new()
//!     .route("items/", base.as_view())
//!     .route("admin/items/", admin_only.as_view());
//!
//! let engine = PatchEngine::new(registry);
//! let report = engine.patch(&mut routes).unwrap();
//! // BaseView.get 只安装一次
//! assert_eq!(report.insertion_points_installed, 1);
//! assert_eq!(report.insertion_points_reused, 1);
//!
//! let alice = Principal::new("alice");
//! assert_eq!(routes.handle(&Request::get("/items/").with_principal(alice.clone())).status, 200);
//! assert_eq!(routes.handle(&Request::get("/admin/items/").with_principal(alice)).status, 403);
//! ```

mod classify;
mod engine;
mod guard;
mod lazy;
mod table;
mod walker;

pub use classify::{Classification, classify, is_view_method};
pub use engine::{PatchEngine, PatchEngineBuilder, PatchReport};
pub use guard::{GuardedView, Interception, PermissionGuard};
pub use lazy::LazyRoutes;
pub use table::{GuardTable, HandlerDescriptor, HandlerKey, HandlerKind};
pub use walker::{InsertionPoint, owner_of, resolve_insertion_points, view_method_names};

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
