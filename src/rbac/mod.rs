//! # RBAC (Role-Based Access Control) 模块
//!
//! 提供视图权限的声明与求值：
//!
//! - **规则谓词**: 静态布尔规则或在请求上下文上求值的动态谓词
//! - **角色解析**: 根据角色成员测试得到主体持有的角色集合
//! - **权限检查**: 结合声明的规则与持有角色做出允许/拒绝决策
//! - **策略注册表**: 启动时构建一次的角色与权限声明
//!
//! ## 基本概念
//!
//! - **Principal（主体）**: 发起请求的已认证实体，匿名请求为 `None`
//! - **Role（角色）**: 对主体的命名成员测试，一个主体可以同时持有多个角色
//! - **RoleRules（规则）**: 视图声明的 `角色 → 规则` 映射
//!
//! ## 使用示例
//!
//! ```rust
//! use rolegate::rbac::{PermissionChecker, PolicyRegistry, Principal, RoleRules, RuleContext};
//! use rolegate::view::{Request, ViewArgs, ViewInfo};
//!
//! let registry = PolicyRegistry::builder().default_roles().build().unwrap();
//!
//! let request = Request::get("/reports");
//! let admin = Principal::new("root").superuser();
//! let resolution = registry.resolve_roles(Some(&admin), &request);
//!
//! let rules = RoleRules::allowed(["admin"]).deny("user");
//! let view = ViewInfo::function("app.views.reports");
//! let args = ViewArgs::new();
//! let ctx = RuleContext::new(Some(&admin), &request, &view, &args);
//!
//! // admin 与 user 同时持有时，允许优先
//! let decision = PermissionChecker::check(&rules, &resolution.roles, &ctx);
//! assert!(decision.is_allowed());
//! assert_eq!(decision.matched_role.as_deref(), Some("admin"));
//! ```

mod permission;
mod policy;
mod predicate;
mod principal;
mod role;

pub use permission::{PermissionChecker, PermissionDecision, RoleRules};
pub use policy::{ANY_METHOD, PermissionSpec, PolicyRegistry, PolicyRegistryBuilder, Selector};
pub use predicate::{Predicate, PredicateFailure, Rule, RuleContext, RuleOutcome};
pub use principal::{Principal, PrincipalProvider, RequestPrincipal};
pub use role::{ADMIN, ANON, RoleDefinition, RoleResolution, RoleResolver, RoleSet, STAFF, USER};
