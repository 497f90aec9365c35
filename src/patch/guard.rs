//! 视图前置守卫
//!
//! [`Interception`] 是安装到视图上的拦截器，每次调用按以下顺序执行：
//!
//! 1. 同一视图在本请求中已检查过则直接调用视图
//! 2. 查找视图的声明权限；未声明时按 [`UndeclaredPolicy`] 处理
//! 3. 获取当前主体，解析持有的角色
//! 4. 权限检查；拒绝时返回 [`ViewError::PermissionDenied`]，不调用视图

use crate::audit::{AuditLogger, SecurityEvent};
use crate::config::UndeclaredPolicy;
use crate::error::{ViewError, ViewResult};
use crate::patch::table::{GuardTable, HandlerKey};
use crate::rbac::{
    PermissionChecker, PermissionDecision, PolicyRegistry, PredicateFailure, PrincipalProvider,
    RoleRules, RuleContext,
};
use crate::view::{
    CallableId, CallableMeta, CheckedHandlers, ClassId, FunctionView, Request, Response,
    ViewArgs, ViewContext,
};
use std::fmt;
use std::sync::Arc;

/// 权限守卫
pub struct PermissionGuard {
    registry: Arc<PolicyRegistry>,
    principals: Arc<dyn PrincipalProvider>,
    audit: Arc<dyn AuditLogger>,
}

impl PermissionGuard {
    /// 创建守卫
    pub fn new(
        registry: Arc<PolicyRegistry>,
        principals: Arc<dyn PrincipalProvider>,
        audit: Arc<dyn AuditLogger>,
    ) -> Self {
        Self {
            registry,
            principals,
            audit,
        }
    }

    /// 策略注册表
    pub fn registry(&self) -> &Arc<PolicyRegistry> {
        &self.registry
    }

    fn audit_failures(&self, handler: &str, failures: &[PredicateFailure]) {
        for failure in failures {
            self.audit.log(SecurityEvent::predicate_failed(
                handler,
                failure.subject.as_str(),
                failure.error.message(),
            ));
        }
    }

    /// 在视图执行前做出权限决策
    pub fn before_view(&self, ctx: &ViewContext<'_>, rules: &RoleRules) -> PermissionDecision {
        let request = ctx.request();
        let handler = ctx.view().name.as_str();
        let principal = self.principals.current_principal(request);
        let principal_id = principal.as_ref().map(|p| p.id().to_string());

        let resolution = self.registry.resolve_roles(principal.as_ref(), request);
        self.audit_failures(handler, &resolution.failures);

        let rule_ctx = RuleContext::new(principal.as_ref(), request, ctx.view(), ctx.args());
        let decision = PermissionChecker::check(rules, &resolution.roles, &rule_ctx);
        self.audit_failures(handler, &decision.failures);

        if decision.is_allowed() {
            tracing::debug!(
                handler,
                principal = principal_id.as_deref().unwrap_or("anonymous"),
                role = decision.matched_role.as_deref().unwrap_or(""),
                "permission granted"
            );
            self.audit.log(SecurityEvent::permission_granted(
                principal_id.as_deref().unwrap_or("anonymous"),
                handler,
                decision.matched_role.as_deref().unwrap_or(""),
            ));
        } else {
            tracing::info!(
                handler,
                principal = principal_id.as_deref().unwrap_or("anonymous"),
                roles = %resolution.roles,
                reason = %decision.reason,
                "permission denied"
            );
            self.audit.log(SecurityEvent::permission_denied(
                principal_id,
                handler,
                decision.reason.as_str(),
            ));
        }

        decision
    }

    fn deny_undeclared(&self, ctx: &ViewContext<'_>) -> ViewResult<Response> {
        let handler = ctx.view().name.as_str();
        let principal_id = self
            .principals
            .current_principal(ctx.request())
            .map(|p| p.id().to_string());
        tracing::info!(handler, "no permission declared, denying by configuration");
        self.audit.log(SecurityEvent::permission_denied(
            principal_id,
            handler,
            "no permission declared",
        ));
        Err(ViewError::PermissionDenied)
    }
}

impl fmt::Debug for PermissionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionGuard")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// 安装到视图上的拦截器
///
/// 同一个引擎安装的所有视图共享一个拦截器；通过 [`Arc::ptr_eq`] 区分不同引擎的拦截器
pub struct Interception {
    guard: PermissionGuard,
    table: Arc<GuardTable>,
}

impl Interception {
    pub(crate) fn new(guard: PermissionGuard, table: Arc<GuardTable>) -> Self {
        Self { guard, table }
    }

    /// 守卫
    pub fn guard(&self) -> &PermissionGuard {
        &self.guard
    }

    /// 守卫表
    pub fn table(&self) -> &Arc<GuardTable> {
        &self.table
    }

    /// （类，方法）上是否安装了插入点
    pub fn guards(&self, class: ClassId, method: &str) -> bool {
        self.table.has_insertion_point(class, method)
    }

    pub(crate) fn run<F>(&self, ctx: &ViewContext<'_>, key: &HandlerKey, body: F) -> ViewResult<Response>
    where
        F: FnOnce() -> ViewResult<Response>,
    {
        if ctx.is_checked(key) {
            return body();
        }

        let Some(rules) = self.table.declared(key) else {
            return match self.guard.registry.config().undeclared {
                UndeclaredPolicy::PassThrough => body(),
                UndeclaredPolicy::Deny => {
                    ctx.mark_checked(key);
                    self.guard.deny_undeclared(ctx)
                }
            };
        };

        ctx.mark_checked(key);
        if self.guard.before_view(ctx, &rules).is_allowed() {
            body()
        } else {
            Err(ViewError::PermissionDenied)
        }
    }
}

impl fmt::Debug for Interception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interception")
            .field("handlers", &self.table.len())
            .finish()
    }
}

/// 已包装的函数视图
///
/// 持有原视图与复制的元数据，对外表现与原视图一致
#[derive(Clone)]
pub struct GuardedView {
    original: FunctionView,
    meta: CallableMeta,
    interception: Arc<Interception>,
}

impl GuardedView {
    pub(crate) fn new(original: FunctionView, interception: Arc<Interception>) -> Self {
        Self {
            meta: original.meta().clone(),
            original,
            interception,
        }
    }

    /// 元数据（与原视图相同）
    pub fn meta(&self) -> &CallableMeta {
        &self.meta
    }

    /// 原视图
    pub fn wrapped(&self) -> &FunctionView {
        &self.original
    }

    /// 原视图的标识
    pub fn wrapped_id(&self) -> CallableId {
        self.original.id()
    }

    pub(crate) fn interception(&self) -> &Arc<Interception> {
        &self.interception
    }

    pub(crate) fn invoke(
        &self,
        request: &Request,
        args: &ViewArgs,
        checked: &CheckedHandlers,
    ) -> ViewResult<Response> {
        let ctx = ViewContext::new(request, args, self.original.view_info(), checked);
        let key = HandlerKey::Function(self.original.id());
        self.interception
            .run(&ctx, &key, || self.original.call_body(&ctx))
    }
}

impl fmt::Debug for GuardedView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardedView")
            .field("meta", &self.meta)
            .field("wrapped", &self.original.id())
            .finish()
    }
}
