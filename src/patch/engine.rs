//! 安装引擎
//!
//! 一次安装遍历整张路由表：分类每个可调用对象，包装函数视图，为类视图计算插入点
//! 并把拦截器挂到分发入口上。遍历是幂等的，重复执行不会叠加守卫。
//!
//! 安装分两步：先校验（未知角色、缺少插入点、严格模式下的重复包装），
//! 校验通过后再修改路由表，因此出错时路由表保持原样。

use crate::audit::{AuditLogger, SecurityEvent, TracingAuditLogger};
use crate::config::ConfigSeverity;
use crate::error::{ConfigError, Error, Result};
use crate::patch::classify::{Classification, classify};
use crate::patch::guard::{GuardedView, Interception, PermissionGuard};
use crate::patch::table::{GuardTable, HandlerDescriptor, HandlerKey, HandlerKind};
use crate::patch::walker::{InsertionPoint, owner_of, resolve_insertion_points};
use crate::rbac::{PolicyRegistry, PrincipalProvider, RequestPrincipal};
use crate::view::{Callable, DispatchView, FunctionView, RouteTable, ViewClass};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// 一次安装的结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatchReport {
    /// 新包装的函数视图
    pub functions_wrapped: usize,
    /// 新挂载拦截器的分发入口
    pub dispatch_attached: usize,
    /// 新安装的插入点
    pub insertion_points_installed: usize,
    /// 已由其他分发入口安装过的插入点
    pub insertion_points_reused: usize,
    /// 已由本引擎安装过守卫的路由
    pub already_patched: usize,
    /// 带有其他守卫、保持原样的路由
    pub foreign_guards: usize,
    /// 跳过的非视图路由
    pub skipped: Vec<String>,
    /// 告警
    pub warnings: Vec<String>,
}

impl PatchReport {
    /// 本次安装没有做任何修改
    pub fn is_noop(&self) -> bool {
        self.functions_wrapped == 0
            && self.dispatch_attached == 0
            && self.insertion_points_installed == 0
    }
}

/// 安装引擎
///
/// # 示例
///
/// ```rust
/// use std::sync::Arc;
/// use rolegate::patch::PatchEngine;
/// use rolegate::rbac::{PolicyRegistry, Principal};
/// use rolegate::view::{FunctionView, Request, Response, RouteTable};
///
/// let registry = Arc::new(PolicyRegistry::builder().default_roles().build().unwrap());
/// let engine = PatchEngine::new(registry);
///
/// let mut routes = RouteTable::new().route(
///     "reports/",
///     FunctionView::new("app.views", "reports", |_| Ok(Response::ok("reports")))
///         .allowed(["admin"]),
/// );
///
/// let report = engine.patch(&mut routes).unwrap();
/// assert_eq!(report.functions_wrapped, 1);
///
/// let anonymous = Request::get("/reports/");
/// assert_eq!(routes.handle(&anonymous).status, 403);
///
/// let admin = Request::get("/reports/").with_principal(Principal::new("root").superuser());
/// assert_eq!(routes.handle(&admin).body, "reports");
///
/// // 再次安装不做任何事
/// assert!(engine.patch(&mut routes).unwrap().is_noop());
/// ```
pub struct PatchEngine {
    registry: Arc<PolicyRegistry>,
    table: Arc<GuardTable>,
    interception: Arc<Interception>,
    audit: Arc<dyn AuditLogger>,
    lock: Mutex<()>,
}

impl PatchEngine {
    /// 使用默认主体来源（请求上附加的主体）与 `tracing` 审计创建引擎
    pub fn new(registry: Arc<PolicyRegistry>) -> Self {
        Self::builder(registry).build()
    }

    /// 创建引擎构建器
    pub fn builder(registry: Arc<PolicyRegistry>) -> PatchEngineBuilder {
        PatchEngineBuilder::new(registry)
    }

    /// 使用全局注册表创建引擎
    pub fn from_global() -> Result<Self> {
        let registry = PolicyRegistry::global().ok_or_else(|| ConfigError::InvalidValue {
            key: "registry".to_string(),
            message: "no global policy registry installed".to_string(),
        })?;
        Ok(Self::new(registry))
    }

    /// 策略注册表
    pub fn registry(&self) -> &Arc<PolicyRegistry> {
        &self.registry
    }

    /// 守卫表
    pub fn table(&self) -> &Arc<GuardTable> {
        &self.table
    }

    /// 已记录的视图描述
    pub fn descriptors(&self) -> Vec<HandlerDescriptor> {
        self.table.descriptors()
    }

    /// 已安装的插入点
    pub fn insertion_points(&self) -> Vec<InsertionPoint> {
        self.table.insertion_points()
    }

    fn is_own(&self, interception: &Arc<Interception>) -> bool {
        Arc::ptr_eq(interception, &self.interception)
    }

    /// 对路由表执行一次安装
    pub fn patch(&self, routes: &mut RouteTable) -> Result<PatchReport> {
        let _serialized = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        self.validate(routes)?;

        let mut report = PatchReport::default();
        for (pattern, callable) in routes.routes_mut() {
            match classify(callable) {
                Classification::NotAView => {
                    tracing::debug!(
                        pattern = %pattern,
                        callable = %callable.meta().path(),
                        "route is not a view, skipping"
                    );
                    report.skipped.push(pattern);
                }
                Classification::FunctionView => self.patch_function(callable, &mut report),
                Classification::MethodView { .. } => self.patch_dispatch(callable, &mut report),
            }
        }
        self.unmatched_selectors(routes, &mut report);

        tracing::info!(
            functions = report.functions_wrapped,
            dispatch = report.dispatch_attached,
            installed = report.insertion_points_installed,
            reused = report.insertion_points_reused,
            already_patched = report.already_patched,
            skipped = report.skipped.len(),
            "permission guards installed"
        );
        Ok(report)
    }

    // ========================================================================
    // 校验
    // ========================================================================

    fn validate(&self, routes: &RouteTable) -> Result<()> {
        let strict = self.registry.config().strict;

        for (_, callable) in routes.routes() {
            match callable {
                Callable::Function(view) => {
                    if let Some(rules) = self.registry.declared_for_function(view) {
                        self.registry.validate_rules(&rules, &view.meta().path())?;
                    }
                }
                Callable::Guarded(view) => {
                    if strict && !self.is_own(view.interception()) {
                        return Err(Error::double_patch(view.meta().path()));
                    }
                }
                Callable::Dispatch(view) => match view.interception() {
                    Some(existing) if self.is_own(existing) => {}
                    Some(_) if strict => return Err(Error::double_patch(view.meta().path())),
                    Some(_) => {}
                    None => self.validate_dispatch(view)?,
                },
                Callable::Method(_) => {}
            }
        }
        Ok(())
    }

    fn validate_dispatch(&self, view: &DispatchView) -> Result<()> {
        let class = view.class();
        let config = self.registry.config();
        let points = dispatch_points(view, &self.registry);
        for point in &points {
            if let Some(rules) = self.registry.declared_for_method(class, &point.method) {
                self.registry
                    .validate_rules(&rules, &format!("{}.{}", class.path(), point.method))?;
            }
        }

        let missing = self.missing_insertion_points(class, &points);
        if !missing.is_empty() && config.missing_insertion_point == ConfigSeverity::Error {
            return Err(ConfigError::MissingInsertionPoint {
                class: class.path(),
                methods: missing,
            }
            .into());
        }
        Ok(())
    }

    /// 声明了权限、却不是视图方法或在 MRO 中找不到的方法
    fn missing_insertion_points(
        &self,
        class: &ViewClass,
        points: &BTreeSet<InsertionPoint>,
    ) -> Vec<String> {
        let mut declared = self.registry.declared_methods(class);
        for ancestor in class.mro() {
            declared.extend(
                ancestor
                    .own_methods()
                    .filter(|m| m.declared_permissions().is_some())
                    .map(|m| m.name().to_string()),
            );
        }

        declared
            .into_iter()
            .filter(|method| !points.iter().any(|p| p.method == *method))
            .collect()
    }

    // ========================================================================
    // 安装
    // ========================================================================

    fn patch_function(&self, callable: &mut Callable, report: &mut PatchReport) {
        let view = match callable {
            Callable::Function(view) => view.clone(),
            Callable::Guarded(view) => {
                if self.is_own(view.interception()) {
                    report.already_patched += 1;
                } else {
                    self.foreign_guard(&view.meta().path(), report);
                }
                return;
            }
            Callable::Dispatch(_) | Callable::Method(_) => return,
        };

        self.record_function(&view);
        *callable = Callable::Guarded(GuardedView::new(view, Arc::clone(&self.interception)));
        report.functions_wrapped += 1;
    }

    fn record_function(&self, view: &FunctionView) {
        let path = view.meta().path();
        let declared = self.registry.declared_for_function(view).map(Arc::new);
        let descriptor = HandlerDescriptor {
            kind: HandlerKind::Function,
            owning_class: None,
            method_name: None,
            callable: view.meta().clone(),
            callable_id: Some(view.id()),
            insertion_point: None,
            is_patched: true,
            declared_permissions: declared,
        };

        self.table
            .record(HandlerKey::Function(view.id()), descriptor);
        if self.table.mark_wrapped(view.id()) {
            tracing::debug!(handler = %path, "function view wrapped");
            self.audit.log(SecurityEvent::handler_patched(path));
        }
    }

    fn patch_dispatch(&self, callable: &mut Callable, report: &mut PatchReport) {
        let Callable::Dispatch(view) = callable else {
            return;
        };

        match view.interception() {
            Some(existing) if self.is_own(existing) => {
                report.already_patched += 1;
                return;
            }
            Some(_) => {
                let path = view.meta().path();
                self.foreign_guard(&path, report);
                return;
            }
            None => {}
        }

        self.install_class(view, report);
        view.attach(Arc::clone(&self.interception));
        report.dispatch_attached += 1;
    }

    fn install_class(&self, view: &DispatchView, report: &mut PatchReport) {
        let class = Arc::clone(view.class());
        let points = dispatch_points(view, &self.registry);

        for point in &points {
            let handler = format!("{}.{}", point.class.name, point.method);
            if self.table.install_insertion_point(point) {
                report.insertion_points_installed += 1;
                tracing::debug!(handler = %handler, "insertion point installed");
                self.audit
                    .log(SecurityEvent::insertion_point_installed(handler));
            } else {
                report.insertion_points_reused += 1;
            }

            let declared = self
                .registry
                .declared_for_method(&class, &point.method)
                .map(Arc::new);
            let descriptor = HandlerDescriptor {
                kind: HandlerKind::Method,
                owning_class: Some(class.class_ref()),
                method_name: Some(point.method.clone()),
                callable: view.meta().clone(),
                callable_id: None,
                insertion_point: Some(point.clone()),
                is_patched: true,
                declared_permissions: declared,
            };
            self.table
                .record(HandlerKey::method(class.id(), &point.method), descriptor);
        }

        let missing = self.missing_insertion_points(&class, &points);
        if !missing.is_empty() {
            let message = format!(
                "{} declares permissions for methods without an insertion point: {}",
                class.path(),
                missing.join(", ")
            );
            tracing::warn!(class = %class.path(), methods = ?missing, "missing insertion point");
            self.audit.log(SecurityEvent::config_warning(message.as_str()));
            report.warnings.push(message);
        }
    }

    /// 注册表中没有选中任何路由视图的选择器
    fn unmatched_selectors(&self, routes: &RouteTable, report: &mut PatchReport) {
        let routed = routes.routes();
        for (selector, _) in self.registry.permissions() {
            let matched = routed.iter().any(|(_, callable)| match *callable {
                Callable::Function(view) => selector.matches_function(view.meta()),
                Callable::Guarded(view) => selector.matches_function(view.meta()),
                Callable::Dispatch(view) => selector.selected_method(view.class()).is_some(),
                Callable::Method(_) => false,
            });
            if matched {
                continue;
            }

            let message = format!("permission selector {} matches no routed view", selector);
            tracing::warn!(selector = %selector, "permission selector matches no routed view");
            self.audit.log(SecurityEvent::config_warning(message.as_str()));
            report.warnings.push(message);
        }
    }

    fn foreign_guard(&self, path: &str, report: &mut PatchReport) {
        tracing::warn!(handler = path, "handler already carries another guard, keeping it");
        self.audit.log(SecurityEvent::double_patch_detected(path));
        report.foreign_guards += 1;
        report
            .warnings
            .push(format!("{} already carries another permission guard", path));
    }
}

/// 分发入口的全部插入点：类的视图方法加上动作映射指向的方法
fn dispatch_points(view: &DispatchView, registry: &PolicyRegistry) -> BTreeSet<InsertionPoint> {
    let class = view.class();
    let mut points = resolve_insertion_points(class, registry.config());
    for action in view.actions().values() {
        if let Some(owner) = owner_of(class, action) {
            points.insert(InsertionPoint {
                class: owner.class_ref(),
                method: action.clone(),
            });
        }
    }
    points
}

impl fmt::Debug for PatchEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatchEngine")
            .field("registry", &self.registry)
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

/// 安装引擎构建器
pub struct PatchEngineBuilder {
    registry: Arc<PolicyRegistry>,
    principals: Arc<dyn PrincipalProvider>,
    audit: Arc<dyn AuditLogger>,
}

impl PatchEngineBuilder {
    /// 创建新的构建器
    pub fn new(registry: Arc<PolicyRegistry>) -> Self {
        Self {
            registry,
            principals: Arc::new(RequestPrincipal),
            audit: Arc::new(TracingAuditLogger),
        }
    }

    /// 设置主体来源
    pub fn principal_provider(mut self, provider: impl PrincipalProvider + 'static) -> Self {
        self.principals = Arc::new(provider);
        self
    }

    /// 设置审计日志记录器
    pub fn audit_logger(mut self, logger: Arc<dyn AuditLogger>) -> Self {
        self.audit = logger;
        self
    }

    /// 构建引擎
    pub fn build(self) -> PatchEngine {
        let table = Arc::new(GuardTable::new());
        let guard = PermissionGuard::new(
            Arc::clone(&self.registry),
            self.principals,
            Arc::clone(&self.audit),
        );
        PatchEngine {
            interception: Arc::new(Interception::new(guard, Arc::clone(&table))),
            registry: self.registry,
            table,
            audit: self.audit,
            lock: Mutex::new(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{EventType, InMemoryAuditLogger};
    use crate::config::GuardConfig;
    use crate::rbac::{RoleRules, RoleDefinition};
    use crate::view::{Request, Response};

    fn registry(config: GuardConfig) -> Arc<PolicyRegistry> {
        Arc::new(
            PolicyRegistry::builder()
                .default_roles()
                .config(config)
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_unknown_role_leaves_table_untouched() {
        let engine = PatchEngine::new(registry(GuardConfig::default()));
        let mut routes = RouteTable::new()
            .route("a/", FunctionView::new("app.views", "a", |_| Ok(Response::ok("a"))))
            .route(
                "b/",
                FunctionView::new("app.views", "b", |_| Ok(Response::ok("b"))).allowed(["owner"]),
            );

        let result = engine.patch(&mut routes);
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::UnknownRole { ref role, .. })) if role == "owner"
        ));
        assert!(routes.routes().iter().all(|(_, c)| !c.is_patched()));
    }

    #[test]
    fn test_bound_method_is_skipped() {
        let engine = PatchEngine::new(registry(GuardConfig::default()));
        let class = ViewClass::builder("app.views", "DjangoView")
            .method("not_a_view", |_| Ok(Response::ok("helper")))
            .build()
            .unwrap();
        let mut routes =
            RouteTable::new().route("helper/", class.bound_method("not_a_view").unwrap());

        let report = engine.patch(&mut routes).unwrap();
        assert_eq!(report.skipped, vec!["helper".to_string()]);
        assert!(report.is_noop());
        assert!(engine.descriptors().is_empty());
    }

    #[test]
    fn test_audit_events_recorded() {
        let audit = Arc::new(InMemoryAuditLogger::new());
        let engine = PatchEngine::builder(registry(GuardConfig::default()))
            .audit_logger(audit.clone())
            .build();

        let class = ViewClass::builder("app.views", "ItemView")
            .method("get", |_| Ok(Response::ok("item")))
            .view_permissions("get", RoleRules::allowed(["user"]))
            .build()
            .unwrap();
        let mut routes = RouteTable::new().route("items/", class.as_view());
        engine.patch(&mut routes).unwrap();

        assert_eq!(
            audit
                .get_events_by_type(&EventType::InsertionPointInstalled)
                .len(),
            1
        );

        assert_eq!(routes.handle(&Request::get("/items/")).status, 403);
        assert_eq!(audit.get_events_by_type(&EventType::PermissionDenied).len(), 1);
    }

    #[test]
    fn test_missing_insertion_point_warns() {
        let engine = PatchEngine::new(registry(GuardConfig::default()));
        let class = ViewClass::builder("app.views", "OddView")
            .method("get", |_| Ok(Response::ok("")))
            .view_permissions("publish", RoleRules::allowed(["admin"]))
            .build()
            .unwrap();
        let mut routes = RouteTable::new().route("odd/", class.as_view());

        let report = engine.patch(&mut routes).unwrap();
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("publish"));
    }

    #[test]
    fn test_missing_insertion_point_error() {
        let config = GuardConfig::default().missing_insertion_point(ConfigSeverity::Error);
        let engine = PatchEngine::new(registry(config));
        let class = ViewClass::builder("app.views", "OddView")
            .method("get", |_| Ok(Response::ok("")))
            .view_permissions("publish", RoleRules::allowed(["admin"]))
            .build()
            .unwrap();
        let mut routes = RouteTable::new().route("odd/", class.as_view());

        assert!(matches!(
            engine.patch(&mut routes),
            Err(Error::Config(ConfigError::MissingInsertionPoint { .. }))
        ));
    }

    #[test]
    fn test_unmatched_selector_warns() {
        let audit = Arc::new(InMemoryAuditLogger::new());
        let registry = Arc::new(
            PolicyRegistry::builder()
                .default_roles()
                .permission("app.views.a", RoleRules::allowed(["user"]))
                .permission("app.views.gone", RoleRules::allowed(["admin"]))
                .build()
                .unwrap(),
        );
        let engine = PatchEngine::builder(registry).audit_logger(audit.clone()).build();
        let mut routes = RouteTable::new()
            .route("a/", FunctionView::new("app.views", "a", |_| Ok(Response::ok("a"))));

        let report = engine.patch(&mut routes).unwrap();
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("app.views.gone"));
        assert_eq!(audit.get_events_by_type(&EventType::ConfigWarning).len(), 1);
    }

    #[test]
    fn test_custom_role_resolved_at_request_time() {
        let registry = Arc::new(
            PolicyRegistry::builder()
                .default_roles()
                .role(RoleDefinition::group("editor", "editors"))
                .build()
                .unwrap(),
        );
        let engine = PatchEngine::new(registry);
        let mut routes = RouteTable::new().route(
            "posts/",
            FunctionView::new("app.views", "posts", |_| Ok(Response::ok("posts")))
                .allowed(["editor"]),
        );
        engine.patch(&mut routes).unwrap();

        let editor = crate::rbac::Principal::new("e").with_group("editors");
        let request = Request::get("/posts/").with_principal(editor);
        assert_eq!(routes.handle(&request).status, 200);
    }
}
