//! 可调用视图
//!
//! 路由表中的每个条目都是一个 [`Callable`]：
//!
//! - [`FunctionView`]: 普通函数视图
//! - [`GuardedView`]: 已被守卫包装的函数视图，对外暴露与原视图相同的元数据
//! - [`DispatchView`]: 类视图的分发入口（`as_view()` 的结果）
//! - [`BoundMethod`]: 直接路由到类上的辅助方法，不是视图

use crate::error::ViewResult;
use crate::patch::GuardedView;
use crate::rbac::RoleRules;
use crate::view::class::{BoundMethod, DispatchView};
use crate::view::context::{CheckedHandlers, ViewContext, ViewInfo};
use crate::view::request::{Request, Response, ViewArgs};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CALLABLE_ID: AtomicU64 = AtomicU64::new(1);

/// 视图函数体
pub type ViewFn = Arc<dyn Fn(&ViewContext<'_>) -> ViewResult<Response> + Send + Sync>;

/// 可调用对象的稳定标识
///
/// 构造时分配，进程内唯一；克隆与包装都不会改变它
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallableId(u64);

impl CallableId {
    pub(crate) fn next() -> Self {
        CallableId(NEXT_CALLABLE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// 数值形式
    pub fn get(self) -> u64 {
        self.0
    }
}

/// 可调用对象的元数据
///
/// 框架中依赖内省的机制（URL 反解、接口文档生成）读取这些字段，包装后必须保持不变
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallableMeta {
    /// 名称，例如 `list_users`
    pub name: String,
    /// 限定名，例如 `UserView.get`
    pub qualname: String,
    /// 所在模块，例如 `app.views`
    pub module: String,
    /// 调用签名
    pub signature: String,
}

impl CallableMeta {
    /// 根据模块与限定名创建元数据，名称取限定名最后一段
    pub fn new(module: impl Into<String>, qualname: impl Into<String>) -> Self {
        let qualname = qualname.into();
        let name = qualname
            .rsplit('.')
            .next()
            .unwrap_or(qualname.as_str())
            .to_string();
        Self {
            name,
            qualname,
            module: module.into(),
            signature: "(request)".to_string(),
        }
    }

    /// 设置签名
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = signature.into();
        self
    }

    /// 完整路径 `module.qualname`
    pub fn path(&self) -> String {
        if self.module.is_empty() {
            self.qualname.clone()
        } else {
            format!("{}.{}", self.module, self.qualname)
        }
    }
}

// ============================================================================
// FunctionView
// ============================================================================

/// 函数视图
///
/// # 示例
///
/// ```rust
/// use rolegate::view::{FunctionView, Request, Response, ViewArgs};
///
/// let view = FunctionView::new("app.views", "list_users", |_| Ok(Response::ok("users")))
///     .allowed(["admin"]);
///
/// assert_eq!(view.meta().name, "list_users");
/// assert_eq!(view.meta().path(), "app.views.list_users");
/// assert!(view.declared_permissions().is_some());
/// ```
#[derive(Clone)]
pub struct FunctionView {
    id: CallableId,
    meta: CallableMeta,
    body: ViewFn,
    declared: Option<RoleRules>,
}

impl FunctionView {
    /// 创建函数视图
    pub fn new<F>(module: impl Into<String>, qualname: impl Into<String>, body: F) -> Self
    where
        F: Fn(&ViewContext<'_>) -> ViewResult<Response> + Send + Sync + 'static,
    {
        Self {
            id: CallableId::next(),
            meta: CallableMeta::new(module, qualname),
            body: Arc::new(body),
            declared: None,
        }
    }

    /// 设置签名
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.meta = self.meta.with_signature(signature);
        self
    }

    /// 声明允许的角色
    pub fn allowed<I, S>(self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions(RoleRules::allowed(roles))
    }

    /// 声明拒绝的角色
    pub fn disallowed<I, S>(self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions(RoleRules::disallowed(roles))
    }

    /// 声明权限规则，与已有声明合并
    pub fn permissions(mut self, rules: RoleRules) -> Self {
        self.declared.get_or_insert_with(RoleRules::new).merge(&rules);
        self
    }

    /// 标识
    pub fn id(&self) -> CallableId {
        self.id
    }

    /// 元数据
    pub fn meta(&self) -> &CallableMeta {
        &self.meta
    }

    /// 装饰器声明的权限
    pub fn declared_permissions(&self) -> Option<&RoleRules> {
        self.declared.as_ref()
    }

    pub(crate) fn body(&self) -> &ViewFn {
        &self.body
    }

    pub(crate) fn view_info(&self) -> ViewInfo {
        ViewInfo::function(self.meta.path())
    }

    /// 直接执行函数体，不经过任何守卫
    pub fn call_body(&self, ctx: &ViewContext<'_>) -> ViewResult<Response> {
        (self.body)(ctx)
    }

    pub(crate) fn invoke(
        &self,
        request: &Request,
        args: &ViewArgs,
        checked: &CheckedHandlers,
    ) -> ViewResult<Response> {
        let ctx = ViewContext::new(request, args, self.view_info(), checked);
        self.call_body(&ctx)
    }
}

impl fmt::Debug for FunctionView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionView")
            .field("id", &self.id)
            .field("meta", &self.meta)
            .field("declared", &self.declared)
            .finish()
    }
}

// ============================================================================
// Callable
// ============================================================================

/// 路由表中的可调用对象
#[derive(Debug, Clone)]
pub enum Callable {
    /// 函数视图
    Function(FunctionView),
    /// 已包装的函数视图
    Guarded(GuardedView),
    /// 类视图分发入口
    Dispatch(DispatchView),
    /// 类上的普通方法
    Method(BoundMethod),
}

impl Callable {
    /// 对外暴露的元数据
    pub fn meta(&self) -> &CallableMeta {
        match self {
            Callable::Function(view) => view.meta(),
            Callable::Guarded(view) => view.meta(),
            Callable::Dispatch(view) => view.meta(),
            Callable::Method(method) => method.meta(),
        }
    }

    /// 标识；包装后的视图返回原视图的标识
    pub fn id(&self) -> CallableId {
        match self {
            Callable::Function(view) => view.id(),
            Callable::Guarded(view) => view.wrapped_id(),
            Callable::Dispatch(view) => view.id(),
            Callable::Method(method) => method.id(),
        }
    }

    /// 是否已安装守卫
    pub fn is_patched(&self) -> bool {
        match self {
            Callable::Guarded(_) => true,
            Callable::Dispatch(view) => view.is_patched(),
            Callable::Function(_) | Callable::Method(_) => false,
        }
    }

    /// 以新请求调用
    pub fn call(&self, request: &Request, args: &ViewArgs) -> ViewResult<Response> {
        let checked = CheckedHandlers::new();
        self.invoke(request, args, &checked)
    }

    pub(crate) fn invoke(
        &self,
        request: &Request,
        args: &ViewArgs,
        checked: &CheckedHandlers,
    ) -> ViewResult<Response> {
        match self {
            Callable::Function(view) => view.invoke(request, args, checked),
            Callable::Guarded(view) => view.invoke(request, args, checked),
            Callable::Dispatch(view) => view.invoke(request, args, checked),
            Callable::Method(method) => method.invoke(request, args, checked),
        }
    }
}

impl From<FunctionView> for Callable {
    fn from(view: FunctionView) -> Self {
        Callable::Function(view)
    }
}

impl From<DispatchView> for Callable {
    fn from(view: DispatchView) -> Self {
        Callable::Dispatch(view)
    }
}

impl From<BoundMethod> for Callable {
    fn from(method: BoundMethod) -> Self {
        Callable::Method(method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_from_qualname() {
        let meta = CallableMeta::new("app.views", "UserView.get");
        assert_eq!(meta.name, "get");
        assert_eq!(meta.qualname, "UserView.get");
        assert_eq!(meta.path(), "app.views.UserView.get");

        let bare = CallableMeta::new("", "index").with_signature("(request, pk)");
        assert_eq!(bare.path(), "index");
        assert_eq!(bare.signature, "(request, pk)");
    }

    #[test]
    fn test_callable_ids_are_unique() {
        let a = FunctionView::new("m", "a", |_| Ok(Response::ok("a")));
        let b = FunctionView::new("m", "b", |_| Ok(Response::ok("b")));
        assert_ne!(a.id(), b.id());
        // 克隆保持标识
        assert_eq!(a.clone().id(), a.id());
    }

    #[test]
    fn test_function_view_call() {
        let view = FunctionView::new("app.views", "echo", |ctx| {
            Ok(Response::ok(format!(
                "{} {}",
                ctx.request().method(),
                ctx.arg("name").unwrap_or("?")
            )))
        });
        let callable = Callable::from(view);

        let mut args = ViewArgs::new();
        args.insert("name".into(), "bob".into());
        let response = callable.call(&Request::get("/echo/bob"), &args).unwrap();
        assert_eq!(response.body, "GET bob");
        assert!(!callable.is_patched());
    }

    #[test]
    fn test_decorators_merge() {
        let view = FunctionView::new("m", "v", |_| Ok(Response::ok("")))
            .allowed(["admin"])
            .disallowed(["anon"]);
        let declared = view.declared_permissions().unwrap();
        assert_eq!(declared.roles().collect::<Vec<_>>(), vec!["admin", "anon"]);
    }
}
