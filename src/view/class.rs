//! 类视图
//!
//! [`ViewClass`] 是显式建模的类层次：每个类持有自己定义的方法、类属性
//! `view_permissions` 与 `http_method_names`，以及按 C3 线性化算出的方法解析顺序（MRO）。
//! 路由表看到的是类的分发入口 [`DispatchView`]，它在运行时根据请求方法选出具体的视图方法。

use crate::error::{ConfigError, Result, ViewError, ViewResult};
use crate::patch::{HandlerKey, Interception};
use crate::rbac::RoleRules;
use crate::view::callable::{CallableId, CallableMeta, FunctionView, ViewFn};
use crate::view::context::{CheckedHandlers, ViewContext, ViewInfo};
use crate::view::request::{Request, Response, ViewArgs};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// 分发入口的名称
pub const DISPATCH: &str = "dispatch";

/// 默认允许的 HTTP 方法（小写）
pub const DEFAULT_HTTP_METHOD_NAMES: &[&str] = &[
    "get", "post", "put", "patch", "delete", "head", "options", "trace",
];

static NEXT_CLASS_ID: AtomicU64 = AtomicU64::new(1);

/// 类的稳定标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassId(u64);

impl ClassId {
    fn next() -> Self {
        ClassId(NEXT_CLASS_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// 数值形式
    pub fn get(self) -> u64 {
        self.0
    }
}

/// 类的非持有引用：标识加名称
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassRef {
    /// 类标识
    pub id: ClassId,
    /// 类名
    pub name: String,
}

// ============================================================================
// ViewMethod
// ============================================================================

/// 类上定义的方法
#[derive(Clone)]
pub struct ViewMethod {
    name: String,
    body: ViewFn,
    declared: Option<RoleRules>,
    is_action: bool,
}

impl ViewMethod {
    /// 创建方法
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&ViewContext<'_>) -> ViewResult<Response> + Send + Sync + 'static,
    {
        Self::from_body(name, Arc::new(body))
    }

    /// 创建额外动作方法（名称不在分发约定内，但同样是视图）
    pub fn action<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&ViewContext<'_>) -> ViewResult<Response> + Send + Sync + 'static,
    {
        Self {
            is_action: true,
            ..Self::new(name, body)
        }
    }

    pub(crate) fn from_body(name: impl Into<String>, body: ViewFn) -> Self {
        Self {
            name: name.into(),
            body,
            declared: None,
            is_action: false,
        }
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

    /// 方法名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 装饰器声明的权限
    pub fn declared_permissions(&self) -> Option<&RoleRules> {
        self.declared.as_ref()
    }

    /// 是否为额外动作
    pub fn is_action(&self) -> bool {
        self.is_action
    }

    /// 执行方法体
    pub fn call(&self, ctx: &ViewContext<'_>) -> ViewResult<Response> {
        (self.body)(ctx)
    }
}

impl fmt::Debug for ViewMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewMethod")
            .field("name", &self.name)
            .field("declared", &self.declared)
            .field("is_action", &self.is_action)
            .finish()
    }
}

// ============================================================================
// ViewClass
// ============================================================================

/// 类视图
///
/// # 示例
///
/// ```rust
/// use rolegate::view::{Response, ViewClass};
///
/// let base = ViewClass::builder("app.views", "BaseView")
///     .method("get", |_| Ok(Response::ok("base")))
///     .build()
///     .unwrap();
///
/// let child = ViewClass::builder("app.views", "ChildView")
///     .base(&base)
///     .build()
///     .unwrap();
///
/// // get 继承自 BaseView
/// let (owner, _) = child.resolve_method("get").unwrap();
/// assert_eq!(owner.name(), "BaseView");
/// ```
pub struct ViewClass {
    id: ClassId,
    name: String,
    module: String,
    bases: Vec<Arc<ViewClass>>,
    ancestors: Vec<Arc<ViewClass>>,
    methods: BTreeMap<String, ViewMethod>,
    view_permissions: Option<BTreeMap<String, RoleRules>>,
    http_method_names: Option<Vec<String>>,
}

impl ViewClass {
    /// 创建类构建器
    pub fn builder(module: impl Into<String>, name: impl Into<String>) -> ViewClassBuilder {
        ViewClassBuilder::new(module, name)
    }

    /// 标识
    pub fn id(&self) -> ClassId {
        self.id
    }

    /// 类名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 所在模块
    pub fn module(&self) -> &str {
        &self.module
    }

    /// 完整路径 `module.Name`
    pub fn path(&self) -> String {
        if self.module.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.module, self.name)
        }
    }

    /// 非持有引用
    pub fn class_ref(&self) -> ClassRef {
        ClassRef {
            id: self.id,
            name: self.name.clone(),
        }
    }

    /// 直接基类
    pub fn bases(&self) -> &[Arc<ViewClass>] {
        &self.bases
    }

    /// 方法解析顺序，从自身到最远的祖先
    pub fn mro(&self) -> Vec<&ViewClass> {
        std::iter::once(self)
            .chain(self.ancestors.iter().map(|c| c.as_ref()))
            .collect()
    }

    /// 是否为 `other` 的子类（包括自身）
    pub fn is_subclass_of(&self, other: &ViewClass) -> bool {
        self.mro().iter().any(|c| c.id == other.id)
    }

    /// 自身定义的方法（不含继承）
    pub fn own_methods(&self) -> impl Iterator<Item = &ViewMethod> {
        self.methods.values()
    }

    /// 自身是否定义了方法
    pub fn defines(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// 按 MRO 查找方法，返回定义它的类与方法
    pub fn resolve_method(&self, name: &str) -> Option<(&ViewClass, &ViewMethod)> {
        self.mro()
            .into_iter()
            .find_map(|c| c.methods.get(name).map(|m| (c, m)))
    }

    /// 类属性 `view_permissions`，按 MRO 取最近的定义
    pub fn view_permissions(&self) -> Option<&BTreeMap<String, RoleRules>> {
        self.mro()
            .into_iter()
            .find_map(|c| c.view_permissions.as_ref())
    }

    /// 类属性 `http_method_names`，按 MRO 取最近的定义
    pub fn http_method_names(&self) -> Vec<String> {
        self.mro()
            .into_iter()
            .find_map(|c| c.http_method_names.clone())
            .unwrap_or_else(|| {
                DEFAULT_HTTP_METHOD_NAMES
                    .iter()
                    .map(|m| m.to_string())
                    .collect()
            })
    }

    /// 生成分发入口
    pub fn as_view(self: &Arc<Self>) -> DispatchView {
        DispatchView::new(Arc::clone(self), BTreeMap::new())
    }

    /// 生成带动作映射的分发入口，例如 `[("get", "list"), ("post", "create")]`
    pub fn as_view_with_actions<I, V, A>(self: &Arc<Self>, actions: I) -> DispatchView
    where
        I: IntoIterator<Item = (V, A)>,
        V: Into<String>,
        A: Into<String>,
    {
        let actions = actions
            .into_iter()
            .map(|(verb, action)| (verb.into().to_ascii_lowercase(), action.into()))
            .collect();
        DispatchView::new(Arc::clone(self), actions)
    }

    /// 绑定一个方法（不是分发入口）
    pub fn bound_method(self: &Arc<Self>, name: &str) -> Option<BoundMethod> {
        let (owner, _) = self.resolve_method(name)?;
        Some(BoundMethod {
            id: CallableId::next(),
            meta: CallableMeta::new(owner.module(), format!("{}.{}", owner.name(), name)),
            class: Arc::clone(self),
            name: name.to_string(),
        })
    }
}

impl fmt::Debug for ViewClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewClass")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("module", &self.module)
            .field(
                "bases",
                &self.bases.iter().map(|b| b.name()).collect::<Vec<_>>(),
            )
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// C3 线性化，返回不含自身的祖先序列
fn linearize(name: &str, bases: &[Arc<ViewClass>]) -> Result<Vec<Arc<ViewClass>>> {
    let mut sequences: Vec<Vec<Arc<ViewClass>>> = bases
        .iter()
        .map(|base| {
            std::iter::once(Arc::clone(base))
                .chain(base.ancestors.iter().cloned())
                .collect()
        })
        .collect();
    sequences.push(bases.to_vec());

    let mut result = Vec::new();
    loop {
        sequences.retain(|seq| !seq.is_empty());
        if sequences.is_empty() {
            return Ok(result);
        }

        // 候选头部不能出现在任何序列的尾部
        let next = sequences
            .iter()
            .map(|seq| &seq[0])
            .find(|head| {
                !sequences
                    .iter()
                    .any(|seq| seq[1..].iter().any(|c| c.id == head.id))
            })
            .cloned()
            .ok_or_else(|| ConfigError::InconsistentHierarchy(name.to_string()))?;

        for seq in sequences.iter_mut() {
            if seq[0].id == next.id {
                seq.remove(0);
            }
        }
        result.push(next);
    }
}

// ============================================================================
// ViewClassBuilder
// ============================================================================

/// 类视图构建器
pub struct ViewClassBuilder {
    name: String,
    module: String,
    bases: Vec<Arc<ViewClass>>,
    methods: BTreeMap<String, ViewMethod>,
    view_permissions: Option<BTreeMap<String, RoleRules>>,
    http_method_names: Option<Vec<String>>,
}

impl ViewClassBuilder {
    /// 创建新的构建器
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
            bases: Vec::new(),
            methods: BTreeMap::new(),
            view_permissions: None,
            http_method_names: None,
        }
    }

    /// 添加基类（按声明顺序）
    pub fn base(mut self, base: &Arc<ViewClass>) -> Self {
        self.bases.push(Arc::clone(base));
        self
    }

    /// 定义方法
    pub fn method<F>(self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&ViewContext<'_>) -> ViewResult<Response> + Send + Sync + 'static,
    {
        self.view_method(ViewMethod::new(name, body))
    }

    /// 定义额外动作
    pub fn action<F>(self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&ViewContext<'_>) -> ViewResult<Response> + Send + Sync + 'static,
    {
        self.view_method(ViewMethod::action(name, body))
    }

    /// 定义方法（可带装饰器声明）
    pub fn view_method(mut self, method: ViewMethod) -> Self {
        self.methods.insert(method.name.clone(), method);
        self
    }

    /// 在类属性 `view_permissions` 中声明某个方法的权限
    pub fn view_permissions(mut self, method: impl Into<String>, rules: RoleRules) -> Self {
        self.view_permissions
            .get_or_insert_with(BTreeMap::new)
            .insert(method.into(), rules);
        self
    }

    /// 设置类属性 `http_method_names`
    pub fn http_method_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.http_method_names = Some(
            names
                .into_iter()
                .map(|n| n.into().to_ascii_lowercase())
                .collect(),
        );
        self
    }

    /// 构建类，计算 MRO
    pub fn build(self) -> Result<Arc<ViewClass>> {
        let ancestors = linearize(&self.name, &self.bases)?;
        Ok(Arc::new(ViewClass {
            id: ClassId::next(),
            name: self.name,
            module: self.module,
            bases: self.bases,
            ancestors,
            methods: self.methods,
            view_permissions: self.view_permissions,
            http_method_names: self.http_method_names,
        }))
    }
}

// ============================================================================
// DispatchView
// ============================================================================

/// 类视图的分发入口
///
/// 路由表只看到这一个可调用对象；请求到来时按请求方法（或动作映射）选出视图方法。
/// 分发入口本身不做权限检查，检查安装在选出的方法所在的插入点上。
#[derive(Clone)]
pub struct DispatchView {
    id: CallableId,
    meta: CallableMeta,
    class: Arc<ViewClass>,
    actions: BTreeMap<String, String>,
    interception: Option<Arc<Interception>>,
}

impl DispatchView {
    fn new(class: Arc<ViewClass>, actions: BTreeMap<String, String>) -> Self {
        Self {
            id: CallableId::next(),
            meta: CallableMeta::new(class.module(), class.name())
                .with_signature("(request, *args, **kwargs)"),
            class,
            actions,
            interception: None,
        }
    }

    /// 替换对外暴露的元数据
    pub fn with_meta(mut self, meta: CallableMeta) -> Self {
        self.meta = meta;
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

    /// 视图类
    pub fn class(&self) -> &Arc<ViewClass> {
        &self.class
    }

    /// 动作映射（HTTP 方法 → 方法名）
    pub fn actions(&self) -> &BTreeMap<String, String> {
        &self.actions
    }

    /// 是否已挂载守卫
    pub fn is_patched(&self) -> bool {
        self.interception.is_some()
    }

    pub(crate) fn interception(&self) -> Option<&Arc<Interception>> {
        self.interception.as_ref()
    }

    pub(crate) fn attach(&mut self, interception: Arc<Interception>) {
        self.interception = Some(interception);
    }

    /// 允许的 HTTP 方法（大写）
    pub fn allowed_methods(&self) -> Vec<String> {
        if !self.actions.is_empty() {
            return self
                .actions
                .keys()
                .map(|verb| verb.to_ascii_uppercase())
                .collect();
        }

        let names = self.class.http_method_names();
        names
            .iter()
            .filter(|verb| {
                self.class.resolve_method(verb).is_some()
                    || (*verb == "head" && self.class.resolve_method("get").is_some())
            })
            .map(|verb| verb.to_ascii_uppercase())
            .collect()
    }

    /// 根据请求方法选出视图方法，返回（方法名、定义它的类、方法）
    fn select(&self, verb: &str) -> Option<(String, &ViewClass, &ViewMethod)> {
        if !self.actions.is_empty() {
            let action = self.actions.get(verb)?;
            let (owner, method) = self.class.resolve_method(action)?;
            return Some((action.clone(), owner, method));
        }

        if !self.class.http_method_names().iter().any(|m| m == verb) {
            return None;
        }

        if let Some((owner, method)) = self.class.resolve_method(verb) {
            return Some((verb.to_string(), owner, method));
        }

        // 未定义 head 时退回 get
        if verb == "head" {
            let (owner, method) = self.class.resolve_method("get")?;
            return Some(("get".to_string(), owner, method));
        }

        None
    }

    pub(crate) fn invoke(
        &self,
        request: &Request,
        args: &ViewArgs,
        checked: &CheckedHandlers,
    ) -> ViewResult<Response> {
        let verb = request.method().to_ascii_lowercase();
        let Some((name, owner, method)) = self.select(&verb) else {
            return Err(ViewError::MethodNotAllowed {
                method: request.method().to_string(),
                allowed: self.allowed_methods(),
            });
        };

        let info = ViewInfo::method(
            format!("{}.{}", self.class.path(), name),
            self.class.name(),
            name.as_str(),
        );
        let ctx = ViewContext::new(request, args, info, checked);

        match &self.interception {
            Some(interception) if interception.guards(owner.id(), &name) => {
                let key = HandlerKey::method(self.class.id(), &name);
                interception.run(&ctx, &key, || method.call(&ctx))
            }
            _ => method.call(&ctx),
        }
    }
}

impl fmt::Debug for DispatchView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchView")
            .field("id", &self.id)
            .field("meta", &self.meta)
            .field("class", &self.class.name())
            .field("actions", &self.actions)
            .field("patched", &self.is_patched())
            .finish()
    }
}

// ============================================================================
// BoundMethod
// ============================================================================

/// 直接路由到类上的普通方法
///
/// 不经过分发入口，也不会被安装守卫
#[derive(Clone)]
pub struct BoundMethod {
    id: CallableId,
    meta: CallableMeta,
    class: Arc<ViewClass>,
    name: String,
}

impl BoundMethod {
    /// 标识
    pub fn id(&self) -> CallableId {
        self.id
    }

    /// 元数据
    pub fn meta(&self) -> &CallableMeta {
        &self.meta
    }

    /// 所属类
    pub fn class(&self) -> &Arc<ViewClass> {
        &self.class
    }

    /// 方法名
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn invoke(
        &self,
        request: &Request,
        args: &ViewArgs,
        checked: &CheckedHandlers,
    ) -> ViewResult<Response> {
        let (_, method) = self.class.resolve_method(&self.name).ok_or_else(|| {
            ViewError::handler(format!("{} has no method {}", self.class.name(), self.name))
        })?;
        let info = ViewInfo::method(self.meta.path(), self.class.name(), self.name.as_str());
        let ctx = ViewContext::new(request, args, info, checked);
        method.call(&ctx)
    }
}

impl fmt::Debug for BoundMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundMethod")
            .field("meta", &self.meta)
            .field("class", &self.class.name())
            .finish()
    }
}

// ============================================================================
// api_view
// ============================================================================

/// 把函数视图转换为类视图分发入口
///
/// 为每个列出的 HTTP 方法生成共享同一函数体的方法，函数上声明的权限随之转移；
/// 分发入口沿用函数的元数据。未列出方法时默认只允许 `GET`。
pub fn api_view<I, S>(view: FunctionView, methods: I) -> Result<DispatchView>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut methods: Vec<String> = methods
        .into_iter()
        .map(|m| m.into().to_ascii_lowercase())
        .collect();
    if methods.is_empty() {
        methods.push("get".to_string());
    }

    let meta = view.meta().clone();
    let mut builder = ViewClass::builder(meta.module.clone(), meta.qualname.clone())
        .http_method_names(methods.iter().cloned());

    for name in &methods {
        let mut method = ViewMethod::from_body(name.clone(), Arc::clone(view.body()));
        if let Some(rules) = view.declared_permissions() {
            method = method.permissions(rules.clone());
        }
        builder = builder.view_method(method);
    }

    Ok(builder.build()?.as_view().with_meta(meta))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(body: &'static str) -> impl Fn(&ViewContext<'_>) -> ViewResult<Response> + Send + Sync + 'static {
        move |_| Ok(Response::ok(body))
    }

    fn class(name: &str, bases: &[&Arc<ViewClass>]) -> Arc<ViewClass> {
        bases
            .iter()
            .fold(ViewClass::builder("app.views", name), |b, base| b.base(base))
            .build()
            .unwrap()
    }

    #[test]
    fn test_c3_linearization_diamond() {
        let o = class("O", &[]);
        let a = class("A", &[&o]);
        let b = class("B", &[&o]);
        let c = class("C", &[&a, &b]);

        let names: Vec<_> = c.mro().iter().map(|k| k.name().to_string()).collect();
        assert_eq!(names, vec!["C", "A", "B", "O"]);
    }

    #[test]
    fn test_c3_linearization_classic_example() {
        // 经典 C3 示例
        let o = class("O", &[]);
        let f = class("F", &[&o]);
        let e = class("E", &[&o]);
        let d = class("D", &[&o]);
        let c = class("C", &[&d, &f]);
        let b = class("B", &[&d, &e]);
        let a = class("A", &[&b, &c]);

        let names: Vec<_> = a.mro().iter().map(|k| k.name().to_string()).collect();
        assert_eq!(names, vec!["A", "B", "C", "D", "E", "F", "O"]);
    }

    #[test]
    fn test_inconsistent_hierarchy() {
        let o = class("O", &[]);
        let a = class("A", &[&o]);
        let b = class("B", &[&a]);

        // (O, B) 无法线性化：O 必须排在 B 之后
        let result = ViewClass::builder("app.views", "Bad")
            .base(&o)
            .base(&b)
            .build();
        assert!(matches!(
            result,
            Err(crate::error::Error::Config(ConfigError::InconsistentHierarchy(_)))
        ));
    }

    #[test]
    fn test_resolve_method_and_attributes() {
        let base = ViewClass::builder("app.views", "Base")
            .method("get", text("base"))
            .view_permissions("get", RoleRules::allowed(["admin"]))
            .build()
            .unwrap();
        let child = ViewClass::builder("app.views", "Child")
            .base(&base)
            .method("post", text("child"))
            .build()
            .unwrap();

        assert!(child.defines("post"));
        assert!(!child.defines("get"));
        assert_eq!(child.resolve_method("get").unwrap().0.name(), "Base");
        assert!(child.view_permissions().unwrap().contains_key("get"));
        assert!(child.is_subclass_of(&base));
        assert!(!base.is_subclass_of(&child));
    }

    #[test]
    fn test_dispatch_selects_verb_method() {
        let view = ViewClass::builder("app.views", "ItemView")
            .method("get", text("get"))
            .method("post", text("post"))
            .build()
            .unwrap()
            .as_view();
        let args = ViewArgs::new();

        let callable = crate::view::Callable::from(view.clone());
        assert_eq!(callable.call(&Request::get("/"), &args).unwrap().body, "get");
        assert_eq!(callable.call(&Request::post("/"), &args).unwrap().body, "post");
        // head 退回 get
        assert_eq!(
            callable.call(&Request::new("HEAD", "/"), &args).unwrap().body,
            "get"
        );

        let err = callable.call(&Request::delete("/"), &args).unwrap_err();
        assert_eq!(
            err,
            ViewError::MethodNotAllowed {
                method: "DELETE".into(),
                allowed: vec!["GET".into(), "POST".into(), "HEAD".into()],
            }
        );
        assert_eq!(view.meta().name, "ItemView");
    }

    #[test]
    fn test_dispatch_with_actions() {
        let class = ViewClass::builder("app.views", "UserViewSet")
            .method("list", text("list"))
            .method("create", text("create"))
            .build()
            .unwrap();
        let view = class.as_view_with_actions([("get", "list"), ("post", "create")]);
        let callable = crate::view::Callable::from(view);
        let args = ViewArgs::new();

        assert_eq!(callable.call(&Request::get("/"), &args).unwrap().body, "list");
        assert_eq!(callable.call(&Request::post("/"), &args).unwrap().body, "create");
        assert!(callable.call(&Request::put("/"), &args).is_err());
    }

    #[test]
    fn test_http_method_names_restrict_dispatch() {
        let view = ViewClass::builder("app.views", "ReadOnly")
            .method("get", text("get"))
            .method("post", text("post"))
            .http_method_names(["GET"])
            .build()
            .unwrap()
            .as_view();
        let callable = crate::view::Callable::from(view);
        let args = ViewArgs::new();

        assert!(callable.call(&Request::post("/"), &args).is_err());
    }

    #[test]
    fn test_bound_method_calls_helper() {
        let class = ViewClass::builder("app.views", "DjangoView")
            .method("not_a_view", text("helper"))
            .build()
            .unwrap();
        let method = class.bound_method("not_a_view").unwrap();
        assert_eq!(method.meta().qualname, "DjangoView.not_a_view");
        assert!(class.bound_method("missing").is_none());

        let callable = crate::view::Callable::from(method);
        let response = callable.call(&Request::get("/"), &ViewArgs::new()).unwrap();
        assert_eq!(response.body, "helper");
    }

    #[test]
    fn test_api_view_keeps_function_meta() {
        let function = FunctionView::new("app.views", "rest_function_view", text("rest"))
            .allowed(["admin"]);
        let view = api_view(function.clone(), ["GET", "post"]).unwrap();

        assert_eq!(view.meta(), function.meta());
        assert_eq!(view.class().name(), "rest_function_view");
        let (_, get) = view.class().resolve_method("get").unwrap();
        assert!(get.declared_permissions().is_some());
        assert!(view.class().defines("post"));
        assert!(!view.class().defines("put"));
    }

    #[test]
    fn test_api_view_defaults_to_get() {
        let function = FunctionView::new("app.views", "ping", text("pong"));
        let view = api_view(function, Vec::<String>::new()).unwrap();
        assert_eq!(view.allowed_methods(), vec!["GET".to_string()]);
    }
}
